//! Shared component state and lifecycle plumbing.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::debug;

use crate::channel::{self, Endpoint};
use crate::collections::NameMap;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The part of a component visible to other components: its name, stop and
/// running flags, and its channel table.
///
/// The interpreter task owns everything else (scopes, operand stack,
/// procedure table, stream) privately. The channel table is populated by
/// the `COMPONENT` header before the running flag flips, so peers that
/// observed `running` see a fully built table; the flag's mutex provides
/// the publication barrier.
#[derive(Debug)]
pub struct ComponentHandle {
    name: String,
    stop: AtomicBool,
    running: Mutex<bool>,
    started: Condvar,
    channels: Mutex<NameMap<Arc<Endpoint>>>,
}

impl ComponentHandle {
    /// Creates the handle for a component about to start.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            stop: AtomicBool::new(false),
            running: Mutex::new(false),
            started: Condvar::new(),
            channels: Mutex::new(NameMap::new()),
        })
    }

    /// The component's friendly name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests a cooperative stop; observed at the top of the interpreter
    /// loop.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Marks the component running: a matching constructor was selected and
    /// its bindings installed. Transitions false→true exactly once.
    pub fn mark_running(&self) {
        let mut running = lock(&self.running);
        debug_assert!(!*running, "running flag must flip exactly once");
        *running = true;
        self.started.notify_all();
    }

    /// Whether the component has passed constructor selection.
    pub fn is_running(&self) -> bool {
        *lock(&self.running)
    }

    /// Blocks until the component marks itself running.
    pub fn await_running(&self) {
        let mut running = lock(&self.running);
        while !*running {
            running = self
                .started
                .wait(running)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Registers a channel endpoint under its declared name.
    pub fn register_channel(&self, name: impl Into<String>, endpoint: Arc<Endpoint>) {
        lock(&self.channels).insert(name, endpoint);
    }

    /// Looks up a channel endpoint by name.
    pub fn channel(&self, name: &str) -> Option<Arc<Endpoint>> {
        lock(&self.channels).get(name).cloned()
    }

    /// Unbinds every endpoint; part of component teardown.
    pub fn unbind_all(&self) {
        let endpoints: Vec<_> = lock(&self.channels)
            .iter()
            .map(|(_, ep)| Arc::clone(ep))
            .collect();
        for endpoint in endpoints {
            channel::unbind(&endpoint);
        }
        debug!(component = %self.name, "all channels unbound");
    }
}

/// A started child component: the handle plus the thread to join.
///
/// The wait set holds these until the parent's behaviour loop exits; the
/// strong handle reference is released once the child is joined.
#[derive(Debug)]
pub struct ChildTask {
    /// Shared handle of the child.
    pub handle: Arc<ComponentHandle>,
    /// The child's interpreter thread.
    pub thread: JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insense_asm::{Direction, TypeTag};
    use std::thread;

    #[test]
    fn stop_flag_is_sticky() {
        let handle = ComponentHandle::new("A");
        assert!(!handle.stop_requested());
        handle.request_stop();
        assert!(handle.stop_requested());
        handle.request_stop();
        assert!(handle.stop_requested());
    }

    #[test]
    fn await_running_sees_the_flag() {
        let handle = ComponentHandle::new("A");
        let waiter = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                handle.await_running();
                handle.is_running()
            })
        };
        handle.mark_running();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn channel_table_lookup() {
        let handle = ComponentHandle::new("A");
        handle.register_channel("out1", Endpoint::new(Direction::Out, TypeTag::Integer));
        assert!(handle.channel("out1").is_some());
        assert!(handle.channel("missing").is_none());
    }
}
