//! Channel endpoints and the synchronous rendezvous protocol.
//!
//! Channels are unbuffered, direction-opposed, and multi-way: an endpoint
//! may be bound to any number of opposite-direction peers with the same
//! element size. Send and receive meet in a rendezvous; neither side
//! proceeds until the exchange completes. The protocol follows the SPIN
//! paper algorithms: a process-wide connection mutex serializes bind and
//! unbind, a binary "connections" gate serializes operations per endpoint,
//! and a blocked/acknowledged semaphore pair hands the payload over.

use std::sync::{Condvar, Mutex, MutexGuard, Weak};
use std::sync::Arc;

use insense_asm::{Direction, TypeTag};
use tracing::debug;

use crate::error::{Fault, OpResult};

/// Serializes bind/unbind against each other across all endpoints.
static CONNECTION_LOCK: Mutex<()> = Mutex::new(());

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking component must not wedge its peers.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counting semaphore over a mutex and condvar.
#[derive(Debug, Default)]
struct Semaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    fn wait(&self) {
        let mut count = lock(&self.count);
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *count -= 1;
    }

    fn post(&self) {
        *lock(&self.count) += 1;
        self.available.notify_one();
    }

    /// Post capped at one: the connections gate acts as a binary semaphore.
    fn post_binary(&self) {
        let mut count = lock(&self.count);
        if *count == 0 {
            *count = 1;
            self.available.notify_one();
        }
    }
}

#[derive(Debug, Default)]
struct EndpointState {
    ready: bool,
    buffer: Option<Vec<u8>>,
    connections: Vec<Weak<Endpoint>>,
    /// Round-robin cursor; persists across calls so repeated sends visit
    /// peers fairly.
    cursor: usize,
}

/// One directional half of a channel, owned by a component.
///
/// Connection lists hold weak peer references: removing an endpoint from a
/// peer's list never destroys it, and a dropped endpoint is pruned lazily.
#[derive(Debug)]
pub struct Endpoint {
    direction: Direction,
    elem_tag: TypeTag,
    state: Mutex<EndpointState>,
    /// Gate `C`: raised while the connection list is non-empty.
    conns_gate: Semaphore,
    /// Notification `B`: wakes the passive side of a rendezvous.
    blocked: Semaphore,
    /// Acknowledgment `A`: confirms the passive receiver copied out.
    acknowledged: Semaphore,
}

impl Endpoint {
    /// Creates an unconnected endpoint.
    pub fn new(direction: Direction, elem_tag: TypeTag) -> Arc<Self> {
        debug!(%direction, %elem_tag, "creating channel endpoint");
        Arc::new(Self {
            direction,
            elem_tag,
            state: Mutex::default(),
            conns_gate: Semaphore::default(),
            blocked: Semaphore::default(),
            acknowledged: Semaphore::default(),
        })
    }

    /// The endpoint's direction; never changes.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Element type carried by this channel.
    pub const fn elem_tag(&self) -> TypeTag {
        self.elem_tag
    }

    /// Element size in octets, used for bind compatibility.
    pub const fn element_size(&self) -> usize {
        self.elem_tag.element_size()
    }

    /// Number of live peers.
    pub fn connection_count(&self) -> usize {
        lock(&self.state)
            .connections
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Next live peer in round-robin order, pruning dropped ones.
    fn next_peer(&self) -> Option<Arc<Endpoint>> {
        let mut state = lock(&self.state);
        while !state.connections.is_empty() {
            let idx = state.cursor % state.connections.len();
            match state.connections[idx].upgrade() {
                Some(peer) => {
                    state.cursor = (idx + 1) % state.connections.len();
                    return Some(peer);
                }
                None => {
                    state.connections.remove(idx);
                    state.cursor = idx;
                }
            }
        }
        None
    }

    /// Rendezvous send. Blocks until a receiver takes the payload;
    /// blocks indefinitely while the connection list is empty.
    pub fn send(self: &Arc<Self>, data: Vec<u8>) {
        self.conns_gate.wait();
        {
            let mut state = lock(&self.state);
            state.buffer = Some(data);
            state.ready = true;
        }

        let connections = lock(&self.state).connections.len();
        for _ in 0..connections {
            let Some(peer) = self.next_peer() else { break };
            let mut peer_state = lock(&peer.state);
            let mut state = lock(&self.state);
            if peer_state.ready && state.ready {
                peer_state.buffer = state.buffer.take();
                peer_state.ready = false;
                state.ready = false;
                drop(state);
                drop(peer_state);
                peer.blocked.post();
                peer.acknowledged.wait();
                self.conns_gate.post_binary();
                return;
            }
            drop(state);
            drop(peer_state);
        }

        // No receiver was ready: park until the active half of a receive
        // takes the payload.
        self.conns_gate.post_binary();
        self.blocked.wait();
    }

    /// Rendezvous receive. Blocks until a sender provides a payload;
    /// blocks indefinitely while the connection list is empty.
    pub fn receive(self: &Arc<Self>) -> Vec<u8> {
        self.conns_gate.wait();
        lock(&self.state).ready = true;

        let connections = lock(&self.state).connections.len();
        for _ in 0..connections {
            let Some(peer) = self.next_peer() else { break };
            let mut state = lock(&self.state);
            let mut peer_state = lock(&peer.state);
            if peer_state.ready && state.ready {
                let data = peer_state
                    .buffer
                    .take()
                    .expect("ready sender holds a payload");
                state.ready = false;
                peer_state.ready = false;
                drop(peer_state);
                drop(state);
                peer.blocked.post();
                self.conns_gate.post_binary();
                return data;
            }
            drop(peer_state);
            drop(state);
        }

        // No sender was ready: park until the active half of a send
        // deposits the payload, then acknowledge.
        self.conns_gate.post_binary();
        self.blocked.wait();
        let data = lock(&self.state)
            .buffer
            .take()
            .expect("rendezvous completed without a payload");
        self.acknowledged.post();
        data
    }
}

/// Binds two endpoints. Returns `false` when they are already bound.
///
/// Fails with [`Fault::ChannelMismatch`] on equal directions or unequal
/// element sizes; the fault is non-fatal and the caller continues.
pub fn bind(a: &Arc<Endpoint>, b: &Arc<Endpoint>) -> OpResult<bool> {
    let _connections = lock(&CONNECTION_LOCK);
    debug!(dir_a = %a.direction, dir_b = %b.direction, "binding channels");

    if a.direction == b.direction {
        return Err(Fault::ChannelMismatch(
            "bind directions are the same".into(),
        ));
    }
    if a.element_size() != b.element_size() {
        return Err(Fault::ChannelMismatch(format!(
            "bind element sizes differ: {} vs {}",
            a.element_size(),
            b.element_size()
        )));
    }

    // Lock the IN side first; every path that takes both endpoint locks
    // agrees on this order.
    let (first, second) = in_side_first(a, b);
    let mut first_state = lock(&first.state);
    let mut second_state = lock(&second.state);

    // Bind always inserts into both lists, so one membership test suffices.
    if first_state
        .connections
        .iter()
        .any(|w| w.as_ptr() == Arc::as_ptr(second))
    {
        return Ok(false);
    }

    first_state.connections.push(Arc::downgrade(second));
    second_state.connections.push(Arc::downgrade(first));
    drop(first_state);
    drop(second_state);

    a.conns_gate.post_binary();
    b.conns_gate.post_binary();
    Ok(true)
}

/// Unbinds an endpoint from every peer.
pub fn unbind(endpoint: &Arc<Endpoint>) {
    let _connections = lock(&CONNECTION_LOCK);
    debug!(dir = %endpoint.direction, "unbinding channel");

    loop {
        let peer = {
            let state = lock(&endpoint.state);
            state.connections.iter().find_map(Weak::upgrade)
        };
        let Some(peer) = peer else { break };

        let (first, second) = in_side_first(endpoint, &peer);
        first.conns_gate.wait();
        second.conns_gate.wait();
        let mut first_state = lock(&first.state);
        let mut second_state = lock(&second.state);

        first_state
            .connections
            .retain(|w| w.as_ptr() != Arc::as_ptr(second));
        second_state
            .connections
            .retain(|w| w.as_ptr() != Arc::as_ptr(first));

        let first_live = !first_state.connections.is_empty();
        let second_live = !second_state.connections.is_empty();
        drop(first_state);
        drop(second_state);

        if first_live {
            first.conns_gate.post_binary();
        }
        if second_live {
            second.conns_gate.post_binary();
        }
    }
}

fn in_side_first<'a>(
    a: &'a Arc<Endpoint>,
    b: &'a Arc<Endpoint>,
) -> (&'a Arc<Endpoint>, &'a Arc<Endpoint>) {
    if a.direction == Direction::In {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn pair() -> (Arc<Endpoint>, Arc<Endpoint>) {
        (
            Endpoint::new(Direction::Out, TypeTag::Integer),
            Endpoint::new(Direction::In, TypeTag::Integer),
        )
    }

    #[test]
    fn bind_rejects_equal_directions() {
        let a = Endpoint::new(Direction::Out, TypeTag::Integer);
        let b = Endpoint::new(Direction::Out, TypeTag::Integer);
        assert!(matches!(bind(&a, &b), Err(Fault::ChannelMismatch(_))));
    }

    #[test]
    fn bind_rejects_unequal_element_sizes() {
        let a = Endpoint::new(Direction::Out, TypeTag::Integer);
        let b = Endpoint::new(Direction::In, TypeTag::Real);
        assert!(matches!(bind(&a, &b), Err(Fault::ChannelMismatch(_))));
    }

    #[test]
    fn double_bind_reports_already_bound() {
        let (out, inp) = pair();
        assert_eq!(bind(&out, &inp).unwrap(), true);
        assert_eq!(bind(&out, &inp).unwrap(), false);
        assert_eq!(out.connection_count(), 1);
        assert_eq!(inp.connection_count(), 1);
    }

    #[test]
    fn unbind_removes_both_sides() {
        let (out, inp) = pair();
        bind(&out, &inp).unwrap();
        unbind(&out);
        assert_eq!(out.connection_count(), 0);
        assert_eq!(inp.connection_count(), 0);
    }

    #[test]
    fn send_meets_receive() {
        let (out, inp) = pair();
        bind(&out, &inp).unwrap();

        let receiver = {
            let inp = Arc::clone(&inp);
            thread::spawn(move || inp.receive())
        };
        out.send(42i32.to_be_bytes().to_vec());
        let got = receiver.join().unwrap();
        assert_eq!(got, 42i32.to_be_bytes().to_vec());
    }

    #[test]
    fn receive_first_then_send() {
        let (out, inp) = pair();
        bind(&out, &inp).unwrap();

        let sender = {
            let out = Arc::clone(&out);
            thread::spawn(move || {
                // Give the receiver a head start so the passive-receive path
                // is the one exercised most runs.
                thread::sleep(std::time::Duration::from_millis(10));
                out.send(7i32.to_be_bytes().to_vec());
            })
        };
        let got = inp.receive();
        sender.join().unwrap();
        assert_eq!(got, 7i32.to_be_bytes().to_vec());
    }
}
