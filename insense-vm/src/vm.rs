//! The VM facade: wires a program source and native table to the entry
//! component and runs it to completion.

use std::io;
use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::component::ComponentHandle;
use crate::consts::ENTRY_COMPONENT;
use crate::error::VmError;
use crate::interpreter::{Interpreter, VmContext};
use crate::loader::ProgramSource;
use crate::procedure::NativeTable;

/// A configured virtual machine.
///
/// Component faults are component-local and never surface here; `run`
/// fails only when the entry component cannot be loaded or started.
#[derive(Debug)]
pub struct Vm {
    ctx: Arc<VmContext>,
}

impl Vm {
    /// Creates a VM with the standard native table.
    pub fn new(source: Arc<dyn ProgramSource>) -> Self {
        Self {
            ctx: Arc::new(VmContext::new(source)),
        }
    }

    /// Creates a VM with a caller-supplied native table (used by tests to
    /// capture program output).
    pub fn with_natives(source: Arc<dyn ProgramSource>, natives: NativeTable) -> Self {
        Self {
            ctx: Arc::new(VmContext::with_natives(source, natives)),
        }
    }

    /// The shared context of this VM.
    pub fn context(&self) -> &Arc<VmContext> {
        &self.ctx
    }

    /// Runs the `Main` component to completion.
    pub fn run(&self) -> Result<(), VmError> {
        self.run_entry(ENTRY_COMPONENT)
    }

    /// Runs the named entry component to completion, joining its task and
    /// transitively every component it started.
    pub fn run_entry(&self, entry: &str) -> Result<(), VmError> {
        let image = self.ctx.source.load(entry)?;
        self.ctx.globals.set_image(Arc::clone(&image));

        let handle = ComponentHandle::new(entry);
        let interpreter =
            Interpreter::new(handle, image, None, Arc::clone(&self.ctx), true);

        let task = thread::Builder::new()
            .name(entry.to_string())
            .spawn(move || interpreter.run())?;
        task.join().map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "entry component task panicked")
        })?;

        info!(entry, "program finished");
        Ok(())
    }
}
