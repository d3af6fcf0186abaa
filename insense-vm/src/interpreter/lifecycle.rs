//! Child instantiation and component teardown.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use super::Interpreter;
use crate::component::{ChildTask, ComponentHandle};
use crate::error::{Fault, OpResult};
use crate::value::Value;

impl Interpreter {
    /// `CALL name argCount`: pops the arguments (last pushed first),
    /// instantiates the named component, and starts its task. The handle is
    /// pushed for the caller and recorded in the wait set.
    pub(super) fn op_call(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        let argc = self.operand_byte("an argument count")?;
        debug!(component = %self.handle.name(), callee = %name, argc, "CALL");

        let mut arguments = Vec::with_capacity(usize::from(argc));
        for _ in 0..argc {
            arguments.push(self.operands.pop()?);
        }

        let image = self
            .ctx
            .source
            .load(&name)
            .map_err(|e| Fault::Protocol(e.to_string()))?;

        let child = ComponentHandle::new(name.clone());
        let interpreter = Interpreter::new(
            Arc::clone(&child),
            image,
            Some(arguments),
            Arc::clone(&self.ctx),
            false,
        );
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || interpreter.run())
            .map_err(|e| Fault::Protocol(format!("failed to start `{name}`: {e}")))?;

        info!(component = %self.handle.name(), child = %child.name(), "component started");
        self.operands.push(Value::Component(Arc::clone(&child)));
        self.children.push(ChildTask {
            handle: child,
            thread,
        });
        Ok(())
    }

    /// Teardown: drain the wait set joining every child, then unbind all
    /// channel endpoints. Scopes, stacks, and tables drop with `self`.
    pub(super) fn finish(&mut self) {
        if !self.children.is_empty() {
            info!(component = %self.handle.name(), "waiting on started components");
            while let Some(child) = self.children.pop() {
                debug!(
                    component = %self.handle.name(),
                    child = %child.handle.name(),
                    "waiting"
                );
                let _ = child.thread.join();
            }
            info!(component = %self.handle.name(), "all started components stopped");
        }
        self.handle.unbind_all();
    }
}
