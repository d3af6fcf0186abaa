//! Data movement between stream, scopes, and operand stack.

use tracing::trace;

use super::Interpreter;
use crate::error::{Fault, OpResult};

impl Interpreter {
    /// Reads one operand octet, failing with a protocol error at EOF.
    pub(super) fn operand_byte(&mut self, what: &str) -> OpResult<u8> {
        self.reader
            .read_byte()
            .ok_or_else(|| Fault::Protocol(format!("stream ended reading {what}")))
    }

    pub(super) fn op_push(&mut self) -> OpResult<()> {
        let value = self.reader.read_literal()?;
        trace!(component = %self.handle.name(), ?value, "PUSH");
        self.operands.push(value);
        Ok(())
    }

    pub(super) fn op_declare(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        // The declared type octet is informational; the compiler already
        // checked types.
        self.reader
            .read_byte()
            .ok_or_else(|| Fault::Protocol("stream ended reading a declared type".into()))?;
        trace!(component = %self.handle.name(), %name, "DECLARE");
        self.scopes.declare(&name);
        Ok(())
    }

    pub(super) fn op_load(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        trace!(component = %self.handle.name(), %name, "LOAD");
        let value = self.scopes.load(&name)?;
        self.operands.push(value);
        Ok(())
    }

    pub(super) fn op_store(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        trace!(component = %self.handle.name(), %name, "STORE");
        let value = self.operands.pop()?;
        self.scopes.store(&name, value)
    }
}
