//! Control transfer: jumps, conditionals, and stopping.

use insense_asm::Opcode;
use tracing::{debug, info, trace};

use super::Interpreter;
use crate::error::{Fault, OpResult};
use crate::value::Value;

impl Interpreter {
    /// `STOP name`: an empty name or the component's own name stops the
    /// executing component; any other name must resolve to a COMPONENT
    /// handle whose stop flag is set instead.
    pub(super) fn op_stop(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        if name.is_empty() || name == self.handle.name() {
            info!(component = %self.handle.name(), "STOP self");
            self.handle.request_stop();
            return Ok(());
        }
        match self.scopes.load(&name)? {
            Value::Component(peer) => {
                info!(component = %self.handle.name(), target = %peer.name(), "STOP");
                peer.request_stop();
                Ok(())
            }
            other => Err(Fault::TypeMismatch(format!(
                "STOP target `{name}` is {}, not a component",
                other.tag()
            ))),
        }
    }

    /// Backward branch: the stream distance is relative to the position
    /// after the four-octet distance word, offset by one. Compilers
    /// generate distances assuming exactly this rule.
    pub(super) fn op_jump(&mut self) -> OpResult<()> {
        let distance = self.reader.read_distance()?;
        trace!(component = %self.handle.name(), distance, "JUMP");
        self.reader.seek_relative(-(i64::from(distance)) + 1)
    }

    /// The behaviour-loop branch: falls through once the stop flag is set,
    /// letting the loop terminate.
    pub(super) fn op_behaviour_jump(&mut self) -> OpResult<()> {
        let distance = self.reader.read_distance()?;
        if self.handle.stop_requested() {
            debug!(component = %self.handle.name(), "BEHAVIOUR_JUMP with stop set, falling through");
            return Ok(());
        }
        trace!(component = %self.handle.name(), distance, "BEHAVIOUR_JUMP");
        self.reader.seek_relative(-(i64::from(distance)) + 1)
    }

    /// Conditional: a false condition seeks forward by the skip distance;
    /// landing on an `ELSE` consumes its distance, landing anywhere else
    /// rewinds the probe octet and resumes.
    pub(super) fn op_if(&mut self) -> OpResult<()> {
        let skip = self.reader.read_distance()?;
        let condition = match self.operands.pop()? {
            Value::Bool(b) => b,
            other => {
                return Err(Fault::TypeMismatch(format!(
                    "IF expects a BOOL condition, got {}",
                    other.tag()
                )))
            }
        };
        trace!(component = %self.handle.name(), condition, skip, "IF");
        if condition {
            return Ok(());
        }
        self.reader.seek_relative(i64::from(skip))?;
        match self.reader.read_byte() {
            Some(b) if b == Opcode::ELSE as u8 => {
                self.reader.read_distance()?;
                Ok(())
            }
            Some(_) => self.reader.seek_relative(-1),
            None => Ok(()),
        }
    }

    /// Unconditional forward seek terminating a taken then-branch.
    pub(super) fn op_else(&mut self) -> OpResult<()> {
        let skip = self.reader.read_distance()?;
        trace!(component = %self.handle.name(), skip, "ELSE");
        self.reader.seek_relative(i64::from(skip))
    }
}
