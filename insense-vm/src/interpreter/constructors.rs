//! The `COMPONENT` header and constructor overload selection.

use insense_asm::{Direction, Opcode, TypeTag};
use tracing::{debug, info};

use super::Interpreter;
use crate::channel::Endpoint;
use crate::error::{Fault, OpResult};

impl Interpreter {
    /// `COMPONENT name ifaces { chans { dir type name }* }*`: verifies the
    /// file's declared name and registers one channel endpoint per
    /// declaration in the channel table.
    pub(super) fn op_component(&mut self) -> OpResult<()> {
        let declared = self.reader.expect_string()?;
        if declared != self.handle.name() {
            return Err(Fault::Protocol(format!(
                "component file declares `{declared}`, expected `{}`",
                self.handle.name()
            )));
        }

        let interfaces = self.operand_byte("an interface count")?;
        debug!(component = %self.handle.name(), interfaces, "COMPONENT");
        for _ in 0..interfaces {
            let channels = self.operand_byte("a channel count")?;
            for _ in 0..channels {
                let direction = Direction::try_from(self.operand_byte("a channel direction")?)
                    .map_err(|e| Fault::Protocol(e.to_string()))?;
                let elem_tag = TypeTag::try_from(self.operand_byte("a channel type")?)
                    .map_err(|e| Fault::Protocol(e.to_string()))?;
                let name = self.reader.expect_string()?;
                debug!(
                    component = %self.handle.name(),
                    channel = %name,
                    %direction,
                    %elem_tag,
                    "registering channel"
                );
                self.handle
                    .register_channel(name, Endpoint::new(direction, elem_tag));
            }
        }
        Ok(())
    }

    /// Constructor overload selection.
    ///
    /// A constructor matches when its declared arity equals the caller's
    /// argument count and every declared parameter type equals the
    /// corresponding argument's tag. On a match the parameters are bound in
    /// the current scope, the running flag flips, and the argument list is
    /// dropped. On a mismatch the argument cursor rewinds and the search
    /// fast-forwards to the next `CONSTRUCTOR`; exhausting the stream is
    /// fatal.
    pub(super) fn op_constructor(&mut self) -> OpResult<()> {
        loop {
            if self.handle.is_running() {
                // Re-entered from the behaviour loop: constructors are
                // selected once. Consume the header, then the body.
                let declared = self.operand_byte("a parameter count")?;
                for _ in 0..declared {
                    self.operand_byte("a parameter type")?;
                    self.reader.expect_string()?;
                }
                self.reader.skip_to_next(Opcode::BLOCKEND)?;
                return Ok(());
            }

            let declared = usize::from(self.operand_byte("a parameter count")?);
            let given = self.arguments.as_ref().map_or(0, Vec::len);
            let mut matched = declared == given;

            let mut names = Vec::with_capacity(declared);
            for index in 0..declared {
                let tag_byte = self.operand_byte("a parameter type")?;
                let name = self.reader.expect_string()?;
                if matched {
                    let args = self.arguments.as_deref().unwrap_or_default();
                    if args[index].tag() as u8 != tag_byte {
                        matched = false;
                    }
                }
                names.push(name);
            }

            if matched {
                info!(component = %self.handle.name(), arity = declared, "constructor match");
                let args = self.arguments.take().unwrap_or_default();
                for (name, arg) in names.iter().zip(args) {
                    self.scopes.declare(name);
                    self.scopes.store(name, arg)?;
                }
                self.handle.mark_running();
                return Ok(());
            }

            info!(component = %self.handle.name(), "constructor mismatch, fast-forwarding");
            match self.reader.skip_to_next(Opcode::CONSTRUCTOR)? {
                Some(_) => continue,
                None => return Err(Fault::NoMatchingConstructor),
            }
        }
    }
}
