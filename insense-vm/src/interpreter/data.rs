//! Structs, ANY wrapping, and projection over the dynamic tag.

use insense_asm::{Opcode, StructOp, TypeTag};
use tracing::{debug, trace};

use super::Interpreter;
use crate::collections::NameMap;
use crate::error::{Fault, OpResult};
use crate::value::Value;

impl Interpreter {
    /// `STRUCT STRUCT_CONSTRUCTOR count { type name }*` builds a struct,
    /// popping one value per field in definition order;
    /// `STRUCT STRUCT_LOAD field` pops a struct and pushes the field.
    pub(super) fn op_struct(&mut self) -> OpResult<()> {
        let sub = StructOp::try_from(self.operand_byte("a struct sub-opcode")?)
            .map_err(|e| Fault::Protocol(e.to_string()))?;
        match sub {
            StructOp::Constructor => {
                let count = self.operand_byte("a field count")?;
                let mut fields = NameMap::new();
                for _ in 0..count {
                    self.operand_byte("a field type")?;
                    let name = self.reader.expect_string()?;
                    let value = self.operands.pop()?;
                    fields.insert(name, value);
                }
                trace!(component = %self.handle.name(), fields = fields.len(), "STRUCT built");
                self.operands.push(Value::Struct(fields));
                Ok(())
            }
            StructOp::Load => {
                let field = self.reader.expect_string()?;
                match self.operands.pop()? {
                    Value::Struct(fields) => {
                        let value = fields
                            .get(&field)
                            .cloned()
                            .ok_or(Fault::UnknownField(field))?;
                        self.operands.push(value);
                        Ok(())
                    }
                    other => Err(Fault::TypeMismatch(format!(
                        "STRUCT_LOAD expects a STRUCT, got {}",
                        other.tag()
                    ))),
                }
            }
        }
    }

    /// `ANY`: wrap the popped value, keeping its original tag inside.
    pub(super) fn op_any(&mut self) -> OpResult<()> {
        let value = self.operands.pop()?;
        self.operands.push(Value::Any(Box::new(value)));
        Ok(())
    }

    /// `PROJECT_ENTRY asName`: pops an ANY and selects the first arm whose
    /// type octet equals the inner value's tag, else the first `ANY` arm as
    /// the default. The selected arm runs with `asName` bound to the
    /// projected value in a fresh scope; with no arm the fault is logged
    /// and execution continues past the block.
    pub(super) fn op_project_entry(&mut self) -> OpResult<()> {
        let as_name = self.reader.expect_string()?;
        let inner = match self.operands.pop()? {
            Value::Any(inner) => *inner,
            other => {
                return Err(Fault::TypeMismatch(format!(
                    "PROJECT_ENTRY expects an ANY, got {}",
                    other.tag()
                )))
            }
        };
        let inner_tag = inner.tag();
        trace!(component = %self.handle.name(), %as_name, %inner_tag, "PROJECT_ENTRY");

        self.scopes.enter();
        let mut default_arm: Option<u64> = None;
        let selected = loop {
            let byte = self.operand_byte("a projection arm")?;
            match Opcode::try_from(byte) {
                Ok(Opcode::PROJECT_ENTRY) => {
                    let arm_tag = TypeTag::try_from(self.operand_byte("a projection arm type")?)
                        .map_err(|e| Fault::Protocol(e.to_string()))?;
                    if arm_tag == inner_tag {
                        break true;
                    }
                    if arm_tag == TypeTag::Any && default_arm.is_none() {
                        default_arm = Some(self.reader.position());
                    }
                    self.reader
                        .skip_to_next(Opcode::BLOCKEND)?
                        .map(|_| ())
                        .ok_or_else(|| {
                            Fault::Protocol("projection arm without BLOCKEND".into())
                        })?;
                }
                Ok(Opcode::PROJECT_EXIT) => match default_arm {
                    Some(position) => {
                        self.reader.set_position(position)?;
                        break true;
                    }
                    None => break false,
                },
                _ => {
                    return Err(Fault::Protocol(format!(
                        "unexpected byte 0x{byte:02x} between projection arms"
                    )))
                }
            }
        };

        if !selected {
            // Already past the PROJECT_EXIT; balance the scope and report.
            self.scopes.exit()?;
            return Err(Fault::NoProjection(inner_tag));
        }

        debug!(component = %self.handle.name(), %as_name, %inner_tag, "projection arm selected");
        self.scopes.declare(&as_name);
        self.scopes.store(&as_name, inner)?;
        self.in_project = true;
        Ok(())
    }

    /// `PROJECT_EXIT`: closes the projection opened by the selected arm.
    pub(super) fn op_project_exit(&mut self) -> OpResult<()> {
        if !self.in_project {
            return Err(Fault::Protocol(
                "PROJECT_EXIT outside a projection".into(),
            ));
        }
        self.scopes.exit()?;
        self.in_project = false;
        Ok(())
    }
}
