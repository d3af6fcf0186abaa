//! `PROC` declarations, `PROCCALL` resolution, and `RETURN`.

use std::sync::Arc;

use insense_asm::Opcode;
use itertools::Itertools;
use tracing::{debug, trace};

use super::Interpreter;
use crate::consts::{RETURN_ADDRESS, RETURN_SOURCE};
use crate::error::{Fault, OpResult};
use crate::procedure::Procedure;
use crate::reader::ByteStream;
use crate::value::Value;

impl Interpreter {
    /// `PROC name paramCount { type name }* … BLOCKEND`: records the
    /// procedure with its entry offset (immediately after the header) and
    /// skips the body.
    pub(super) fn op_proc(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        let count = self.operand_byte("a parameter count")?;
        let mut params = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            self.operand_byte("a parameter type")?;
            params.push(self.reader.expect_string()?);
        }
        let entry = self.reader.position();
        debug!(
            component = %self.handle.name(),
            procedure = %name,
            params = %params.iter().join(", "),
            entry,
            "PROC registered"
        );

        let procedure = Procedure {
            name,
            params,
            entry,
        };
        if self.is_entry {
            // The entry component's procedures are resolvable by every
            // child through the global table.
            self.ctx.globals.register(procedure.clone());
        }
        self.locals.register(procedure);

        self.reader
            .skip_to_next(Opcode::BLOCKEND)?
            .map(|_| ())
            .ok_or_else(|| Fault::Protocol("PROC body without BLOCKEND".into()))
    }

    /// `PROCCALL name`: resolution order is the component's own table, the
    /// entry component's table, then the native table. Programs rely on
    /// this to shadow built-ins.
    pub(super) fn op_proccall(&mut self) -> OpResult<()> {
        let name = self.reader.expect_string()?;
        trace!(component = %self.handle.name(), procedure = %name, "PROCCALL");

        if let Some(procedure) = self.locals.get(&name).cloned() {
            let image = Arc::clone(&self.base_image);
            return self.invoke_bytecode(procedure, image);
        }
        if let Some(procedure) = self.ctx.globals.get(&name) {
            let image = self
                .ctx
                .globals
                .image()
                .ok_or_else(|| Fault::Protocol("entry program image not published".into()))?;
            return self.invoke_bytecode(procedure, image);
        }
        if let Some(native) = self.ctx.natives.get(&name).cloned() {
            let mut args = Vec::with_capacity(native.params.len());
            for _ in 0..native.params.len() {
                args.push(self.operands.pop()?);
            }
            // Pops yield last-pushed first; natives take declaration order.
            args.reverse();
            trace!(component = %self.handle.name(), native = %name, "native call");
            (native.callable)(&args, &mut self.operands);
            return Ok(());
        }

        Err(Fault::Protocol(format!("unknown procedure `{name}`")))
    }

    /// Enters a bytecode procedure: a fresh scope holding the return
    /// address (and, when the body lives in a different stream, the
    /// suspended stream to restore), parameter bindings in definition
    /// order, then a seek to the entry offset.
    fn invoke_bytecode(&mut self, procedure: Procedure, image: Arc<[u8]>) -> OpResult<()> {
        self.scopes.enter();
        self.scopes.declare(RETURN_ADDRESS);
        self.scopes
            .store(RETURN_ADDRESS, Value::ReturnAddress(self.reader.position()))?;

        if !Arc::ptr_eq(self.reader.image(), &image) {
            self.scopes.declare(RETURN_SOURCE);
            self.scopes
                .store(RETURN_SOURCE, Value::Stream(self.reader.clone()))?;
            self.reader = ByteStream::new(image);
        }

        for param in &procedure.params {
            self.scopes.declare(param);
            let argument = self.operands.pop()?;
            self.scopes.store(param, argument)?;
        }

        self.reader.set_position(procedure.entry)
    }

    /// `RETURN`: restore the caller's stream and position, then unwind the
    /// call frame's scopes.
    pub(super) fn op_return(&mut self) -> OpResult<()> {
        // Unwind to the call frame first so the frame's own bindings, not
        // an outer call's, drive the restore.
        self.scopes.exit_to(RETURN_ADDRESS)?;

        let address = match self.scopes.load(RETURN_ADDRESS)? {
            Value::ReturnAddress(address) => address,
            other => {
                return Err(Fault::Protocol(format!(
                    "`{RETURN_ADDRESS}` holds {}, not a return address",
                    other.tag()
                )))
            }
        };
        if let Some(Value::Stream(stream)) = self.scopes.try_load_local(RETURN_SOURCE) {
            self.reader = stream;
        }
        self.reader.set_position(address)?;
        trace!(component = %self.handle.name(), address, "RETURN");
        self.scopes.exit()
    }

    /// `BLOCKEND` in normal dispatch: inside a projection it forwards to
    /// the closing `PROJECT_EXIT`; inside a procedure call it returns;
    /// otherwise it closes a constructor body and is a no-op.
    pub(super) fn op_blockend(&mut self) -> OpResult<()> {
        if self.in_project {
            self.reader
                .skip_to_next(Opcode::PROJECT_EXIT)?
                .map(|_| ())
                .ok_or_else(|| Fault::Protocol("projection without PROJECT_EXIT".into()))
        } else if self.scopes.contains(RETURN_ADDRESS) {
            self.op_return()
        } else {
            Ok(())
        }
    }
}
