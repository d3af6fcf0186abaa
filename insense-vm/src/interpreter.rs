//! Per-component interpreter: the dispatch loop and its state.

use std::sync::Arc;

use insense_asm::Opcode;
use tracing::{error, info, trace, warn};

use crate::builtins;
use crate::component::{ChildTask, ComponentHandle};
use crate::error::{Fault, OpResult};
use crate::loader::ProgramSource;
use crate::procedure::{GlobalProcedures, NativeTable, ProcedureTable};
use crate::reader::ByteStream;
use crate::scope::ScopeStack;
use crate::stack::OperandStack;
use crate::value::Value;

mod alu;
mod channels;
mod constructors;
mod data;
mod flow;
mod internal;
mod lifecycle;
mod procedures;

pub use alu::eval_binary;

/// State shared by every component of one running program: the program
/// source, the native table, and the entry component's procedure table.
#[derive(Debug)]
pub struct VmContext {
    /// Component name → bytecode image lookup.
    pub source: Arc<dyn ProgramSource>,
    /// Native procedures, populated once at VM start.
    pub natives: NativeTable,
    /// The entry component's procedures and program image.
    pub globals: GlobalProcedures,
}

impl VmContext {
    /// Creates a context with the standard native table.
    pub fn new(source: Arc<dyn ProgramSource>) -> Self {
        Self::with_natives(source, builtins::standard())
    }

    /// Creates a context with a caller-supplied native table.
    pub fn with_natives(source: Arc<dyn ProgramSource>, natives: NativeTable) -> Self {
        Self {
            source,
            natives,
            globals: GlobalProcedures::new(),
        }
    }
}

/// One component's interpreter task.
///
/// Everything here is private to the component's thread; the only shared
/// state is the [`ComponentHandle`] and the channel subsystem behind it.
#[derive(Debug)]
pub struct Interpreter {
    handle: Arc<ComponentHandle>,
    /// The active stream; swapped while a global procedure body runs.
    reader: ByteStream,
    /// The component's own program image; local procedure entries point
    /// into it.
    base_image: Arc<[u8]>,
    scopes: ScopeStack,
    operands: OperandStack,
    /// Caller-supplied arguments, consumed by the matching constructor.
    arguments: Option<Vec<Value>>,
    locals: ProcedureTable,
    children: Vec<ChildTask>,
    ctx: Arc<VmContext>,
    in_project: bool,
    is_entry: bool,
}

impl Interpreter {
    /// Creates the interpreter for a freshly instantiated component.
    pub fn new(
        handle: Arc<ComponentHandle>,
        image: Arc<[u8]>,
        arguments: Option<Vec<Value>>,
        ctx: Arc<VmContext>,
        is_entry: bool,
    ) -> Self {
        Self {
            handle,
            reader: ByteStream::new(Arc::clone(&image)),
            base_image: image,
            scopes: ScopeStack::new(),
            operands: OperandStack::new(),
            arguments,
            locals: ProcedureTable::new(),
            children: Vec::new(),
            ctx,
            is_entry,
            in_project: false,
        }
    }

    /// The component's shared handle.
    pub fn handle(&self) -> &Arc<ComponentHandle> {
        &self.handle
    }

    /// Runs the component to termination: the thread body of its task.
    ///
    /// The loop reads opcodes until the stop flag is set or the stream is
    /// exhausted. Unknown bytes and other non-fatal faults are logged and
    /// skipped; a fatal fault stops this component only.
    pub fn run(mut self) {
        let component = self.handle.name().to_string();
        info!(%component, "start");

        while !self.handle.stop_requested() {
            let Some(byte) = self.reader.read_byte() else {
                break;
            };
            let op = match Opcode::try_from(byte) {
                Ok(op) => op,
                Err(_) => {
                    warn!(%component, "{}", Fault::UnknownOpcode(byte));
                    continue;
                }
            };
            trace!(%component, %op, pos = self.reader.position() - 1, "dispatch");
            if let Err(fault) = self.execute(op) {
                if fault.is_fatal() {
                    error!(%component, %op, %fault, "fatal fault, stopping component");
                    self.handle.request_stop();
                    break;
                }
                warn!(%component, %op, %fault, "continuing after fault");
            }
        }

        info!(%component, "end");
        self.finish();
        info!(%component, "done, component cleaned up");
    }

    fn execute(&mut self, op: Opcode) -> OpResult<()> {
        use Opcode::*;
        match op {
            ENTERSCOPE => {
                self.scopes.enter();
                Ok(())
            }
            EXITSCOPE => self.scopes.exit(),
            PUSH => self.op_push(),
            DECLARE => self.op_declare(),
            LOAD => self.op_load(),
            STORE => self.op_store(),
            ADD | SUB | MUL | DIV | MOD | LESS | LESSEQUAL | MORE | MOREEQUAL | EQUAL
            | UNEQUAL | AND | OR => self.op_expression(op),
            NOT => self.op_not(),
            BITAND | BITXOR | BITNOT => Err(Fault::Protocol(format!(
                "reserved opcode {op} has no specified semantics"
            ))),
            COMPONENT => self.op_component(),
            CALL => self.op_call(),
            CONSTRUCTOR => self.op_constructor(),
            STOP => self.op_stop(),
            BEHAVIOUR_JUMP => self.op_behaviour_jump(),
            JUMP => self.op_jump(),
            IF => self.op_if(),
            ELSE => self.op_else(),
            CONNECT => self.op_connect(),
            DISCONNECT => self.op_disconnect(),
            SEND => self.op_send(),
            RECEIVE => self.op_receive(),
            PROC => self.op_proc(),
            PROCCALL => self.op_proccall(),
            RETURN => self.op_return(),
            STRUCT => self.op_struct(),
            ANY => self.op_any(),
            PROJECT_ENTRY => self.op_project_entry(),
            PROJECT_EXIT => self.op_project_exit(),
            BLOCKEND => self.op_blockend(),
        }
    }
}
