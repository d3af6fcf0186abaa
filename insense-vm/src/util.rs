//! Bytecode assembly helpers for tests, demos, and tooling.

use insense_asm::{Direction, Opcode, StructOp, TypeTag};

/// Escapes string octets for the on-stream encoding: `\n` becomes `\\n`,
/// a backslash doubles. The terminating NUL is appended by the emitters.
pub fn escape(text: &str) -> Vec<u8> {
    let mut octets = Vec::with_capacity(text.len());
    for b in text.bytes() {
        match b {
            b'\n' => octets.extend_from_slice(b"\\n"),
            b'\\' => octets.extend_from_slice(b"\\\\"),
            other => octets.push(other),
        }
    }
    octets
}

/// An append-only assembler producing the flat octet stream a component
/// file holds. Offsets are exposed so tests can compute jump distances.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
}

impl ProgramBuilder {
    /// Starts an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream offset: where the next emitted octet lands.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been emitted yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The assembled octet stream.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Emits one opcode octet.
    pub fn op(mut self, op: Opcode) -> Self {
        self.bytes.push(op as u8);
        self
    }

    /// Emits one raw octet.
    pub fn byte(mut self, b: u8) -> Self {
        self.bytes.push(b);
        self
    }

    /// Emits a pre-assembled fragment.
    pub fn fragment(mut self, bytes: Vec<u8>) -> Self {
        self.bytes.extend(bytes);
        self
    }

    /// Emits a tagged, escaped, NUL-terminated string operand.
    pub fn string(mut self, text: &str) -> Self {
        self.bytes.push(TypeTag::String as u8);
        self.bytes.extend(escape(text));
        self.bytes.push(0);
        self
    }

    /// Emits an `INTEGER` literal (tag plus four big-endian octets).
    pub fn int_literal(mut self, value: i32) -> Self {
        self.bytes.push(TypeTag::Integer as u8);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// `PUSH INTEGER value`.
    pub fn push_int(self, value: i32) -> Self {
        self.op(Opcode::PUSH).int_literal(value)
    }

    /// `PUSH UNSIGNED_INTEGER value`.
    pub fn push_uint(mut self, value: u32) -> Self {
        self.bytes.push(Opcode::PUSH as u8);
        self.bytes.push(TypeTag::UnsignedInteger as u8);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// `PUSH REAL value`.
    pub fn push_real(mut self, value: f64) -> Self {
        self.bytes.push(Opcode::PUSH as u8);
        self.bytes.push(TypeTag::Real as u8);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// `PUSH BOOL value`.
    pub fn push_bool(mut self, value: bool) -> Self {
        self.bytes.push(Opcode::PUSH as u8);
        self.bytes.push(TypeTag::Bool as u8);
        self.bytes.push(u8::from(value));
        self
    }

    /// `PUSH BYTE value`.
    pub fn push_byte(mut self, value: u8) -> Self {
        self.bytes.push(Opcode::PUSH as u8);
        self.bytes.push(TypeTag::Byte as u8);
        self.bytes.push(value);
        self
    }

    /// `PUSH STRING value`.
    pub fn push_str(self, value: &str) -> Self {
        self.op(Opcode::PUSH).string(value)
    }

    /// `DECLARE name type`.
    pub fn declare(self, name: &str, tag: TypeTag) -> Self {
        self.op(Opcode::DECLARE).string(name).byte(tag as u8)
    }

    /// `LOAD name`.
    pub fn load(self, name: &str) -> Self {
        self.op(Opcode::LOAD).string(name)
    }

    /// `STORE name`.
    pub fn store(self, name: &str) -> Self {
        self.op(Opcode::STORE).string(name)
    }

    /// `STOP name`; an empty name stops the executing component.
    pub fn stop(self, name: &str) -> Self {
        self.op(Opcode::STOP).string(name)
    }

    /// `CALL name argCount`.
    pub fn call(self, name: &str, argc: u8) -> Self {
        self.op(Opcode::CALL).string(name).byte(argc)
    }

    /// `COMPONENT name` with one interface per channel group.
    pub fn component(
        mut self,
        name: &str,
        interfaces: &[&[(Direction, TypeTag, &str)]],
    ) -> Self {
        self = self.op(Opcode::COMPONENT).string(name);
        self.bytes.push(interfaces.len() as u8);
        for channels in interfaces {
            self.bytes.push(channels.len() as u8);
            for (direction, tag, chan) in channels.iter() {
                self.bytes.push(*direction as u8);
                self.bytes.push(*tag as u8);
                self.bytes.push(TypeTag::String as u8);
                self.bytes.extend(escape(chan));
                self.bytes.push(0);
            }
        }
        self
    }

    /// `CONSTRUCTOR paramCount { type name }*`; the body follows, closed
    /// by [`ProgramBuilder::blockend`].
    pub fn constructor(mut self, params: &[(TypeTag, &str)]) -> Self {
        self = self.op(Opcode::CONSTRUCTOR).byte(params.len() as u8);
        for (tag, name) in params {
            self = self.byte(*tag as u8).string(name);
        }
        self
    }

    /// `PROC name paramCount { type name }*`; the body follows, closed by
    /// [`ProgramBuilder::blockend`].
    pub fn proc(mut self, name: &str, params: &[(TypeTag, &str)]) -> Self {
        self = self.op(Opcode::PROC).string(name).byte(params.len() as u8);
        for (tag, pname) in params {
            self = self.byte(*tag as u8).string(pname);
        }
        self
    }

    /// `PROCCALL name`.
    pub fn proccall(self, name: &str) -> Self {
        self.op(Opcode::PROCCALL).string(name)
    }

    /// `RETURN`.
    pub fn ret(self) -> Self {
        self.op(Opcode::RETURN)
    }

    /// `BLOCKEND`.
    pub fn blockend(self) -> Self {
        self.op(Opcode::BLOCKEND)
    }

    /// `SEND chan`.
    pub fn send(self, chan: &str) -> Self {
        self.op(Opcode::SEND).string(chan)
    }

    /// `RECEIVE chan`.
    pub fn receive(self, chan: &str) -> Self {
        self.op(Opcode::RECEIVE).string(chan)
    }

    /// `CONNECT compVar1 chan1 compVar2 chan2`.
    pub fn connect(self, comp1: &str, chan1: &str, comp2: &str, chan2: &str) -> Self {
        self.op(Opcode::CONNECT)
            .string(comp1)
            .string(chan1)
            .string(comp2)
            .string(chan2)
    }

    /// `DISCONNECT compVar chan`.
    pub fn disconnect(self, comp: &str, chan: &str) -> Self {
        self.op(Opcode::DISCONNECT).string(comp).string(chan)
    }

    /// `JUMP` back to an absolute stream offset.
    pub fn jump_to(self, target: usize) -> Self {
        let distance = self.backward_distance(target);
        self.op(Opcode::JUMP).int_literal(distance)
    }

    /// `BEHAVIOUR_JUMP` back to an absolute stream offset.
    pub fn behaviour_jump_to(self, target: usize) -> Self {
        let distance = self.backward_distance(target);
        self.op(Opcode::BEHAVIOUR_JUMP).int_literal(distance)
    }

    /// `IF` over a then-fragment with no else-branch.
    pub fn if_block(self, then: Vec<u8>) -> Self {
        self.op(Opcode::IF)
            .int_literal(then.len() as i32)
            .fragment(then)
    }

    /// `IF`/`ELSE` over a then-fragment and an else-fragment.
    pub fn if_else_block(self, then: Vec<u8>, els: Vec<u8>) -> Self {
        self.op(Opcode::IF)
            .int_literal(then.len() as i32)
            .fragment(then)
            .op(Opcode::ELSE)
            .int_literal(els.len() as i32)
            .fragment(els)
    }

    /// `ANY`.
    pub fn any(self) -> Self {
        self.op(Opcode::ANY)
    }

    /// `PROJECT_ENTRY asName`: opens a projection; arms follow.
    pub fn project_entry(self, as_name: &str) -> Self {
        self.op(Opcode::PROJECT_ENTRY).string(as_name)
    }

    /// A projection arm header for the given type; the arm body follows,
    /// closed by [`ProgramBuilder::blockend`].
    pub fn project_arm(self, tag: TypeTag) -> Self {
        self.op(Opcode::PROJECT_ENTRY).byte(tag as u8)
    }

    /// `PROJECT_EXIT`.
    pub fn project_exit(self) -> Self {
        self.op(Opcode::PROJECT_EXIT)
    }

    /// `STRUCT STRUCT_CONSTRUCTOR count { type name }*`.
    pub fn struct_constructor(mut self, fields: &[(TypeTag, &str)]) -> Self {
        self = self
            .op(Opcode::STRUCT)
            .byte(StructOp::Constructor as u8)
            .byte(fields.len() as u8);
        for (tag, name) in fields {
            self = self.byte(*tag as u8).string(name);
        }
        self
    }

    /// `STRUCT STRUCT_LOAD field`.
    pub fn struct_load(self, field: &str) -> Self {
        self.op(Opcode::STRUCT)
            .byte(StructOp::Load as u8)
            .string(field)
    }

    /// Distance for a backward branch landing on `target`: the seek is
    /// `-(distance) + 1` octets from the position after the four-octet
    /// distance word.
    fn backward_distance(&self, target: usize) -> i32 {
        let after_operand = self.bytes.len() + 6;
        (after_operand + 1 - target) as i32
    }
}
