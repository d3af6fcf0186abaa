use core::fmt;

/// Instruction representation for the Insense interpreter.
///
/// Every opcode is a single octet. Operands, where present, follow inline in
/// the stream: strings are a `STRING` type-tag octet followed by
/// NUL-terminated octets, jump distances are an `INTEGER` literal (tag plus
/// four big-endian octets), counts are a single octet.
///
/// Byte 24 is unassigned (the historical `TYPE` opcode was never emitted by
/// any compiler), as is every byte above `BLOCKEND`; decoding them fails and
/// the interpreter reports an unknown opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum Opcode {
    /// Stop a component: `STOP componentName`. An empty name or the
    /// executing component's own name stops the executing component.
    STOP = 0x00,
    /// Push a new scope level.
    ENTERSCOPE = 0x01,
    /// Pop the innermost scope level.
    EXITSCOPE = 0x02,
    /// Push a typed literal: `PUSH typeTag payload`.
    PUSH = 0x03,
    /// Declare a name in the top scope: `DECLARE name typeTag`. The type
    /// octet is informational; the compiler has already checked types.
    DECLARE = 0x04,
    /// Push the value bound to a name: `LOAD name`.
    LOAD = 0x05,
    /// Pop the stack top and assign it to a name: `STORE name`.
    STORE = 0x06,
    /// Numeric addition over the two topmost operands.
    ADD = 0x07,
    /// Numeric subtraction.
    SUB = 0x08,
    /// Numeric multiplication.
    MUL = 0x09,
    /// Numeric division.
    DIV = 0x0a,
    /// Numeric modulo; undefined over REAL operands.
    MOD = 0x0b,
    /// Numeric comparison producing BOOL.
    LESS = 0x0c,
    /// Numeric comparison producing BOOL.
    LESSEQUAL = 0x0d,
    /// Numeric comparison producing BOOL.
    MORE = 0x0e,
    /// Numeric comparison producing BOOL.
    MOREEQUAL = 0x0f,
    /// Numeric comparison producing BOOL.
    EQUAL = 0x10,
    /// Numeric comparison producing BOOL.
    UNEQUAL = 0x11,
    /// Logical conjunction over two BOOL operands.
    AND = 0x12,
    /// Logical disjunction over two BOOL operands.
    OR = 0x13,
    /// Logical negation of one BOOL operand.
    NOT = 0x14,
    /// Reserved; unused by the compiled corpus.
    BITAND = 0x15,
    /// Reserved; unused by the compiled corpus.
    BITXOR = 0x16,
    /// Reserved; unused by the compiled corpus.
    BITNOT = 0x17,
    /// Structural header declaring the component's channels:
    /// `COMPONENT name u8(interfaces) { u8(channels) { u8(direction)
    /// u8(type) name }* }*`.
    COMPONENT = 0x19,
    /// Instantiate a child component: `CALL name u8(argCount)`.
    CALL = 0x1a,
    /// Constructor overload header: `CONSTRUCTOR u8(paramCount)
    /// { u8(type) name }*`, body terminated by `BLOCKEND`.
    CONSTRUCTOR = 0x1b,
    /// Backward branch closing the behaviour loop, skipped once the stop
    /// flag is set: `BEHAVIOUR_JUMP INTEGER(distance)`.
    BEHAVIOUR_JUMP = 0x1c,
    /// Unconditional backward branch: `JUMP INTEGER(distance)`.
    JUMP = 0x1d,
    /// Conditional forward branch: `IF INTEGER(skip)`.
    IF = 0x1e,
    /// Unconditional forward branch closing a taken then-branch:
    /// `ELSE INTEGER(skip)`.
    ELSE = 0x1f,
    /// Bind two channel endpoints:
    /// `CONNECT compVar1 chan1 compVar2 chan2`.
    CONNECT = 0x20,
    /// Unbind an endpoint from all peers: `DISCONNECT compVar chan`.
    DISCONNECT = 0x21,
    /// Rendezvous send of the popped value: `SEND chan`.
    SEND = 0x22,
    /// Rendezvous receive pushing the received value: `RECEIVE chan`.
    RECEIVE = 0x23,
    /// Procedure declaration: `PROC name u8(paramCount) { u8(type) name }*`
    /// followed by the body and a closing `BLOCKEND`.
    PROC = 0x24,
    /// Procedure invocation: `PROCCALL name`.
    PROCCALL = 0x25,
    /// Return from a bytecode procedure.
    RETURN = 0x26,
    /// Struct operation: `STRUCT subOpcode …` (see [`StructOp`]).
    STRUCT = 0x27,
    /// Wrap the popped value in a type-erased ANY.
    ANY = 0x28,
    /// Open a projection over an ANY: `PROJECT_ENTRY asName`, followed by
    /// selection arms of the form `PROJECT_ENTRY u8(type) … BLOCKEND`.
    PROJECT_ENTRY = 0x29,
    /// Close a projection block.
    PROJECT_EXIT = 0x2a,
    /// Close a constructor, procedure, or projection-arm body.
    BLOCKEND = 0x2b,
}

impl Opcode {
    /// Whether this opcode is a binary expression operator dispatched to the
    /// arithmetic/logic evaluator.
    pub const fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::ADD
                | Self::SUB
                | Self::MUL
                | Self::DIV
                | Self::MOD
                | Self::LESS
                | Self::LESSEQUAL
                | Self::MORE
                | Self::MOREEQUAL
                | Self::EQUAL
                | Self::UNEQUAL
                | Self::AND
                | Self::OR
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A byte that maps to no known opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOpcode(pub u8);

impl fmt::Display for InvalidOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid opcode byte 0x{:02x}", self.0)
    }
}

impl std::error::Error for InvalidOpcode {}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcode;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match b {
            0x00 => STOP,
            0x01 => ENTERSCOPE,
            0x02 => EXITSCOPE,
            0x03 => PUSH,
            0x04 => DECLARE,
            0x05 => LOAD,
            0x06 => STORE,
            0x07 => ADD,
            0x08 => SUB,
            0x09 => MUL,
            0x0a => DIV,
            0x0b => MOD,
            0x0c => LESS,
            0x0d => LESSEQUAL,
            0x0e => MORE,
            0x0f => MOREEQUAL,
            0x10 => EQUAL,
            0x11 => UNEQUAL,
            0x12 => AND,
            0x13 => OR,
            0x14 => NOT,
            0x15 => BITAND,
            0x16 => BITXOR,
            0x17 => BITNOT,
            0x19 => COMPONENT,
            0x1a => CALL,
            0x1b => CONSTRUCTOR,
            0x1c => BEHAVIOUR_JUMP,
            0x1d => JUMP,
            0x1e => IF,
            0x1f => ELSE,
            0x20 => CONNECT,
            0x21 => DISCONNECT,
            0x22 => SEND,
            0x23 => RECEIVE,
            0x24 => PROC,
            0x25 => PROCCALL,
            0x26 => RETURN,
            0x27 => STRUCT,
            0x28 => ANY,
            0x29 => PROJECT_ENTRY,
            0x2a => PROJECT_EXIT,
            0x2b => BLOCKEND,
            _ => return Err(InvalidOpcode(b)),
        })
    }
}

/// Sub-opcode octet following [`Opcode::STRUCT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum StructOp {
    /// Build a struct: `u8(fieldCount) { u8(type) name }*`, one stack pop
    /// per field in definition order.
    Constructor = 0x01,
    /// Pop a struct and push one of its fields: `name`.
    Load = 0x02,
}

impl TryFrom<u8> for StructOp {
    type Error = InvalidOpcode;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x01 => Ok(StructOp::Constructor),
            0x02 => Ok(StructOp::Load),
            _ => Err(InvalidOpcode(b)),
        }
    }
}
