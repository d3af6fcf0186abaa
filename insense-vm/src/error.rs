//! Runtime fault and VM error types.

use std::io;

use insense_asm::TypeTag;

/// Runtime faults raised while a component interprets its stream.
///
/// Faults come in two dispositions. Fatal faults stop the faulting
/// component: it sets its stop flag, drains its children, releases its
/// resources, and terminates; sibling components continue unaffected.
/// Non-fatal faults ([`Fault::UnknownOpcode`], [`Fault::NoProjection`],
/// [`Fault::ChannelMismatch`]) are logged and interpretation continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    /// The stream violated the expected opcode/operand layout.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Operand types violated an operator's contract.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A byte outside the known opcode set.
    #[error("unknown opcode byte 0x{0:02x}")]
    UnknownOpcode(u8),
    /// `STORE` or `LOAD` named an absent binding.
    #[error("undeclared identifier `{0}`")]
    UndeclaredIdentifier(String),
    /// The constructor search exhausted the stream without a match.
    #[error("no constructor matching the supplied arguments")]
    NoMatchingConstructor,
    /// `STRUCT_LOAD` named a missing field.
    #[error("unknown struct field `{0}`")]
    UnknownField(String),
    /// A projection had no arm matching the value's tag and no default.
    #[error("no projection arm for {0}")]
    NoProjection(TypeTag),
    /// Pop on an empty operand stack.
    #[error("operand stack underflow")]
    StackUnderflow,
    /// Bind over incompatible directions or element sizes.
    #[error("channel mismatch: {0}")]
    ChannelMismatch(String),
    /// `SEND`/`RECEIVE`/`CONNECT` named a channel not in the table.
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
}

impl Fault {
    /// Whether this fault terminates the component that raised it.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Fault::UnknownOpcode(_) | Fault::NoProjection(_) | Fault::ChannelMismatch(_)
        )
    }
}

/// Result of an interpreter operation.
pub type OpResult<T> = Result<T, Fault>;

/// Errors surfaced by the VM entry points, wrapping component faults and
/// the I/O failures of program loading.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// A component fault escaped to the caller.
    #[error(transparent)]
    Fault(#[from] Fault),
    /// The program source could not resolve a component.
    #[error("component `{name}` could not be loaded: {source}")]
    ComponentNotFound {
        /// The component name that failed to resolve.
        name: String,
        /// The underlying I/O failure.
        source: io::Error,
    },
    /// I/O and OS related errors.
    #[error("unrecoverable error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispositions() {
        assert!(Fault::StackUnderflow.is_fatal());
        assert!(Fault::Protocol("x".into()).is_fatal());
        assert!(Fault::NoMatchingConstructor.is_fatal());
        assert!(!Fault::UnknownOpcode(0xf0).is_fatal());
        assert!(!Fault::NoProjection(TypeTag::Integer).is_fatal());
        assert!(!Fault::ChannelMismatch("dirs".into()).is_fatal());
    }
}
