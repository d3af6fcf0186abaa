//! The universal runtime datum carried through the interpreter.

use std::fmt;
use std::sync::Arc;

use insense_asm::TypeTag;

use crate::collections::NameMap;
use crate::component::ComponentHandle;
use crate::error::{Fault, OpResult};
use crate::reader::ByteStream;

/// Octet payload of a STRING value.
///
/// The format defines strings as NUL-terminated octet sequences with no
/// text encoding attached, so the payload is kept as raw octets and
/// round-trips exactly through literals and channel payloads. Formatting
/// decodes UTF-8 leniently for diagnostics and program output only; the
/// stored octets are never altered.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteString(Vec<u8>);

impl ByteString {
    /// Wraps raw octets.
    pub fn new(octets: Vec<u8>) -> Self {
        Self(octets)
    }

    /// The octets themselves.
    pub fn as_octets(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps into the raw octets.
    pub fn into_octets(self) -> Vec<u8> {
        self.0
    }

    /// Number of octets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string holds no octets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(octets: Vec<u8>) -> Self {
        Self(octets)
    }
}

impl From<&str> for ByteString {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A typed value: the pair of a type tag and its payload.
///
/// Sharing follows the strong/weak discipline of the runtime: component
/// handles are strong `Arc` references, scope and operand-stack slots own
/// their values and clone on load. The two trailing variants are
/// interpreter-internal plumbing for the `RETURN` protocol and never
/// originate from program literals.
#[derive(Debug, Clone)]
pub enum Value {
    /// Signed 32-bit integer.
    Integer(i32),
    /// Unsigned 32-bit integer.
    Unsigned(u32),
    /// IEEE-754 binary64.
    Real(f64),
    /// Boolean.
    Bool(bool),
    /// Single octet.
    Byte(u8),
    /// Octet string.
    String(ByteString),
    /// Reserved by the format; no opcode constructs arrays.
    Array(Vec<Value>),
    /// Handle to a running component.
    Component(Arc<ComponentHandle>),
    /// Ordered field map built by `STRUCT_CONSTRUCTOR`.
    Struct(NameMap<Value>),
    /// Type-erased wrapper keeping the inner value's original tag.
    Any(Box<Value>),
    /// Stream offset recorded by `PROCCALL`, consumed by `RETURN`.
    ReturnAddress(u64),
    /// Suspended stream recorded by a global `PROCCALL`.
    Stream(ByteStream),
}

impl Value {
    /// The type tag this value carries.
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::Unsigned(_) => TypeTag::UnsignedInteger,
            Value::Real(_) => TypeTag::Real,
            Value::Bool(_) => TypeTag::Bool,
            Value::Byte(_) => TypeTag::Byte,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Component(_) => TypeTag::Component,
            Value::Struct(_) => TypeTag::Struct,
            Value::Any(_) => TypeTag::Any,
            Value::ReturnAddress(_) | Value::Stream(_) => TypeTag::Unknown,
        }
    }

    /// Whether arithmetic and comparison operators accept this value.
    pub fn is_numeric(&self) -> bool {
        self.tag().is_numeric()
    }

    /// Widens a numeric value to a double for evaluation.
    pub fn as_f64(&self) -> OpResult<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Unsigned(u) => Ok(*u as f64),
            Value::Real(r) => Ok(*r),
            Value::Byte(b) => Ok(*b as f64),
            other => Err(Fault::TypeMismatch(format!(
                "expected a numeric operand, got {}",
                other.tag()
            ))),
        }
    }

    /// Narrows a double back to the given numeric result tag.
    pub fn from_f64(tag: TypeTag, v: f64) -> OpResult<Value> {
        match tag {
            TypeTag::Integer => Ok(Value::Integer(v as i32)),
            TypeTag::UnsignedInteger => Ok(Value::Unsigned(v as u32)),
            TypeTag::Real => Ok(Value::Real(v)),
            TypeTag::Byte => Ok(Value::Byte(v as u8)),
            other => Err(Fault::TypeMismatch(format!(
                "{other} is not a numeric result type"
            ))),
        }
    }

    /// Serializes the value into the octets a channel carries.
    pub fn payload(&self) -> OpResult<Vec<u8>> {
        match self {
            Value::Integer(i) => Ok(i.to_be_bytes().to_vec()),
            Value::Unsigned(u) => Ok(u.to_be_bytes().to_vec()),
            Value::Real(r) => Ok(r.to_be_bytes().to_vec()),
            Value::Bool(b) => Ok(vec![u8::from(*b)]),
            Value::Byte(b) => Ok(vec![*b]),
            Value::String(s) => Ok(s.as_octets().to_vec()),
            other => Err(Fault::TypeMismatch(format!(
                "{} values cannot cross a channel",
                other.tag()
            ))),
        }
    }

    /// Reconstructs a value of the given tag from channel octets.
    pub fn from_payload(tag: TypeTag, bytes: &[u8]) -> OpResult<Value> {
        let wrong_size = || {
            Fault::Protocol(format!(
                "payload of {} octets does not fit a {tag}",
                bytes.len()
            ))
        };
        match tag {
            TypeTag::Integer => Ok(Value::Integer(i32::from_be_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            ))),
            TypeTag::UnsignedInteger => Ok(Value::Unsigned(u32::from_be_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            ))),
            TypeTag::Real => Ok(Value::Real(f64::from_be_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            ))),
            TypeTag::Bool => match bytes {
                [b] => Ok(Value::Bool(*b != 0)),
                _ => Err(wrong_size()),
            },
            TypeTag::Byte => match bytes {
                [b] => Ok(Value::Byte(*b)),
                _ => Err(wrong_size()),
            },
            TypeTag::String => Ok(Value::String(ByteString::new(bytes.to_vec()))),
            other => Err(Fault::Protocol(format!(
                "{other} is not a receivable channel element type"
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Unsigned(a), Value::Unsigned(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Component(a), Value::Component(b)) => Arc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Any(a), Value::Any(b)) => a == b,
            (Value::ReturnAddress(a), Value::ReturnAddress(b)) => a == b,
            _ => false,
        }
    }
}
