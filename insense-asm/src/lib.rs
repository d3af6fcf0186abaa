//! Atomic types of the Insense VM.
//!
//! The bytecode format is a flat octet stream: one-octet opcodes followed by
//! their inline operands. This crate defines the opcode and type-tag bytes
//! together with the payload sizing rules; the interpreter and its stream
//! decoder live in the `insense-vm` crate.

#![warn(missing_docs)]

mod opcode;
mod type_tag;

pub use opcode::{InvalidOpcode, Opcode, StructOp};
pub use type_tag::{Direction, InvalidTypeTag, TypeTag};
