//! Byte-at-a-time decoder over a seekable bytecode stream.

use std::sync::Arc;

use insense_asm::{Opcode, TypeTag};

use crate::error::{Fault, OpResult};
use crate::value::Value;

/// A seekable cursor over an immutable program image.
///
/// The image is shared (`Arc`), so re-opening a stream for the `RETURN`
/// protocol is a cheap clone. Positions are octet offsets from the start of
/// the file; the cursor doubles as the interpreter's instruction pointer.
#[derive(Debug, Clone)]
pub struct ByteStream {
    image: Arc<[u8]>,
    pos: usize,
}

impl ByteStream {
    /// Opens a stream at offset zero.
    pub fn new(image: Arc<[u8]>) -> Self {
        Self { image, pos: 0 }
    }

    /// The shared program image this stream reads.
    pub fn image(&self) -> &Arc<[u8]> {
        &self.image
    }

    /// Current octet offset.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Moves the cursor to an absolute offset.
    pub fn set_position(&mut self, pos: u64) -> OpResult<()> {
        if pos > self.image.len() as u64 {
            return Err(Fault::Protocol(format!(
                "seek to {pos} beyond stream end {}",
                self.image.len()
            )));
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Moves the cursor by a signed octet distance.
    pub fn seek_relative(&mut self, delta: i64) -> OpResult<()> {
        let target = self.pos as i64 + delta;
        if target < 0 {
            return Err(Fault::Protocol(format!(
                "seek by {delta} before stream start"
            )));
        }
        self.set_position(target as u64)
    }

    /// Reads one octet; `None` at end of stream.
    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.image.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    /// Looks at the next octet without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.image.get(self.pos).copied()
    }

    fn read_array<const N: usize>(&mut self) -> OpResult<[u8; N]> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|end| *end <= self.image.len())
            .ok_or_else(|| Fault::Protocol("stream ended inside a literal".into()))?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.image[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }

    /// Reads a four-octet big-endian signed integer.
    pub fn read_i32(&mut self) -> OpResult<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    /// Reads a four-octet big-endian unsigned integer.
    pub fn read_u32(&mut self) -> OpResult<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Reads an eight-octet big-endian IEEE-754 double.
    pub fn read_f64(&mut self) -> OpResult<f64> {
        self.read_array().map(f64::from_be_bytes)
    }

    fn read_operand_byte(&mut self, what: &str) -> OpResult<u8> {
        self.read_byte()
            .ok_or_else(|| Fault::Protocol(format!("stream ended reading {what}")))
    }

    /// Reads the type-tag octet of a literal.
    pub fn read_type_tag(&mut self) -> OpResult<TypeTag> {
        let b = self.read_operand_byte("a type tag")?;
        TypeTag::try_from(b).map_err(|e| Fault::Protocol(e.to_string()))
    }

    /// Reads the octets of a NUL-terminated string whose tag octet is
    /// already consumed.
    ///
    /// `\` escapes `n` (newline) and itself; any other escaped octet is
    /// preserved together with the backslash. Strings carry no text
    /// encoding, so the octets are returned exactly as decoded.
    pub fn read_raw_octets(&mut self) -> OpResult<Vec<u8>> {
        let mut octets = Vec::new();
        loop {
            match self.read_operand_byte("a string")? {
                0 => break,
                b'\\' => match self.read_operand_byte("a string escape")? {
                    b'n' => octets.push(b'\n'),
                    b'\\' => octets.push(b'\\'),
                    0 => {
                        octets.push(b'\\');
                        break;
                    }
                    other => {
                        octets.push(b'\\');
                        octets.push(other);
                    }
                },
                b => octets.push(b),
            }
        }
        Ok(octets)
    }

    /// Reads a NUL-terminated string used as a name (identifier, channel,
    /// procedure, or component). Names key the scope and channel tables,
    /// so they must be text; a name that is not valid UTF-8 is a protocol
    /// error rather than a silently altered binding.
    pub fn read_raw_string(&mut self) -> OpResult<String> {
        let octets = self.read_raw_octets()?;
        String::from_utf8(octets)
            .map_err(|e| Fault::Protocol(format!("name is not valid UTF-8: {e}")))
    }

    /// Reads a string operand, requiring its `STRING` type tag.
    pub fn expect_string(&mut self) -> OpResult<String> {
        match self.read_type_tag()? {
            TypeTag::String => self.read_raw_string(),
            other => Err(Fault::Protocol(format!(
                "expected a string operand, found tag {other}"
            ))),
        }
    }

    /// Reads a typed literal: one tag octet and its payload.
    pub fn read_literal(&mut self) -> OpResult<Value> {
        match self.read_type_tag()? {
            TypeTag::Integer => self.read_i32().map(Value::Integer),
            TypeTag::UnsignedInteger => self.read_u32().map(Value::Unsigned),
            TypeTag::Real => self.read_f64().map(Value::Real),
            TypeTag::Bool => Ok(Value::Bool(self.read_operand_byte("a bool")? != 0)),
            TypeTag::Byte => Ok(Value::Byte(self.read_operand_byte("a byte")?)),
            TypeTag::String => self
                .read_raw_octets()
                .map(|octets| Value::String(octets.into())),
            other => Err(Fault::Protocol(format!(
                "tag {other} cannot appear in a literal"
            ))),
        }
    }

    /// Reads a jump-distance operand: an `INTEGER` literal.
    pub fn read_distance(&mut self) -> OpResult<i32> {
        match self.read_type_tag()? {
            TypeTag::Integer => self.read_i32(),
            other => Err(Fault::Protocol(format!(
                "jump distance must be an INTEGER literal, found {other}"
            ))),
        }
    }

    fn skip_string(&mut self) -> OpResult<()> {
        // Escapes never encode a NUL octet, so a raw scan suffices.
        loop {
            match self.read_byte() {
                Some(0) | None => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn skip_tagged_string(&mut self) -> OpResult<()> {
        self.read_operand_byte("a string tag")?;
        self.skip_string()
    }

    fn skip_literal(&mut self) -> OpResult<()> {
        match self.read_type_tag()? {
            TypeTag::String => self.skip_string(),
            tag => match tag.payload_size() {
                Some(n) => self.seek_relative(n as i64),
                None => Err(Fault::Protocol(format!(
                    "tag {tag} cannot appear in a literal"
                ))),
            },
        }
    }

    fn skip_counted_params(&mut self) -> OpResult<()> {
        let count = self.read_operand_byte("a parameter count")?;
        for _ in 0..count {
            self.read_operand_byte("a parameter type")?;
            self.skip_tagged_string()?;
        }
        Ok(())
    }

    /// Consumes opcodes and their operands until a top-level opcode equal to
    /// `target` appears; returns it, or `None` at end of stream.
    ///
    /// When searching for `PROJECT_EXIT` the found opcode is left
    /// unconsumed for the outer dispatch loop; in particular a `BLOCKEND`
    /// immediately followed by `PROJECT_EXIT` ends the search with the
    /// cursor on the `PROJECT_EXIT` octet.
    pub fn skip_to_next(&mut self, target: Opcode) -> OpResult<Option<Opcode>> {
        loop {
            let Some(b) = self.read_byte() else {
                return Ok(None);
            };
            if b == target as u8 {
                if target == Opcode::PROJECT_EXIT {
                    self.seek_relative(-1)?;
                }
                return Ok(Some(target));
            }
            let Ok(op) = Opcode::try_from(b) else {
                // Unknown byte: resync on the next octet.
                continue;
            };
            if target == Opcode::PROJECT_EXIT
                && op == Opcode::BLOCKEND
                && self.peek_byte() == Some(Opcode::PROJECT_EXIT as u8)
            {
                return Ok(Some(Opcode::PROJECT_EXIT));
            }
            self.skip_operands(op)?;
        }
    }

    fn skip_operands(&mut self, op: Opcode) -> OpResult<()> {
        use Opcode::*;
        match op {
            STOP | LOAD | STORE | SEND | RECEIVE | PROCCALL => self.skip_tagged_string(),
            PUSH => self.skip_literal(),
            DECLARE => {
                self.skip_tagged_string()?;
                self.read_operand_byte("a declared type")?;
                Ok(())
            }
            COMPONENT => {
                self.skip_tagged_string()?;
                let interfaces = self.read_operand_byte("an interface count")?;
                for _ in 0..interfaces {
                    let channels = self.read_operand_byte("a channel count")?;
                    for _ in 0..channels {
                        self.read_operand_byte("a channel direction")?;
                        self.read_operand_byte("a channel type")?;
                        self.skip_tagged_string()?;
                    }
                }
                Ok(())
            }
            CALL => {
                self.skip_tagged_string()?;
                self.read_operand_byte("an argument count")?;
                Ok(())
            }
            CONSTRUCTOR => self.skip_counted_params(),
            BEHAVIOUR_JUMP | JUMP | IF | ELSE => self.skip_literal(),
            CONNECT => {
                for _ in 0..4 {
                    self.skip_tagged_string()?;
                }
                Ok(())
            }
            DISCONNECT => {
                self.skip_tagged_string()?;
                self.skip_tagged_string()
            }
            PROC => {
                self.skip_tagged_string()?;
                self.skip_counted_params()
            }
            STRUCT => {
                use insense_asm::StructOp;
                let sub = self.read_operand_byte("a struct sub-opcode")?;
                match StructOp::try_from(sub) {
                    Ok(StructOp::Constructor) => self.skip_counted_params(),
                    Ok(StructOp::Load) => self.skip_tagged_string(),
                    Err(e) => Err(Fault::Protocol(e.to_string())),
                }
            }
            PROJECT_ENTRY => {
                // The outer form carries a tagged name; arm headers carry a
                // bare type octet.
                if self.peek_byte() == Some(TypeTag::String as u8) {
                    self.skip_tagged_string()
                } else {
                    self.read_operand_byte("a projection arm type")?;
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}
