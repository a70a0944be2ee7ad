//! ABI Word Codec
//!
//! Encodes and decodes values in the Solidity contract ABI layout, the format
//! the vault contract `abi.decode`s its thresholds from:
//!
//! - Every static value occupies one 32-byte big-endian word
//! - Integers are left-padded (signed values sign-extended)
//! - Addresses are left-padded, `bytesN` right-padded
//! - `bytes` and `string` are an offset word in the head, with the
//!   length word and right-padded data in the tail

use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

use super::types::FieldType;

/// Size of one ABI word
pub const WORD_SIZE: usize = 32;

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;

// ============================================================================
// Codec Errors
// ============================================================================

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Not enough data in buffer to decode
    #[error("buffer underflow: need {needed} bytes, have {available}")]
    BufferUnderflow { needed: usize, available: usize },

    /// Data does not represent a valid value
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Type width outside the catalog
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Integer does not fit the declared width
    #[error("value {value} out of range for {ty}")]
    ValueOutOfRange { ty: FieldType, value: String },

    /// More head words written than were reserved
    #[error("head overflow: reserved {reserved} words")]
    HeadOverflow { reserved: usize },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

// ============================================================================
// Values
// ============================================================================

/// A single typed value ready for ABI encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[serde(try_from = "AbiValueRepr")]
pub enum AbiValue {
    /// Unsigned integer with its bit width
    Uint(u16, BigInt),
    /// Signed integer with its bit width
    Int(u16, BigInt),
    /// Exactly N bytes for `bytesN`
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Address([u8; ADDRESS_LENGTH]),
    Bool(bool),
    String(String),
}

impl AbiValue {
    /// The catalog type this value encodes as, `None` if its width is not in the catalog
    pub fn field_type(&self) -> Option<FieldType> {
        let ty = match self {
            AbiValue::Uint(bits, _) => FieldType::Uint(*bits),
            AbiValue::Int(bits, _) => FieldType::Int(*bits),
            AbiValue::FixedBytes(b) => FieldType::FixedBytes(u8::try_from(b.len()).ok()?),
            AbiValue::Bytes(_) => FieldType::Bytes,
            AbiValue::Address(_) => FieldType::Address,
            AbiValue::Bool(_) => FieldType::Bool,
            AbiValue::String(_) => FieldType::String,
        };
        ty.is_cataloged().then_some(ty)
    }

    fn type_label(&self) -> String {
        match self {
            AbiValue::Uint(bits, _) => format!("uint{}", bits),
            AbiValue::Int(bits, _) => format!("int{}", bits),
            AbiValue::FixedBytes(b) => format!("bytes{}", b.len()),
            other => other.field_type().map(|ty| ty.to_string()).unwrap_or_default(),
        }
    }
}

/// Wire shape of [`AbiValue`], checked against the catalog on the way in
#[derive(Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum AbiValueRepr {
    Uint(u16, BigInt),
    Int(u16, BigInt),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Address([u8; ADDRESS_LENGTH]),
    Bool(bool),
    String(String),
}

impl TryFrom<AbiValueRepr> for AbiValue {
    type Error = CodecError;

    fn try_from(repr: AbiValueRepr) -> CodecResult<Self> {
        let value = match repr {
            AbiValueRepr::Uint(bits, v) => AbiValue::Uint(bits, v),
            AbiValueRepr::Int(bits, v) => AbiValue::Int(bits, v),
            AbiValueRepr::FixedBytes(b) => AbiValue::FixedBytes(b),
            AbiValueRepr::Bytes(b) => AbiValue::Bytes(b),
            AbiValueRepr::Address(a) => AbiValue::Address(a),
            AbiValueRepr::Bool(b) => AbiValue::Bool(b),
            AbiValueRepr::String(s) => AbiValue::String(s),
        };
        match value.field_type() {
            Some(_) => Ok(value),
            None => Err(CodecError::UnsupportedType(value.type_label())),
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(_, v) | AbiValue::Int(_, v) => write!(f, "{}", v),
            AbiValue::FixedBytes(b) | AbiValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            AbiValue::Address(a) => f.write_str(&to_checksum_address(a)),
            AbiValue::Bool(b) => write!(f, "{}", b),
            AbiValue::String(s) => f.write_str(s),
        }
    }
}

/// Parse a `0x`-prefixed 20-byte address (either case)
pub fn parse_address(value: &str) -> Option<[u8; ADDRESS_LENGTH]> {
    let digits = value.strip_prefix("0x")?;
    if digits.len() != ADDRESS_LENGTH * 2 {
        return None;
    }
    let mut address = [0u8; ADDRESS_LENGTH];
    hex::decode_to_slice(digits, &mut address).ok()?;
    Some(address)
}

/// Render an address with mixed-case checksum (EIP-55)
pub fn to_checksum_address(address: &[u8; ADDRESS_LENGTH]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let shift = if i % 2 == 0 { 4 } else { 0 };
        let nibble = (hash[i / 2] >> shift) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Encode Context
// ============================================================================

/// Context for encoding a tuple of values.
///
/// The number of head words is reserved up front so dynamic values can
/// compute their tail offsets as they are written.
pub struct EncodeContext {
    head: Vec<u8>,
    tail: Vec<u8>,
    /// Reserved head size in words
    head_words: usize,
}

impl EncodeContext {
    /// Create a context for a tuple with `head_words` members
    pub fn new(head_words: usize) -> Self {
        Self {
            head: Vec::with_capacity(head_words * WORD_SIZE),
            tail: Vec::new(),
            head_words,
        }
    }

    /// Bytes written to the head so far
    #[inline]
    pub fn position(&self) -> usize {
        self.head.len()
    }

    fn push_head(&mut self, word: [u8; WORD_SIZE]) -> CodecResult<usize> {
        if self.head.len() + WORD_SIZE > self.head_words * WORD_SIZE {
            return Err(CodecError::HeadOverflow {
                reserved: self.head_words,
            });
        }
        self.head.extend_from_slice(&word);
        Ok(WORD_SIZE)
    }

    /// Write an unsigned integer of the given width
    pub fn write_uint(&mut self, bits: u16, value: &BigInt) -> CodecResult<usize> {
        let ty = cataloged(FieldType::Uint(bits))?;
        if !ty.contains(value) {
            return Err(CodecError::ValueOutOfRange {
                ty,
                value: value.to_string(),
            });
        }
        let (_, magnitude) = value.to_bytes_be();
        self.push_head(left_pad(&magnitude, 0x00)?)
    }

    /// Write a signed integer of the given width (two's complement)
    pub fn write_int(&mut self, bits: u16, value: &BigInt) -> CodecResult<usize> {
        let ty = cataloged(FieldType::Int(bits))?;
        if !ty.contains(value) {
            return Err(CodecError::ValueOutOfRange {
                ty,
                value: value.to_string(),
            });
        }
        let fill = if value.sign() == Sign::Minus { 0xff } else { 0x00 };
        self.push_head(left_pad(&value.to_signed_bytes_be(), fill)?)
    }

    /// Write a small unsigned value
    pub fn write_u64(&mut self, value: u64) -> CodecResult<usize> {
        self.push_head(left_pad(&value.to_be_bytes(), 0x00)?)
    }

    pub fn write_address(&mut self, address: &[u8; ADDRESS_LENGTH]) -> CodecResult<usize> {
        self.push_head(left_pad(address, 0x00)?)
    }

    pub fn write_bool(&mut self, value: bool) -> CodecResult<usize> {
        self.write_u64(value as u64)
    }

    /// Write a `bytesN` value (1..=32 bytes, right-padded)
    pub fn write_fixed_bytes(&mut self, data: &[u8]) -> CodecResult<usize> {
        if data.is_empty() || data.len() > WORD_SIZE {
            return Err(CodecError::InvalidData(format!(
                "fixed bytes must be 1-32 bytes, got {}",
                data.len()
            )));
        }
        let mut word = [0u8; WORD_SIZE];
        word[..data.len()].copy_from_slice(data);
        self.push_head(word)
    }

    /// Write a dynamic `bytes`/`string` value: offset in the head, data in the tail
    pub fn write_dynamic(&mut self, data: &[u8]) -> CodecResult<usize> {
        let offset = self.head_words * WORD_SIZE + self.tail.len();
        self.write_u64(offset as u64)?;

        self.tail.extend_from_slice(&left_pad(&(data.len() as u64).to_be_bytes(), 0x00)?);
        self.tail.extend_from_slice(data);
        let padding = padded_len(data.len()) - data.len();
        self.tail.extend(std::iter::repeat(0u8).take(padding));

        Ok(WORD_SIZE * 2 + data.len() + padding)
    }

    /// Write any single value
    pub fn write_value(&mut self, value: &AbiValue) -> CodecResult<usize> {
        match value {
            AbiValue::Uint(bits, v) => self.write_uint(*bits, v),
            AbiValue::Int(bits, v) => self.write_int(*bits, v),
            AbiValue::FixedBytes(b) => self.write_fixed_bytes(b),
            AbiValue::Bytes(b) => self.write_dynamic(b),
            AbiValue::Address(a) => self.write_address(a),
            AbiValue::Bool(b) => self.write_bool(*b),
            AbiValue::String(s) => self.write_dynamic(s.as_bytes()),
        }
    }

    /// Concatenate head and tail into the final encoding
    pub fn finish(self) -> Vec<u8> {
        let mut out = self.head;
        out.extend_from_slice(&self.tail);
        out
    }
}

impl fmt::Debug for EncodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeContext")
            .field("head_words", &self.head_words)
            .field("head_len", &self.head.len())
            .field("tail_len", &self.tail.len())
            .finish()
    }
}

fn left_pad(data: &[u8], fill: u8) -> CodecResult<[u8; WORD_SIZE]> {
    if data.len() > WORD_SIZE {
        return Err(CodecError::InvalidData(format!(
            "{} bytes do not fit in one word",
            data.len()
        )));
    }
    let mut word = [fill; WORD_SIZE];
    word[WORD_SIZE - data.len()..].copy_from_slice(data);
    Ok(word)
}

fn cataloged(ty: FieldType) -> CodecResult<FieldType> {
    if ty.is_cataloged() {
        Ok(ty)
    } else {
        Err(CodecError::UnsupportedType(ty.to_string()))
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_SIZE) * WORD_SIZE
}

// ============================================================================
// Decode Context
// ============================================================================

/// Context for decoding a tuple of values from an encoded buffer
pub struct DecodeContext<'a> {
    buffer: &'a [u8],
    /// Current head position
    cursor: usize,
    /// Furthest byte touched, head or tail
    end: usize,
}

impl<'a> DecodeContext<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            cursor: 0,
            end: 0,
        }
    }

    /// Get current head position (bytes read)
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Get remaining bytes after the head cursor
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    fn slice_at(&mut self, offset: usize, len: usize) -> CodecResult<&'a [u8]> {
        let stop = offset.checked_add(len).ok_or_else(|| {
            CodecError::InvalidData(format!("offset {} overflows", offset))
        })?;
        if stop > self.buffer.len() {
            return Err(CodecError::BufferUnderflow {
                needed: stop,
                available: self.buffer.len(),
            });
        }
        self.end = self.end.max(stop);
        Ok(&self.buffer[offset..stop])
    }

    /// Read the next head word
    pub fn read_word(&mut self) -> CodecResult<&'a [u8]> {
        let word = self.slice_at(self.cursor, WORD_SIZE)?;
        self.cursor += WORD_SIZE;
        Ok(word)
    }

    /// Read a word as a length or offset
    pub fn read_usize(&mut self) -> CodecResult<usize> {
        let word = self.read_word()?;
        word_to_usize(word)
    }

    pub fn read_uint(&mut self, bits: u16) -> CodecResult<BigInt> {
        let ty = cataloged(FieldType::Uint(bits))?;
        let value = BigInt::from_bytes_be(Sign::Plus, self.read_word()?);
        check_range(ty, value)
    }

    pub fn read_int(&mut self, bits: u16) -> CodecResult<BigInt> {
        let ty = cataloged(FieldType::Int(bits))?;
        let value = BigInt::from_signed_bytes_be(self.read_word()?);
        check_range(ty, value)
    }

    pub fn read_address(&mut self) -> CodecResult<[u8; ADDRESS_LENGTH]> {
        let word = self.read_word()?;
        let (pad, body) = word.split_at(WORD_SIZE - ADDRESS_LENGTH);
        if pad.iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidData("dirty address padding".to_string()));
        }
        let mut address = [0u8; ADDRESS_LENGTH];
        address.copy_from_slice(body);
        Ok(address)
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        let word = self.read_word()?;
        match word_to_usize(word) {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(CodecError::InvalidData("bool word is not 0 or 1".to_string())),
        }
    }

    pub fn read_fixed_bytes(&mut self, len: usize) -> CodecResult<Vec<u8>> {
        if len == 0 || len > WORD_SIZE {
            return Err(CodecError::InvalidData(format!(
                "fixed bytes must be 1-32 bytes, got {}",
                len
            )));
        }
        let word = self.read_word()?;
        if word[len..].iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidData("dirty bytes padding".to_string()));
        }
        Ok(word[..len].to_vec())
    }

    /// Follow a head offset to a length-prefixed tail value
    pub fn read_dynamic(&mut self) -> CodecResult<&'a [u8]> {
        let offset = self.read_usize()?;
        let len = word_to_usize(self.slice_at(offset, WORD_SIZE)?)?;
        let data = self.slice_at(offset + WORD_SIZE, len)?;

        let padding = padded_len(len) - len;
        let pad = self.slice_at(offset + WORD_SIZE + len, padding)?;
        if pad.iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidData("dirty tail padding".to_string()));
        }
        Ok(data)
    }

    /// Read a single value of the given type
    pub fn read_value(&mut self, ty: FieldType) -> CodecResult<AbiValue> {
        Ok(match ty {
            FieldType::Uint(bits) => AbiValue::Uint(bits, self.read_uint(bits)?),
            FieldType::Int(bits) => AbiValue::Int(bits, self.read_int(bits)?),
            FieldType::FixedBytes(n) => AbiValue::FixedBytes(self.read_fixed_bytes(n as usize)?),
            FieldType::Bytes => AbiValue::Bytes(self.read_dynamic()?.to_vec()),
            FieldType::Address => AbiValue::Address(self.read_address()?),
            FieldType::Bool => AbiValue::Bool(self.read_bool()?),
            FieldType::String => {
                let raw = self.read_dynamic()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| CodecError::InvalidData(format!("string is not utf-8: {}", e)))?;
                AbiValue::String(s.to_string())
            }
        })
    }

    /// Fail if bytes remain beyond everything that was read
    pub fn finish(&self) -> CodecResult<()> {
        if self.end != self.buffer.len() {
            return Err(CodecError::InvalidData(format!(
                "{} trailing bytes",
                self.buffer.len().saturating_sub(self.end)
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("cursor", &self.cursor)
            .field("end", &self.end)
            .field("remaining", &self.remaining())
            .finish()
    }
}

fn word_to_usize(word: &[u8]) -> CodecResult<usize> {
    let (high, low) = word.split_at(WORD_SIZE - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(CodecError::InvalidData("length word too large".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| CodecError::InvalidData("length word too large".to_string()))
}

fn check_range(ty: FieldType, value: BigInt) -> CodecResult<BigInt> {
    if ty.contains(&value) {
        Ok(value)
    } else {
        Err(CodecError::ValueOutOfRange {
            ty,
            value: value.to_string(),
        })
    }
}

// ============================================================================
// Codec Trait
// ============================================================================

/// Trait for tuples that encode to and decode from the contract ABI
pub trait Codec: Sized {
    /// Number of head words this tuple occupies
    const HEAD_WORDS: usize;

    /// Encode this value into the context
    ///
    /// Returns the number of bytes written on success.
    fn encode(&self, ctx: &mut EncodeContext) -> CodecResult<usize>;

    /// Decode a value from the context
    fn decode(ctx: &mut DecodeContext) -> CodecResult<Self>;

    /// Encode into a fresh buffer
    fn to_abi(&self) -> CodecResult<Vec<u8>> {
        let mut ctx = EncodeContext::new(Self::HEAD_WORDS);
        self.encode(&mut ctx)?;
        Ok(ctx.finish())
    }

    /// Decode from a complete buffer, rejecting trailing bytes
    fn from_abi(data: &[u8]) -> CodecResult<Self> {
        let mut ctx = DecodeContext::new(data);
        let value = Self::decode(&mut ctx)?;
        ctx.finish()?;
        Ok(value)
    }
}

// ============================================================================
// Single Values
// ============================================================================

/// `abi.encode(value)` for one value
pub fn encode_value(value: &AbiValue) -> CodecResult<Vec<u8>> {
    let mut ctx = EncodeContext::new(1);
    ctx.write_value(value)?;
    Ok(ctx.finish())
}

/// `abi.decode(data, (ty))` for one value
pub fn decode_value(ty: FieldType, data: &[u8]) -> CodecResult<AbiValue> {
    let mut ctx = DecodeContext::new(data);
    let value = ctx.read_value(ty)?;
    ctx.finish()?;
    Ok(value)
}
