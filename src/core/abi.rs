//! # ABI Tuple Codec
//!
//! Schema-driven encoder and decoder for the foreign chain's ABI tuple layout.
//!
//! Every cross-chain payload is a single tuple argument. Static fields occupy one
//! 32-byte head word each; dynamic fields put an offset (relative to the tuple
//! start) in the head and their data in the tail. A tuple containing any dynamic
//! field is itself dynamic and is preceded by a 32-byte offset word.
//!
//! ## Wire Format
//! ```text
//! dynamic tuple: [offset=0x20] [head_0 .. head_n-1] [tail ...]
//! static tuple:  [head_0 .. head_n-1]
//!
//! address   : 12 zero bytes + 20 address bytes
//! uint8/64  : left-padded big-endian integer
//! uint256   : 32-byte big-endian integer
//! bytes     : [len] [data, right-padded to 32]
//! T[]       : [len] [word_0 .. word_len-1]
//! ```
//!
//! ## Security
//! - Offsets and lengths are bounds-checked before any slice or allocation
//! - Array lengths are checked against the remaining input, so a forged length
//!   cannot trigger a large allocation
//! - Narrow integers and addresses must carry zero padding
//! - Decoding never panics on untrusted input

use crate::core::primitives::{Address, U256, ADDRESS_LEN};
use crate::error::{constants, ProtocolError, Result};

/// Size of one ABI word
pub const WORD: usize = 32;

/// Field kinds used by the protocol's payload schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiKind {
    Address,
    Uint8,
    Uint64,
    Uint256,
    AddressArray,
    Uint64Array,
    Bytes,
    String,
}

impl AbiKind {
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            AbiKind::AddressArray | AbiKind::Uint64Array | AbiKind::Bytes | AbiKind::String
        )
    }

    /// Canonical type name as written by the foreign chain
    pub fn type_name(self) -> &'static str {
        match self {
            AbiKind::Address => "address",
            AbiKind::Uint8 => "uint8",
            AbiKind::Uint64 => "uint64",
            AbiKind::Uint256 => "uint256",
            AbiKind::AddressArray => "address[]",
            AbiKind::Uint64Array => "uint64[]",
            AbiKind::Bytes => "bytes",
            AbiKind::String => "string",
        }
    }
}

/// Whether a tuple with this schema is encoded with a leading offset word.
pub fn is_dynamic_tuple(schema: &[AbiKind]) -> bool {
    schema.iter().any(|kind| kind.is_dynamic())
}

/// Tuple signature, e.g. `(address,uint256,bytes)`.
pub fn tuple_signature(schema: &[AbiKind]) -> String {
    let names: Vec<&str> = schema.iter().map(|kind| kind.type_name()).collect();
    format!("({})", names.join(","))
}

/// A payload with a fixed ABI tuple schema.
pub trait AbiPackage: Sized {
    /// Field kinds in wire order
    const SCHEMA: &'static [AbiKind];

    fn encode_abi(&self) -> Vec<u8>;

    fn decode_abi(data: &[u8]) -> Result<Self>;
}

/// Builds one ABI tuple, field by field in schema order.
pub struct TupleEncoder {
    schema: &'static [AbiKind],
    head: Vec<u8>,
    tail: Vec<u8>,
    next: usize,
}

impl TupleEncoder {
    pub fn new(schema: &'static [AbiKind]) -> Self {
        Self {
            schema,
            head: Vec::with_capacity(schema.len() * WORD),
            tail: Vec::new(),
            next: 0,
        }
    }

    fn advance(&mut self, kind: AbiKind) {
        debug_assert_eq!(self.schema.get(self.next), Some(&kind), "field out of schema order");
        self.next += 1;
    }

    fn push_offset(&mut self) {
        let offset = self.schema.len() * WORD + self.tail.len();
        self.head.extend_from_slice(&usize_word(offset));
    }

    pub fn address(mut self, value: &Address) -> Self {
        self.advance(AbiKind::Address);
        self.head.extend_from_slice(&address_word(value));
        self
    }

    pub fn uint8(mut self, value: u8) -> Self {
        self.advance(AbiKind::Uint8);
        self.head.extend_from_slice(&u64_word(u64::from(value)));
        self
    }

    pub fn uint64(mut self, value: u64) -> Self {
        self.advance(AbiKind::Uint64);
        self.head.extend_from_slice(&u64_word(value));
        self
    }

    pub fn uint256(mut self, value: &U256) -> Self {
        self.advance(AbiKind::Uint256);
        self.head.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn address_array(mut self, values: &[Address]) -> Self {
        self.advance(AbiKind::AddressArray);
        self.push_offset();
        self.tail.extend_from_slice(&usize_word(values.len()));
        for value in values {
            self.tail.extend_from_slice(&address_word(value));
        }
        self
    }

    pub fn uint64_array(mut self, values: &[u64]) -> Self {
        self.advance(AbiKind::Uint64Array);
        self.push_offset();
        self.tail.extend_from_slice(&usize_word(values.len()));
        for value in values {
            self.tail.extend_from_slice(&u64_word(*value));
        }
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.advance(AbiKind::Bytes);
        self.push_bytes(value);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        self.advance(AbiKind::String);
        self.push_bytes(value.as_bytes());
        self
    }

    fn push_bytes(&mut self, value: &[u8]) {
        self.push_offset();
        self.tail.extend_from_slice(&usize_word(value.len()));
        self.tail.extend_from_slice(value);
        let padding = (WORD - value.len() % WORD) % WORD;
        self.tail.resize(self.tail.len() + padding, 0);
    }

    /// Finish the tuple, prefixing the offset word for dynamic tuples.
    pub fn finish(self) -> Vec<u8> {
        debug_assert_eq!(self.next, self.schema.len(), "tuple missing fields");
        let dynamic = is_dynamic_tuple(self.schema);
        let mut out =
            Vec::with_capacity(self.head.len() + self.tail.len() + if dynamic { WORD } else { 0 });
        if dynamic {
            out.extend_from_slice(&usize_word(WORD));
        }
        out.extend_from_slice(&self.head);
        out.extend_from_slice(&self.tail);
        out
    }
}

/// Reads one ABI tuple, field by field in schema order.
pub struct TupleDecoder<'a> {
    schema: &'static [AbiKind],
    tuple: &'a [u8],
    next: usize,
}

impl<'a> TupleDecoder<'a> {
    pub fn new(input: &'a [u8], schema: &'static [AbiKind]) -> Result<Self> {
        let tuple = if is_dynamic_tuple(schema) {
            let offset = word_to_usize(word_at(input, 0)?)?;
            if offset < WORD || offset > input.len() {
                return Err(ProtocolError::MalformedPackage(format!(
                    "tuple offset {offset} out of bounds"
                )));
            }
            &input[offset..]
        } else {
            input
        };

        if tuple.len() < schema.len() * WORD {
            return Err(ProtocolError::malformed(constants::ERR_TRUNCATED_PACKAGE));
        }

        Ok(Self {
            schema,
            tuple,
            next: 0,
        })
    }

    fn head_size(&self) -> usize {
        self.schema.len() * WORD
    }

    fn head_word(&mut self, kind: AbiKind) -> Result<&'a [u8]> {
        debug_assert_eq!(self.schema.get(self.next), Some(&kind), "field out of schema order");
        let word = word_at(self.tuple, self.next * WORD)?;
        self.next += 1;
        Ok(word)
    }

    /// Resolve a dynamic field's offset and return the slice starting at its length word.
    fn tail(&mut self, kind: AbiKind) -> Result<&'a [u8]> {
        let offset = word_to_usize(self.head_word(kind)?)?;
        let in_bounds = offset
            .checked_add(WORD)
            .is_some_and(|end| end <= self.tuple.len());
        if offset < self.head_size() || !in_bounds {
            return Err(ProtocolError::MalformedPackage(format!(
                "{} offset {offset} out of bounds",
                kind.type_name()
            )));
        }
        Ok(&self.tuple[offset..])
    }

    pub fn address(&mut self) -> Result<Address> {
        decode_address(self.head_word(AbiKind::Address)?)
    }

    pub fn uint8(&mut self) -> Result<u8> {
        let word = self.head_word(AbiKind::Uint8)?;
        if word[..WORD - 1].iter().any(|b| *b != 0) {
            return Err(ProtocolError::malformed("uint8 overflow"));
        }
        Ok(word[WORD - 1])
    }

    pub fn uint64(&mut self) -> Result<u64> {
        decode_u64(self.head_word(AbiKind::Uint64)?)
    }

    pub fn uint256(&mut self) -> Result<U256> {
        let word = self.head_word(AbiKind::Uint256)?;
        let mut raw = [0u8; WORD];
        raw.copy_from_slice(word);
        Ok(U256::from_be_bytes(raw))
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let tail = self.tail(AbiKind::Bytes)?;
        read_bytes(tail)
    }

    pub fn string(&mut self) -> Result<String> {
        let tail = self.tail(AbiKind::String)?;
        String::from_utf8(read_bytes(tail)?)
            .map_err(|_| ProtocolError::malformed("string is not valid UTF-8"))
    }

    pub fn address_array(&mut self) -> Result<Vec<Address>> {
        let tail = self.tail(AbiKind::AddressArray)?;
        let words = read_array_words(tail)?;
        words.chunks_exact(WORD).map(decode_address).collect()
    }

    pub fn uint64_array(&mut self) -> Result<Vec<u64>> {
        let tail = self.tail(AbiKind::Uint64Array)?;
        let words = read_array_words(tail)?;
        words.chunks_exact(WORD).map(decode_u64).collect()
    }

    /// Confirm that every schema field was consumed.
    pub fn finish(self) -> Result<()> {
        debug_assert_eq!(self.next, self.schema.len(), "tuple fields left unread");
        Ok(())
    }
}

fn word_at(data: &[u8], at: usize) -> Result<&[u8]> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_TRUNCATED_PACKAGE))
}

fn word_to_usize(word: &[u8]) -> Result<usize> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ProtocolError::malformed("offset or length overflow"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(raw))
        .map_err(|_| ProtocolError::malformed("offset or length overflow"))
}

fn decode_address(word: &[u8]) -> Result<Address> {
    if word[..WORD - ADDRESS_LEN].iter().any(|b| *b != 0) {
        return Err(ProtocolError::malformed("address has dirty padding"));
    }
    Address::from_slice(&word[WORD - ADDRESS_LEN..])
        .map_err(|_| ProtocolError::malformed("address has invalid length"))
}

fn decode_u64(word: &[u8]) -> Result<u64> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ProtocolError::malformed("uint64 overflow"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(raw))
}

/// `tail` starts at a length word; return the `len` bytes that follow it.
fn read_bytes(tail: &[u8]) -> Result<Vec<u8>> {
    let len = word_to_usize(word_at(tail, 0)?)?;
    tail.get(WORD..)
        .and_then(|data| data.get(..len))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ProtocolError::MalformedPackage(format!("byte length {len} out of bounds")))
}

/// `tail` starts at a length word; return the `len` element words that follow it.
fn read_array_words(tail: &[u8]) -> Result<&[u8]> {
    let len = word_to_usize(word_at(tail, 0)?)?;
    len.checked_mul(WORD)
        .and_then(|size| tail.get(WORD..)?.get(..size))
        .ok_or_else(|| ProtocolError::MalformedPackage(format!("array length {len} out of bounds")))
}

fn usize_word(value: usize) -> [u8; WORD] {
    u64_word(value as u64)
}

fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(value: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - ADDRESS_LEN..].copy_from_slice(value.as_bytes());
    word
}
