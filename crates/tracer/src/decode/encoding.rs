//! Structural recognizers for well-known binary encodings.

use std::collections::VecDeque;

use alloy_primitives::{Address, U512};
use strum::{Display, EnumIter};

use super::{
    shape::DecodedShape,
    type_name::{alias_bits, base_path, byte_array_len, leaf_name, limbs_for, numeric_args},
};
use crate::backend::{MemoryReader, ValueHandle, UNAVAILABLE};

const ADDRESS_LEN: usize = 20;

/// Widest integer we reconstruct exactly.
const MAX_BITS: usize = 512;
const MAX_LIMBS: usize = MAX_BITS / 64;

/// Largest byte sequence we are willing to pull out of the debuggee.
const MAX_SLICE_LEN: usize = 1 << 20;

/// How deep to look for the pointer/length pair of a byte sequence.
const MAX_SLICE_DEPTH: usize = 6;

const POINTER_FIELDS: &[&str] = &["data_ptr", "ptr", "pointer"];
const LENGTH_FIELDS: &[&str] = &["length", "len"];

/// Dynamically-sized byte wrappers, matched on their base path.
const BYTE_SEQUENCE_TYPES: &[&str] = &[
    "alloy_primitives::bytes_::Bytes",
    "alloy_primitives::Bytes",
    "bytes::bytes::Bytes",
    "bytes::Bytes",
    "stylus_sdk::abi::bytes::Bytes",
    "stylus_sdk::abi::Bytes",
];

/// The set of encodings recognized before any generic fallback, in matching order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum KnownEncoding {
    Address,
    FixedBytes,
    BigUint,
    BigInt,
    ByteSlice,
}

impl KnownEncoding {
    /// Whether the reported type name belongs to this encoding.
    pub fn matches(&self, type_name: &str) -> bool {
        let leaf = leaf_name(type_name);
        match self {
            Self::Address => leaf == "Address" && !type_name.contains('<'),
            Self::FixedBytes => {
                leaf == "FixedBytes" ||
                    byte_array_len(type_name).is_some() ||
                    (base_path(type_name).starts_with("alloy_primitives") &&
                        alias_bits(leaf, 'B').is_some())
            }
            Self::BigUint => {
                leaf == "Uint" || (is_alias_path(type_name) && alias_bits(leaf, 'U').is_some())
            }
            Self::BigInt => {
                leaf == "Signed" || (is_alias_path(type_name) && alias_bits(leaf, 'I').is_some())
            }
            Self::ByteSlice => {
                let base = base_path(type_name);
                BYTE_SEQUENCE_TYPES.contains(&base) ||
                    is_u8_slice(type_name) ||
                    is_u8_vec(type_name)
            }
        }
    }

    /// Decode `value` if its structure has the expected shape.
    ///
    /// `None` means "not this encoding", and the next strategy is tried.
    pub fn recognize<V: ValueHandle>(
        &self,
        type_name: &str,
        value: &V,
        memory: &dyn MemoryReader,
    ) -> Option<DecodedShape> {
        match self {
            Self::Address => recognize_address(value),
            Self::FixedBytes => recognize_fixed_bytes(type_name, value),
            Self::BigUint => recognize_big_uint(type_name, value),
            Self::BigInt => recognize_big_int(type_name, value),
            Self::ByteSlice => recognize_byte_slice(value, memory),
        }
    }
}

fn is_alias_path(type_name: &str) -> bool {
    let base = base_path(type_name);
    base.starts_with("alloy_primitives") || base.starts_with("ruint::aliases")
}

fn is_u8_slice(type_name: &str) -> bool {
    matches!(base_path(type_name), "[u8]")
}

fn is_u8_vec(type_name: &str) -> bool {
    let base = base_path(type_name);
    (base == "alloc::vec::Vec" || base == "Vec") &&
        type_name
            .split_once('<')
            .map(|(_, args)| args.trim_start().starts_with("u8"))
            .unwrap_or(false)
}

/// Whether the backend itself gave up on the value.
fn reports_unavailable<V: ValueHandle>(value: &V) -> bool {
    let flagged = |text: Option<String>| text.is_some_and(|t| t.contains(UNAVAILABLE));
    flagged(value.scalar()) || flagged(value.summary())
}

/// Raw bytes of the value, falling back to its single wrapped field.
fn raw_bytes<V: ValueHandle>(value: &V, expected: usize) -> Option<Vec<u8>> {
    if let Some(data) = value.data().filter(|data| data.len() == expected) {
        return Some(data);
    }

    let children = value.children();
    match children.as_slice() {
        [inner] => inner.data().filter(|data| data.len() == expected),
        _ => None,
    }
}

fn recognize_address<V: ValueHandle>(value: &V) -> Option<DecodedShape> {
    let bytes = raw_bytes(value, ADDRESS_LEN)?;
    Some(DecodedShape::Address(Address::from_slice(&bytes)))
}

fn recognize_fixed_bytes<V: ValueHandle>(type_name: &str, value: &V) -> Option<DecodedShape> {
    let len = byte_array_len(type_name)
        .or_else(|| numeric_args(type_name).and_then(|args| args.first().copied()))
        .or_else(|| alias_bits(leaf_name(type_name), 'B'))?;
    raw_bytes(value, len).map(DecodedShape::FixedBytes)
}

/// Bit width and limb count declared by a big integer type name.
fn declared_width(type_name: &str, alias_marker: char) -> Option<(usize, usize)> {
    match numeric_args(type_name).as_deref() {
        Some([bits, limbs]) => Some((*bits, *limbs)),
        _ => alias_bits(leaf_name(type_name), alias_marker).map(|bits| (bits, limbs_for(bits))),
    }
}

/// Assemble little-endian 64-bit limbs into an integer.
pub(crate) fn assemble_limbs(bytes: &[u8], limbs: usize) -> Option<U512> {
    if limbs == 0 || limbs > MAX_LIMBS || bytes.len() != limbs * 8 {
        return None;
    }

    let mut words = [0u64; MAX_LIMBS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *word = u64::from_le_bytes(buf);
    }
    Some(U512::from_limbs(words))
}

/// Raw bytes of a limb array, read whole or assembled from its element children.
fn limb_array_bytes<V: ValueHandle>(array: &V, limbs: usize) -> Option<Vec<u8>> {
    if let Some(bytes) = raw_bytes(array, limbs * 8) {
        return Some(bytes);
    }

    let elements = array.children();
    if elements.len() != limbs {
        return None;
    }
    let words: Option<Vec<[u8; 8]>> =
        elements.iter().map(|element| element.as_u64().map(u64::to_le_bytes)).collect();
    words.map(|words| words.concat())
}

/// Locate the limb array of a `Uint` and return its raw bytes.
fn limb_bytes<V: ValueHandle>(value: &V, limbs: usize) -> Option<Vec<u8>> {
    match value.child("limbs") {
        Some(field) => limb_array_bytes(&field, limbs),
        None => raw_bytes(value, limbs * 8),
    }
}

fn recognize_big_uint<V: ValueHandle>(type_name: &str, value: &V) -> Option<DecodedShape> {
    let (bits, limbs) = declared_width(type_name, 'U')?;
    if bits > MAX_BITS {
        return None;
    }
    let bytes = limb_bytes(value, limbs)?;
    assemble_limbs(&bytes, limbs).map(DecodedShape::BigUint)
}

fn recognize_big_int<V: ValueHandle>(type_name: &str, value: &V) -> Option<DecodedShape> {
    let (bits, limbs) = declared_width(type_name, 'I')?;
    if bits == 0 || bits > MAX_BITS {
        return None;
    }
    if reports_unavailable(value) {
        return Some(DecodedShape::Unavailable);
    }

    // `Signed<BITS, LIMBS>(Uint<BITS, LIMBS>)`: the limbs live one level deeper.
    let Some(wrapper) = value.child("0").or_else(|| value.child("__0")) else {
        return Some(DecodedShape::Unavailable);
    };
    let Some(limb_field) = wrapper.child("limbs") else {
        return Some(DecodedShape::Unavailable);
    };

    let bytes = limb_array_bytes(&limb_field, limbs)?;
    let raw = assemble_limbs(&bytes, limbs)?;
    Some(signed_from_twos_complement(raw, bits))
}

/// Interpret the low `bits` bits of `raw` as a two's complement integer.
pub(crate) fn signed_from_twos_complement(raw: U512, bits: usize) -> DecodedShape {
    if !raw.bit(bits - 1) {
        return DecodedShape::BigInt { negative: false, magnitude: raw };
    }

    let magnitude =
        if bits == MAX_BITS { raw.wrapping_neg() } else { (U512::from(1u64) << bits) - raw };
    DecodedShape::BigInt { negative: true, magnitude }
}

/// Breadth-first search for the first descendant named like one of `names` that carries
/// an integer value.
fn find_integer_field<V: ValueHandle>(value: &V, names: &[&str]) -> Option<u64> {
    let mut queue: VecDeque<(V, usize)> =
        value.children().into_iter().map(|child| (child, 1)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        let named = node.name().is_some_and(|name| names.contains(&name.as_str()));
        if named {
            if let Some(number) = node.as_u64() {
                return Some(number);
            }
        }
        if depth < MAX_SLICE_DEPTH {
            queue.extend(node.children().into_iter().map(|child| (child, depth + 1)));
        }
    }

    None
}

/// Bytes of a backend-synthesized element list (`[0]`, `[1]`, ...).
fn synthetic_elements<V: ValueHandle>(value: &V) -> Option<Vec<u8>> {
    let children = value.children();
    if children.is_empty() {
        return None;
    }

    children
        .iter()
        .map(|child| {
            let indexed = child.name().is_some_and(|name| name.starts_with('['));
            if !indexed {
                return None;
            }
            child.as_u64().and_then(|byte| u8::try_from(byte).ok())
        })
        .collect()
}

fn recognize_byte_slice<V: ValueHandle>(
    value: &V,
    memory: &dyn MemoryReader,
) -> Option<DecodedShape> {
    let pointer = find_integer_field(value, POINTER_FIELDS);
    let length = find_integer_field(value, LENGTH_FIELDS);

    match (pointer, length) {
        (_, Some(0)) => Some(DecodedShape::ByteSlice(Vec::new())),
        (Some(pointer), Some(length)) => {
            let length = usize::try_from(length).ok().filter(|len| *len <= MAX_SLICE_LEN)?;
            match memory.read_memory(pointer, length) {
                Ok(bytes) if bytes.len() == length => Some(DecodedShape::ByteSlice(bytes)),
                Ok(bytes) => {
                    trace!(pointer, length, read = bytes.len(), "short read of byte sequence");
                    None
                }
                Err(err) => {
                    trace!(pointer, length, "failed to read byte sequence: {err}");
                    None
                }
            }
        }
        _ => synthetic_elements(value).map(DecodedShape::ByteSlice),
    }
}
