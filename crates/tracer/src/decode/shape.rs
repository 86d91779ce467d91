use std::fmt::{self, Display};

use alloy_primitives::{Address, U512};
use itertools::Itertools;

use crate::backend::UNAVAILABLE;

/// Rendering of the all-zero address.
pub const ZERO_ADDRESS: &str = "<zero address>";

/// The recognized shape of a debuggee value.
///
/// Classification and rendering are separate steps: recognizers only produce shapes,
/// and the [`Display`] implementation is the single place that turns them into text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedShape {
    /// Fixed-size byte blob, rendered big-endian as `0x`-prefixed hex.
    FixedBytes(Vec<u8>),
    /// Arbitrary-precision unsigned integer, rendered in decimal.
    BigUint(U512),
    /// Arbitrary-precision signed integer as sign and magnitude, rendered in decimal.
    BigInt { negative: bool, magnitude: U512 },
    /// A 20-byte account address.
    Address(Address),
    /// Dynamically-sized byte sequence.
    ByteSlice(Vec<u8>),
    /// Primitive scalar rendered by the backend.
    Scalar(String),
    /// Human summary provided by the backend.
    Summary(String),
    /// Composite value decoded field by field.
    Struct { type_name: String, fields: Vec<Field> },
    /// Nothing could be recovered.
    Unavailable,
}

/// One named field of a [`DecodedShape::Struct`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: DecodedShape,
}

impl DecodedShape {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl Display for DecodedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedBytes(bytes) | Self::ByteSlice(bytes) => {
                write!(f, "{}", hex::encode_prefixed(bytes))
            }
            Self::BigUint(value) => write!(f, "{value}"),
            Self::BigInt { negative, magnitude } => {
                if *negative && !magnitude.is_zero() {
                    write!(f, "-{magnitude}")
                } else {
                    write!(f, "{magnitude}")
                }
            }
            Self::Address(address) if address.is_zero() => f.write_str(ZERO_ADDRESS),
            Self::Address(address) => write!(f, "{}", hex::encode_prefixed(address.as_slice())),
            Self::Scalar(text) | Self::Summary(text) => f.write_str(text),
            Self::Struct { type_name, fields } => {
                if !type_name.is_empty() {
                    write!(f, "{type_name} ")?;
                }
                write!(
                    f,
                    "{{ {} }}",
                    fields.iter().map(|field| format!("{}={}", field.name, field.value)).join(", ")
                )
            }
            Self::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}
