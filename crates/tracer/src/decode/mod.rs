//! Recovery of high-level values from their in-process representation.
//!
//! [`decode`] is total and side-effect free: whatever the backend reports, some string
//! comes back, in the worst case [`UNAVAILABLE`].

mod encoding;
mod shape;
mod type_name;

pub use encoding::KnownEncoding;
pub use shape::{DecodedShape, Field, ZERO_ADDRESS};
use strum::IntoEnumIterator;

use crate::backend::{MemoryReader, ValueHandle, UNAVAILABLE};

/// Nesting limit of the structural fallback. Deeper fields are reported unavailable.
const MAX_STRUCT_DEPTH: usize = 8;

/// Name used for fields the backend does not name.
pub const ANONYMOUS: &str = "<anon>";

/// Decode a value into its display string.
pub fn decode<V: ValueHandle>(value: &V, memory: &dyn MemoryReader) -> String {
    classify(value, memory).to_string()
}

/// Classify a value into a [`DecodedShape`] without rendering it.
pub fn classify<V: ValueHandle>(value: &V, memory: &dyn MemoryReader) -> DecodedShape {
    classify_at(value, memory, 0)
}

fn usable(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty() && !text.contains(UNAVAILABLE))
}

fn classify_at<V: ValueHandle>(value: &V, memory: &dyn MemoryReader, depth: usize) -> DecodedShape {
    let type_name = value.type_name().unwrap_or_default();

    // 1. known binary encodings
    if !type_name.is_empty() {
        for encoding in KnownEncoding::iter().filter(|encoding| encoding.matches(&type_name)) {
            if let Some(shape) = encoding.recognize(&type_name, value, memory) {
                trace!(%encoding, %type_name, "recognized known encoding");
                return shape;
            }
        }
    }

    // 2. scalar rendered by the backend
    if let Some(scalar) = usable(value.scalar()) {
        return DecodedShape::Scalar(scalar);
    }

    // 3. backend summary
    if let Some(summary) = usable(value.summary()) {
        return DecodedShape::Summary(summary);
    }

    // 4. field by field
    let children = value.children();
    if !children.is_empty() {
        if depth >= MAX_STRUCT_DEPTH {
            return DecodedShape::Unavailable;
        }

        let fields = children
            .iter()
            .map(|child| Field {
                name: child.name().unwrap_or_else(|| ANONYMOUS.to_string()),
                value: classify_at(child, memory, depth + 1),
            })
            .collect();
        return DecodedShape::Struct { type_name, fields };
    }

    DecodedShape::Unavailable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorded::{MemoryRegion, RecordedMemory, RecordedValue};

    fn uint256(limbs: [u64; 4]) -> RecordedValue {
        let bytes: Vec<u8> = limbs.iter().flat_map(|limb| limb.to_le_bytes()).collect();
        RecordedValue::new("amount", "ruint::Uint<256, 4>")
            .with_children(vec![RecordedValue::new("limbs", "unsigned long[4]").with_data(&bytes)])
    }

    fn int256(limbs: [u64; 4]) -> RecordedValue {
        let bytes: Vec<u8> = limbs.iter().flat_map(|limb| limb.to_le_bytes()).collect();
        RecordedValue::new("delta", "alloy_primitives::signed::int::Signed<256, 4>").with_children(
            vec![RecordedValue::new("0", "ruint::Uint<256, 4>").with_children(vec![
                RecordedValue::new("limbs", "unsigned long[4]").with_data(&bytes),
            ])],
        )
    }

    fn address(bytes: &[u8]) -> RecordedValue {
        RecordedValue::new("to", "alloy_primitives::bits::address::Address").with_children(vec![
            RecordedValue::new("0", "alloy_primitives::bits::fixed::FixedBytes<20>")
                .with_data(bytes),
        ])
    }

    #[test]
    fn test_decode_big_uint() {
        let memory = RecordedMemory::default();
        assert_eq!(decode(&&uint256([1, 0, 0, 0]), &memory), "1");
        assert_eq!(
            decode(&&uint256([u64::MAX, u64::MAX, u64::MAX, u64::MAX]), &memory),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn test_decode_big_uint_from_limb_elements() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("x", "ruint::Uint<128, 2>").with_children(vec![
            RecordedValue::new("limbs", "unsigned long[2]").with_children(vec![
                RecordedValue::new("[0]", "unsigned long").with_scalar("0"),
                RecordedValue::new("[1]", "unsigned long").with_scalar("1"),
            ]),
        ]);
        assert_eq!(decode(&&value, &memory), "18446744073709551616");
    }

    #[test]
    fn test_decode_big_int() {
        let memory = RecordedMemory::default();
        assert_eq!(decode(&&int256([u64::MAX; 4]), &memory), "-1");
        assert_eq!(decode(&&int256([42, 0, 0, 0]), &memory), "42");
    }

    #[test]
    fn test_big_int_without_wrapper_is_unavailable() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("delta", "alloy_primitives::signed::int::Signed<256, 4>")
            .with_scalar("12");
        assert_eq!(decode(&&value, &memory), UNAVAILABLE);

        let value = RecordedValue::new("delta", "alloy_primitives::signed::int::Signed<256, 4>")
            .with_summary(UNAVAILABLE)
            .with_children(vec![RecordedValue::new("0", "ruint::Uint<256, 4>")]);
        assert_eq!(decode(&&value, &memory), UNAVAILABLE);
    }

    #[test]
    fn test_decode_address() {
        let memory = RecordedMemory::default();
        assert_eq!(decode(&&address(&[0u8; 20]), &memory), ZERO_ADDRESS);

        let bytes: Vec<u8> = (1..=20).collect();
        assert_eq!(
            decode(&&address(&bytes), &memory),
            "0x0102030405060708090a0b0c0d0e0f1011121314"
        );
    }

    #[test]
    fn test_decode_fixed_bytes() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("selector", "alloy_primitives::bits::fixed::FixedBytes<4>")
            .with_children(vec![RecordedValue::new("0", "unsigned char[4]").with_data(&[
                0xa9, 0x05, 0x9c, 0xbb,
            ])]);
        assert_eq!(decode(&&value, &memory), "0xa9059cbb");
    }

    #[test]
    fn test_size_mismatch_falls_through() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("selector", "alloy_primitives::bits::fixed::FixedBytes<4>")
            .with_summary("[169, 5]")
            .with_children(vec![
                RecordedValue::new("0", "unsigned char[2]").with_data(&[0xa9, 0x05])
            ]);
        assert_eq!(decode(&&value, &memory), "[169, 5]");
    }

    #[test]
    fn test_decode_byte_slice_through_memory() {
        let memory = RecordedMemory {
            regions: vec![MemoryRegion { address: 0x1000, bytes: "0xdeadbeef".to_string() }],
        };
        let value = RecordedValue::new("data", "&[u8]").with_children(vec![
            RecordedValue::new("data_ptr", "unsigned char *").with_scalar("0x1000"),
            RecordedValue::new("length", "unsigned long").with_scalar("4"),
        ]);
        assert_eq!(decode(&&value, &memory), "0xdeadbeef");

        let empty = RecordedValue::new("data", "&[u8]").with_children(vec![
            RecordedValue::new("data_ptr", "unsigned char *").with_scalar("0x1"),
            RecordedValue::new("length", "unsigned long").with_scalar("0"),
        ]);
        assert_eq!(decode(&&empty, &memory), "0x");
    }

    #[test]
    fn test_decode_alloy_bytes_through_memory() {
        let memory = RecordedMemory {
            regions: vec![MemoryRegion { address: 0x3000, bytes: "0xcafe01".to_string() }],
        };
        let value = RecordedValue::new("calldata", "alloy_primitives::bytes_::Bytes")
            .with_children(vec![RecordedValue::new("0", "bytes::bytes::Bytes").with_children(
                vec![
                    RecordedValue::new("ptr", "const u8 *").with_scalar("0x3000"),
                    RecordedValue::new("len", "usize").with_scalar("3"),
                    RecordedValue::new("data", "core::sync::atomic::AtomicPtr<()>")
                        .with_summary("0x0"),
                    RecordedValue::new("vtable", "const bytes::bytes::Vtable *")
                        .with_scalar("0x5555"),
                ],
            )]);
        assert_eq!(classify(&&value, &memory), DecodedShape::ByteSlice(vec![0xca, 0xfe, 0x01]));
        assert_eq!(decode(&&value, &memory), "0xcafe01");
    }

    #[test]
    fn test_decode_nested_vec_through_memory() {
        let memory = RecordedMemory {
            regions: vec![MemoryRegion { address: 0x2000, bytes: "0x0102".to_string() }],
        };
        let value = RecordedValue::new("payload", "alloc::vec::Vec<u8, alloc::alloc::Global>")
            .with_children(vec![
                RecordedValue::new("buf", "alloc::raw_vec::RawVec<u8>").with_children(vec![
                    RecordedValue::new("ptr", "core::ptr::unique::Unique<u8>").with_children(vec![
                        RecordedValue::new("pointer", "core::ptr::non_null::NonNull<u8>")
                            .with_children(vec![RecordedValue::new("pointer", "u8 *")
                                .with_scalar("0x2000")]),
                    ]),
                    RecordedValue::new("cap", "usize").with_scalar("8"),
                ]),
                RecordedValue::new("len", "usize").with_scalar("2"),
            ]);
        assert_eq!(decode(&&value, &memory), "0x0102");
    }

    #[test]
    fn test_unreadable_slice_falls_back_to_structure() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("data", "&[u8]").with_children(vec![
            RecordedValue::new("data_ptr", "unsigned char *").with_scalar("0x1000"),
            RecordedValue::new("length", "unsigned long").with_scalar("4"),
        ]);
        assert_eq!(decode(&&value, &memory), "&[u8] { data_ptr=0x1000, length=4 }");
    }

    #[test]
    fn test_scalar_summary_and_terminal_fallbacks() {
        let memory = RecordedMemory::default();
        assert_eq!(decode(&&RecordedValue::new("n", "u32").with_scalar("7"), &memory), "7");
        assert_eq!(
            decode(&&RecordedValue::new("s", "&str").with_summary("\"hello\""), &memory),
            "\"hello\""
        );
        assert_eq!(
            decode(&&RecordedValue::new("n", "u32").with_scalar(UNAVAILABLE), &memory),
            UNAVAILABLE
        );
        assert_eq!(decode(&&RecordedValue::new("n", "u32"), &memory), UNAVAILABLE);
    }

    #[test]
    fn test_structural_fallback_recurses() {
        let memory = RecordedMemory::default();
        let value = RecordedValue::new("cfg", "erc20::Config").with_children(vec![
            RecordedValue::new("decimals", "u8").with_scalar("18"),
            uint256([5, 0, 0, 0]).renamed("cap"),
            RecordedValue::new("missing", "u8"),
        ]);
        assert_eq!(
            decode(&&value, &memory),
            "erc20::Config { decimals=18, cap=5, missing=<unavailable> }"
        );
    }
}
