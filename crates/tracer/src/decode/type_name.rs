//! Parsing of the type names reported by the debug info.

/// The path part of a type name, without generic arguments or reference sigils.
pub fn base_path(type_name: &str) -> &str {
    let trimmed = type_name.trim().trim_start_matches(['&', '*']);
    let trimmed = trimmed.strip_prefix("mut ").unwrap_or(trimmed).trim_start();
    match trimmed.find('<') {
        Some(idx) => trimmed[..idx].trim_end(),
        None => trimmed,
    }
}

/// Last path segment of the base path, e.g. `Uint` for `ruint::Uint<256, 4>`.
pub fn leaf_name(type_name: &str) -> &str {
    let base = base_path(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Numeric generic arguments, e.g. `[256, 4]` for `ruint::Uint<256, 4>`.
///
/// Returns `None` if there are no generic arguments or any of them is not a number.
pub fn numeric_args(type_name: &str) -> Option<Vec<usize>> {
    let open = type_name.find('<')?;
    let close = type_name.rfind('>')?;
    if close <= open {
        return None;
    }

    type_name[open + 1..close]
        .split(',')
        .map(|arg| arg.trim().trim_end_matches("usize").trim_end_matches('_').parse().ok())
        .collect()
}

/// Length of a fixed-size byte array type such as `[u8; 32]`.
pub fn byte_array_len(type_name: &str) -> Option<usize> {
    let inner = type_name.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (elem, len) = inner.split_once(';')?;
    if elem.trim() != "u8" {
        return None;
    }
    len.trim().parse().ok()
}

/// Bit width encoded in an alias name such as `U256` or `I128`.
pub fn alias_bits(leaf: &str, marker: char) -> Option<usize> {
    let digits = leaf.strip_prefix(marker)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|bits| *bits > 0)
}

/// Number of 64-bit limbs needed for `bits` bits.
pub fn limbs_for(bits: usize) -> usize {
    bits.div_ceil(64)
}
