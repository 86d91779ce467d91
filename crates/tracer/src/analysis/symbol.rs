//! Function identifier normalization and frame classification.
//!
//! Symbol names come straight from the backend's demangler, e.g.
//! `erc20::Token::transfer::h3f1c0d9e2a7b6c54` or
//! `<erc20::Token as stylus_sdk::abi::Router<S>>::route`.

/// Marker letter starting the compiler-generated disambiguation hash segment.
const HASH_MARKER: char = 'h';

/// Hex digits in a disambiguation hash.
const HASH_DIGITS: usize = 16;

/// Namespaces owned by the runtime and the standard library. Frames living there are
/// never considered as callers.
const RESERVED_NAMESPACES: &[&str] =
    &["std::", "core::", "alloc::", "stylus_sdk::", "__rust", "rust_", "_start", "lldb_"];

/// Substrings identifying generated ABI dispatch frames.
const ROUTER_MARKERS: &[&str] = &["Router::route", "::__stylus_router", "$router"];

/// Name a router frame normalizes to.
const ROUTER_LEAF: &str = "route";

/// Split a path on top-level `::`, ignoring separators nested in `<..>`, `(..)` or `[..]`.
pub fn split_path(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            // `->` inside a fn pointer type is not a closing bracket
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' | b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&name[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&name[start..]);

    segments
}

fn is_hash_segment(segment: &str) -> bool {
    segment.strip_prefix(HASH_MARKER).is_some_and(|digits| {
        digits.len() == HASH_DIGITS && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Remove a trailing `::h<hex>` disambiguation segment, if any.
pub fn strip_hash_suffix(name: &str) -> &str {
    let segments = split_path(name);
    if segments.len() < 2 {
        return name;
    }

    match segments.last() {
        Some(last) if is_hash_segment(last) => name
            .strip_suffix(last)
            .and_then(|rest| rest.strip_suffix("::"))
            .unwrap_or(name),
        _ => name,
    }
}

fn looks_like_type(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_uppercase()) && !segment.contains('_')
}

/// Key under which a function is tracked while active.
///
/// The hash suffix is dropped, then the path collapses to `Type::member` when the
/// next-to-last segment looks like a type, and to the bare leaf name otherwise.
pub fn normalize(name: &str) -> String {
    let stripped = strip_hash_suffix(name);
    let segments = split_path(stripped);

    match segments.as_slice() {
        [.., outer, leaf] if looks_like_type(outer) => format!("{outer}::{leaf}"),
        [.., leaf] => (*leaf).to_string(),
        [] => stripped.to_string(),
    }
}

/// Top-level namespace of a function including the trailing separator, e.g. `erc20::`.
pub fn namespace_prefix(name: &str) -> Option<&str> {
    let trimmed = name.trim_start_matches(['<', '&', '*', ' ']);
    trimmed.find("::").map(|idx| &trimmed[..idx + 2]).filter(|prefix| prefix.len() > 2)
}

/// Whether the function belongs to the runtime or the standard library.
pub fn is_runtime(name: &str) -> bool {
    let trimmed = name.trim_start_matches(['<', '&', '*', ' ']);
    RESERVED_NAMESPACES.iter().any(|ns| trimmed.starts_with(ns))
}

/// Whether the frame is generated ABI dispatch code.
pub fn is_router(name: &str) -> bool {
    ROUTER_MARKERS.iter().any(|marker| name.contains(marker)) || normalize(name) == ROUTER_LEAF
}

/// Whether a backtrace frame may be reported as the logical caller of a traced call.
pub fn is_caller_candidate(name: &str) -> bool {
    name.contains("::") && !is_runtime(name) && !is_router(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_respects_generics() {
        assert_eq!(
            split_path("<erc20::Token as stylus_sdk::abi::Router<S>>::route"),
            vec!["<erc20::Token as stylus_sdk::abi::Router<S>>", "route"]
        );
        assert_eq!(split_path("<fn() -> u8 as a::B>::c"), vec!["<fn() -> u8 as a::B>", "c"]);
        assert_eq!(split_path("main"), vec!["main"]);
    }

    #[test]
    fn test_strip_hash_suffix() {
        assert_eq!(
            strip_hash_suffix("erc20::Token::mint::h0123abcd4567ef89"),
            "erc20::Token::mint"
        );
        assert_eq!(strip_hash_suffix("erc20::Token::hello"), "erc20::Token::hello");
        assert_eq!(strip_hash_suffix("erc20::h"), "erc20::h");
        assert_eq!(strip_hash_suffix("erc20::math::hadd"), "erc20::math::hadd");
        assert_eq!(strip_hash_suffix("h1234"), "h1234");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("erc20::Token::mint::h0123abcd4567ef89"), "Token::mint");
        assert_eq!(normalize("erc20::storage::load"), "load");
        assert_eq!(normalize("erc20::My_Type::load"), "load");
        assert_eq!(normalize("<erc20::Token as stylus_sdk::abi::Router<S>>::route"), "route");
        assert_eq!(normalize("user_entrypoint"), "user_entrypoint");
    }

    #[test]
    fn test_namespace_prefix() {
        assert_eq!(namespace_prefix("erc20::Token::mint"), Some("erc20::"));
        assert_eq!(namespace_prefix("<erc20::Token as core::ops::Drop>::drop"), Some("erc20::"));
        assert_eq!(namespace_prefix("main"), None);
    }

    #[test]
    fn test_caller_candidates() {
        assert!(is_caller_candidate("erc20::Token::mint"));
        assert!(!is_caller_candidate("main"));
        assert!(!is_caller_candidate("core::panicking::panic_fmt"));
        assert!(!is_caller_candidate("<alloc::vec::Vec<u8> as core::clone::Clone>::clone"));
        assert!(!is_caller_candidate("Router::route"));
        assert!(!is_caller_candidate("<erc20::Token as stylus_sdk::abi::Router<S>>::route"));
    }
}
