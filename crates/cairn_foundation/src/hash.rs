//! FNV-1a content hashing.
//!
//! Hashes are computed over UTF-16 code units so that they agree with hashes
//! produced by other runtimes that store strings that way.

use crate::Value;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-16 code units of `text`.
#[must_use]
pub fn hash_str(text: &str) -> u32 {
    text.encode_utf16().fold(FNV_OFFSET, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Formats a hash as eight zero-padded lowercase hex digits.
#[must_use]
pub fn hash_to_string(hash: u32) -> String {
    format!("{hash:08x}")
}

/// Hashes the canonical JSON form of a value.
#[must_use]
pub fn hash_value(value: &Value) -> u32 {
    hash_str(&value.canonical_json())
}

/// Combines two hashes by hashing their string forms together.
#[must_use]
pub fn combine(a: u32, b: u32) -> u32 {
    hash_str(&format!("{}{}", hash_to_string(a), hash_to_string(b)))
}
