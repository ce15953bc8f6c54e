//! GSTIN (Indian Goods and Services Tax identifier) extraction
//!
//! A GSTIN is 15 characters: a 2-digit state code, a 10-character PAN, an
//! entity number, the letter `Z` and a check character.

use regex::Regex;
use std::sync::LazyLock;

static GSTIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}[A-Z]{5}\d{4}[A-Z][A-Z\d]Z[A-Z\d]").expect("GSTIN pattern is valid")
});

const CHECK_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Return the first GSTIN-shaped substring of `text`
pub fn extract_gstin(text: &str) -> Option<String> {
    GSTIN_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// Verify the mod-36 check character of a GSTIN
pub fn is_valid_checksum(gstin: &str) -> bool {
    let bytes = gstin.as_bytes();
    if bytes.len() != 15 {
        return false;
    }

    let mut sum = 0usize;
    for (i, byte) in bytes[..14].iter().enumerate() {
        let Some(value) = CHECK_ALPHABET.iter().position(|c| c == byte) else {
            return false;
        };
        let product = value * if i % 2 == 0 { 1 } else { 2 };
        sum += product / 36 + product % 36;
    }

    let check = CHECK_ALPHABET[(36 - sum % 36) % 36];
    bytes[14] == check
}
