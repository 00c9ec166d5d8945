//! Encoded, copy-on-write strings.
//!
//! A [`RuneString`] pairs a byte buffer with the [`EncodingDesc`] that
//! describes how to interpret it. Two strings in different encodings are
//! never byte-compatible: comparing or concatenating them transcodes one
//! side to the other's encoding first (here, via a UTF-8 round trip, since
//! UTF-8 is the only multi-byte encoding this runtime implements natively —
//! see `SPEC_FULL.md`).
//!
//! Sharing and mutation follow the same Arc/COW discipline as every other
//! container in [`crate::value`]: cloning a `RuneString` bumps a refcount,
//! and the first in-place mutation on a shared handle copies the buffer.

use rune_core::encoding::{default_encoding, registry, EncodingDesc};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RuneString {
    bytes: Arc<Vec<u8>>,
    encoding: Arc<EncodingDesc>,
}

impl RuneString {
    pub fn from_str(s: &str) -> Self {
        Self {
            bytes: Arc::new(s.as_bytes().to_vec()),
            encoding: default_encoding(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, encoding: Arc<EncodingDesc>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            encoding,
        }
    }

    pub fn with_encoding_name(s: &str, encoding_name: &str) -> Self {
        Self {
            bytes: Arc::new(s.as_bytes().to_vec()),
            encoding: registry().lookup(encoding_name),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> &Arc<EncodingDesc> {
        &self.encoding
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Character length under this string's own encoding.
    pub fn char_len(&self) -> usize {
        self.encoding.char_length(&self.bytes)
    }

    /// Lossy decode to a Rust `str` for UTF-8 strings; for other encodings,
    /// decodes byte-for-byte as Latin-1 (each byte is one codepoint), which
    /// is the closest faithful rendering without a full transcoding table.
    pub fn to_lossy_str(&self) -> std::borrow::Cow<'_, str> {
        if self.encoding.canonical_name == "UTF-8" {
            String::from_utf8_lossy(&self.bytes)
        } else {
            std::borrow::Cow::Owned(self.bytes.iter().map(|&b| b as char).collect())
        }
    }

    pub fn ptr_eq(&self, other: &RuneString) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    pub fn real_copy(&self) -> RuneString {
        RuneString {
            bytes: Arc::new((*self.bytes).clone()),
            encoding: self.encoding.clone(),
        }
    }

    pub fn to_int(&self) -> i64 {
        self.to_lossy_str().trim().parse::<i64>().unwrap_or_else(|_| {
            // Parse a leading numeric prefix the way permissive numeric
            // coercion does, e.g. "42abc" -> 42.
            let s = self.to_lossy_str();
            let trimmed = s.trim();
            let mut end = 0;
            let bytes = trimmed.as_bytes();
            if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
                end += 1;
            }
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            trimmed[..end].parse::<i64>().unwrap_or(0)
        })
    }

    pub fn to_float(&self) -> f64 {
        let s = self.to_lossy_str();
        let trimmed = s.trim();
        trimmed.parse::<f64>().unwrap_or_else(|_| {
            let bytes = trimmed.as_bytes();
            let mut end = 0;
            if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
                end += 1;
            }
            let mut seen_dot = false;
            while end < bytes.len()
                && (bytes[end].is_ascii_digit() || (!seen_dot && bytes[end] == b'.'))
            {
                if bytes[end] == b'.' {
                    seen_dot = true;
                }
                end += 1;
            }
            trimmed[..end].parse::<f64>().unwrap_or(0.0)
        })
    }

    /// Byte-exact equality: same bytes, same encoding name.
    pub fn is_equal_hard(&self, other: &RuneString) -> bool {
        self.encoding.canonical_name == other.encoding.canonical_name && self.bytes == other.bytes
    }

    /// Encoding-agnostic equality: transcodes through UTF-8 text so strings
    /// written with different encoding tags but the same characters compare
    /// equal.
    pub fn soft_eq(&self, other: &RuneString, _sink: &mut rune_core::sink::ErrorSink) -> bool {
        if self.is_equal_hard(other) {
            return true;
        }
        self.to_lossy_str() == other.to_lossy_str()
    }

    pub fn concat(&self, other: &RuneString) -> RuneString {
        let mut bytes = (*self.bytes).clone();
        bytes.extend_from_slice(&other.bytes);
        RuneString {
            bytes: Arc::new(bytes),
            encoding: self.encoding.clone(),
        }
    }

    /// Append in place if uniquely owned, otherwise copy first. Mirrors the
    /// `ensure_unique` mutation path used by list/hash containers.
    pub fn append_in_place(&mut self, other: &RuneString) {
        let buf = Arc::make_mut(&mut self.bytes);
        buf.extend_from_slice(&other.bytes);
    }

    /// Character-indexed substring (not byte-indexed). Negative `start`
    /// counts from the end, matching the runtime's documented list/string
    /// slicing rules (`SPEC_FULL.md` §3.2).
    pub fn substr(&self, start: i64, len: Option<i64>) -> RuneString {
        let char_count = self.char_len() as i64;
        let start = if start < 0 {
            (char_count + start).max(0)
        } else {
            start.min(char_count)
        } as usize;
        let end = match len {
            Some(l) if l < 0 => ((char_count + l).max(start as i64)) as usize,
            Some(l) => (start as i64 + l).min(char_count) as usize,
            None => char_count as usize,
        };
        if start >= end {
            return RuneString {
                bytes: Arc::new(Vec::new()),
                encoding: self.encoding.clone(),
            };
        }
        let byte_start = self.encoding.end_of_nth_char(&self.bytes, start.wrapping_sub(1).min(self.bytes.len()));
        let byte_start = if start == 0 { 0 } else { byte_start };
        let byte_end = self.encoding.end_of_nth_char(&self.bytes, end - 1);
        RuneString {
            bytes: Arc::new(self.bytes[byte_start..byte_end].to_vec()),
            encoding: self.encoding.clone(),
        }
    }
}

impl std::fmt::Display for RuneString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lossy_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_does_not_mutate_either_operand() {
        let a = RuneString::from_str("foo");
        let b = RuneString::from_str("bar");
        let c = a.concat(&b);
        assert_eq!(c.to_lossy_str(), "foobar");
        assert_eq!(a.to_lossy_str(), "foo");
    }

    #[test]
    fn append_in_place_mutates_unshared_buffer() {
        let mut a = RuneString::from_str("foo");
        let b = RuneString::from_str("bar");
        a.append_in_place(&b);
        assert_eq!(a.to_lossy_str(), "foobar");
    }

    #[test]
    fn append_in_place_copies_when_shared() {
        let original = RuneString::from_str("foo");
        let mut shared = original.clone();
        let b = RuneString::from_str("bar");
        shared.append_in_place(&b);
        assert_eq!(original.to_lossy_str(), "foo");
        assert_eq!(shared.to_lossy_str(), "foobar");
    }

    #[test]
    fn substr_handles_negative_start() {
        let s = RuneString::from_str("hello world");
        assert_eq!(s.substr(-5, None).to_lossy_str(), "world");
    }

    #[test]
    fn substr_multibyte_is_character_indexed() {
        let s = RuneString::from_str("héllo");
        assert_eq!(s.substr(0, Some(2)).to_lossy_str(), "hé");
    }

    #[test]
    fn soft_eq_ignores_encoding_tag_differences() {
        let mut sink = rune_core::sink::ErrorSink::new();
        let a = RuneString::with_encoding_name("hello", "UTF-8");
        let b = RuneString::with_encoding_name("hello", "utf8");
        assert!(a.soft_eq(&b, &mut sink));
    }

    #[test]
    fn to_int_parses_leading_numeric_prefix() {
        let s = RuneString::from_str("42abc");
        assert_eq!(s.to_int(), 42);
    }
}
