//! Process-wide character-encoding registry.
//!
//! Every [`EncodingDesc`] is looked up (and interned, if unknown) through a
//! single [`EncodingRegistry`], the same slot-table-free registry shape used
//! elsewhere in this crate for process-wide tables (compare the signal
//! handler table and built-in function registry in `rune-runtime`): a
//! `RwLock<HashMap<...>>` behind a `OnceLock`, read-mostly and cheap to
//! clone out of.
//!
//! String equality of encodings is by descriptor identity (`Arc` pointer),
//! not by name — two differently-cased spellings of the same canonical name
//! resolve to the *same* `Arc<EncodingDesc>`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// A character-length function: given the byte buffer, how many characters
/// does it contain. Absent for single-byte encodings, where character length
/// equals byte length.
pub type CharLenFn = fn(&[u8]) -> usize;

/// Given the byte buffer and a character index, the byte offset one past the
/// end of that character (used to slice multi-byte strings correctly).
pub type EndOfNthCharFn = fn(&[u8], usize) -> usize;

/// Given the byte buffer and a byte offset, the character position that
/// offset falls within.
pub type ByteOffsetToCharPosFn = fn(&[u8], usize) -> usize;

/// An encoding descriptor. Two descriptors are the same encoding iff they
/// are the same `Arc` allocation — see [`EncodingRegistry::lookup`].
pub struct EncodingDesc {
    pub canonical_name: String,
    pub char_len: Option<CharLenFn>,
    pub end_of_nth_char: Option<EndOfNthCharFn>,
    pub byte_offset_to_char_pos: Option<ByteOffsetToCharPosFn>,
}

impl std::fmt::Debug for EncodingDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingDesc")
            .field("canonical_name", &self.canonical_name)
            .field("multi_byte", &self.char_len.is_some())
            .finish()
    }
}

impl EncodingDesc {
    fn single_byte(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            char_len: None,
            end_of_nth_char: None,
            byte_offset_to_char_pos: None,
        }
    }

    fn utf8() -> Self {
        Self {
            canonical_name: "UTF-8".to_string(),
            char_len: Some(utf8_char_len),
            end_of_nth_char: Some(utf8_end_of_nth_char),
            byte_offset_to_char_pos: Some(utf8_byte_offset_to_char_pos),
        }
    }

    /// True for single-byte encodings, where character-length operations
    /// degenerate to byte length.
    pub fn is_single_byte(&self) -> bool {
        self.char_len.is_none()
    }

    /// Character length of `bytes` under this encoding.
    pub fn char_length(&self, bytes: &[u8]) -> usize {
        match self.char_len {
            Some(f) => f(bytes),
            None => bytes.len(),
        }
    }

    /// Byte offset one past the end of the `n`th character (0-indexed).
    pub fn end_of_nth_char(&self, bytes: &[u8], n: usize) -> usize {
        match self.end_of_nth_char {
            Some(f) => f(bytes, n),
            None => (n + 1).min(bytes.len()),
        }
    }

    /// Character position containing byte offset `offset`.
    pub fn byte_offset_to_char_pos(&self, bytes: &[u8], offset: usize) -> usize {
        match self.byte_offset_to_char_pos {
            Some(f) => f(bytes, offset),
            None => offset,
        }
    }
}

fn utf8_char_len(bytes: &[u8]) -> usize {
    // Count bytes that are not UTF-8 continuation bytes (0b10xxxxxx).
    bytes.iter().filter(|&&b| b & 0xC0 != 0x80).count()
}

fn utf8_end_of_nth_char(bytes: &[u8], n: usize) -> usize {
    let mut seen = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        if b & 0xC0 != 0x80 {
            if seen == n + 1 {
                return i;
            }
            seen += 1;
        }
    }
    bytes.len()
}

fn utf8_byte_offset_to_char_pos(bytes: &[u8], offset: usize) -> usize {
    let offset = offset.min(bytes.len());
    utf8_char_len(&bytes[..offset])
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Process-wide registry mapping canonical names and aliases to encoding
/// descriptors. Lookups are case-insensitive; unknown names are created on
/// demand as opaque single-byte encodings so round-tripping a user-supplied
/// name never fails.
pub struct EncodingRegistry {
    by_key: RwLock<HashMap<String, Arc<EncodingDesc>>>,
}

impl EncodingRegistry {
    fn new() -> Self {
        let registry = Self {
            by_key: RwLock::new(HashMap::new()),
        };
        registry.seed_defaults();
        registry
    }

    fn seed_defaults(&self) {
        self.register_with_aliases(Arc::new(EncodingDesc::utf8()), &["UTF8", "UTF-8"]);
        self.register_with_aliases(
            Arc::new(EncodingDesc::single_byte("ISO-8859-1")),
            &["ISO-8859-1", "ISO8859-1", "LATIN1", "LATIN-1"],
        );
        self.register_with_aliases(Arc::new(EncodingDesc::single_byte("ASCII")), &["ASCII", "US-ASCII"]);
    }

    fn register_with_aliases(&self, desc: Arc<EncodingDesc>, aliases: &[&str]) {
        let mut map = self.by_key.write().expect("encoding registry poisoned");
        for alias in aliases {
            map.insert(normalize(alias), desc.clone());
        }
    }

    /// Look up an encoding by name, creating an opaque single-byte encoding
    /// on demand if the name is unknown. Lookups are case-insensitive.
    pub fn lookup(&self, name: &str) -> Arc<EncodingDesc> {
        let key = normalize(name);
        if let Some(desc) = self.by_key.read().expect("encoding registry poisoned").get(&key) {
            return desc.clone();
        }
        let mut map = self.by_key.write().expect("encoding registry poisoned");
        // Re-check under the write lock: another thread may have raced us.
        if let Some(desc) = map.get(&key) {
            return desc.clone();
        }
        let desc = Arc::new(EncodingDesc::single_byte(name.trim().to_string()));
        map.insert(key, desc.clone());
        desc
    }

    /// True if `name` is already registered (without creating it on demand).
    pub fn is_known(&self, name: &str) -> bool {
        self.by_key
            .read()
            .expect("encoding registry poisoned")
            .contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.by_key.read().expect("encoding registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static REGISTRY: OnceLock<EncodingRegistry> = OnceLock::new();

/// The process-wide encoding registry.
pub fn registry() -> &'static EncodingRegistry {
    REGISTRY.get_or_init(EncodingRegistry::new)
}

/// Shorthand for `registry().lookup("UTF-8")`, the default encoding new
/// string literals are created with.
pub fn default_encoding() -> Arc<EncodingDesc> {
    registry().lookup("UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let a = registry().lookup("utf-8");
        let b = registry().lookup("UTF-8");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_name_round_trips_as_opaque_single_byte() {
        let name = "X-MY-CUSTOM-ENCODING";
        assert!(!registry().is_known(name));
        let first = registry().lookup(name);
        assert!(first.is_single_byte());
        let second = registry().lookup(name);
        assert!(Arc::ptr_eq(&first, &second), "same name must resolve to same descriptor");
    }

    #[test]
    fn identity_equality_not_name_equality() {
        let utf8 = registry().lookup("UTF-8");
        let custom = registry().lookup("totally-different-name");
        assert!(!Arc::ptr_eq(&utf8, &custom));
    }

    #[test]
    fn utf8_char_length_counts_characters_not_bytes() {
        let utf8 = registry().lookup("UTF-8");
        let bytes = "héllo".as_bytes(); // é is 2 bytes in UTF-8
        assert_eq!(bytes.len(), 6);
        assert_eq!(utf8.char_length(bytes), 5);
        assert!(utf8.char_length(bytes) <= bytes.len());
    }

    #[test]
    fn single_byte_char_length_equals_byte_length() {
        let latin1 = registry().lookup("LATIN1");
        let bytes = b"hello";
        assert_eq!(latin1.char_length(bytes), bytes.len());
    }
}
