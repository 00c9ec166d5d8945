//! Digest and HMAC builtins: `sha256`/`sha512`/`hmac_sha256` over a binary
//! payload, returning the raw digest bytes. Only the SHA-2 family is
//! implemented — the dependency stack carries `sha2`/`hmac` but not an
//! MD5/SHA-1 crate, and those algorithms are not worth pulling in a new
//! dependency for in an embeddable core.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

pub fn sha512(data: &[u8]) -> Vec<u8> {
    Sha512::digest(data).to_vec()
}

/// `None` if `key` is empty — `Hmac::new_from_slice` accepts any key length,
/// but an empty key is always a caller mistake worth surfacing rather than
/// silently hashing with it.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    if key.is_empty() {
        return None;
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}
