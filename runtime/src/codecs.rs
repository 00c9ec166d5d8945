//! Binary/text transcoding helpers: base64, hex, and deflate/gzip.
//!
//! Every fallible path here returns the documented error kind rather than a
//! generic failure: `BASE64-PARSE-ERROR`, `PARSE-HEX-ERROR`, `ZLIB-ERROR`.
//! These are pure functions over `&[u8]`/`&str` — no sink-raising here,
//! since raising belongs to the call site that knows the source location;
//! callers in `crate::eval`'s builtin dispatch turn an `Err` into a raised
//! `ErrorRecord`.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rune_core::sink::ErrorRecord;
use std::io::{Read, Write};

pub fn base64_encode(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

pub fn base64_decode(text: &str) -> Result<Vec<u8>, ErrorRecord> {
    BASE64_STANDARD
        .decode(text.trim())
        .map_err(|e| ErrorRecord::new("BASE64-PARSE-ERROR", e.to_string()))
}

pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn hex_decode(text: &str) -> Result<Vec<u8>, ErrorRecord> {
    hex::decode(text.trim()).map_err(|e| ErrorRecord::new("PARSE-HEX-ERROR", e.to_string()))
}

#[cfg(feature = "compression")]
pub fn gzip_compress(data: &[u8], level: u32) -> Result<Vec<u8>, ErrorRecord> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))?;
    encoder.finish().map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))
}

#[cfg(feature = "compression")]
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, ErrorRecord> {
    use flate2::read::GzDecoder;
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))?;
    Ok(out)
}

#[cfg(feature = "compression")]
pub fn deflate_compress(data: &[u8], level: u32) -> Result<Vec<u8>, ErrorRecord> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))?;
    encoder.finish().map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))
}

#[cfg(feature = "compression")]
pub fn deflate_decompress(data: &[u8]) -> Result<Vec<u8>, ErrorRecord> {
    use flate2::read::ZlibDecoder;
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ErrorRecord::new("ZLIB-ERROR", e.to_string()))?;
    Ok(out)
}
