//! Transparent gzip unwrapping for inbound datagrams

use flate2::read::MultiGzDecoder;
use std::borrow::Cow;
use std::io::Read;

/// Leading bytes of a gzip member: magic `1F 8B` followed by the deflate method
pub const GZIP_SIGNATURE: [u8; 3] = [0x1F, 0x8B, 0x08];

/// Returns true if `bytes` starts with the gzip signature
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= GZIP_SIGNATURE.len() && bytes[..GZIP_SIGNATURE.len()] == GZIP_SIGNATURE
}

/// Decompress `bytes` if they carry the gzip signature.
///
/// Anything else, including a stream that looks like gzip but fails to
/// inflate, is returned untouched so plain payloads that happen to start
/// with the magic bytes still reach the parser.
pub fn decode(bytes: &[u8]) -> Cow<'_, [u8]> {
    if !is_gzip(bytes) {
        return Cow::Borrowed(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len() * 4);
    match MultiGzDecoder::new(bytes).read_to_end(&mut out) {
        Ok(_) => Cow::Owned(out),
        Err(_) => Cow::Borrowed(bytes),
    }
}
