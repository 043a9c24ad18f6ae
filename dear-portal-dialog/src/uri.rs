//! `file://` URI handling.
//!
//! The portal returns selections as percent-encoded `file://` URIs. Decoding
//! is done in two passes: the first validates the escapes and computes the
//! exact decoded length, the second writes the bytes. Paths are arbitrary
//! bytes on Unix, so decoding yields `Vec<u8>` rather than `String`.

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use crate::error::{PortalError, PortalResult};

/// Scheme prefix every returned URI must carry.
pub const FILE_URI_PREFIX: &str = "file://";

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decoded length of a percent-encoded byte string, or `None` when an escape
/// is truncated or not followed by two hex digits.
///
/// NUL bytes, raw or escaped as `%00`, are rejected too: path sets use NUL as
/// their entry separator.
pub fn decoded_len(encoded: &[u8]) -> Option<usize> {
    let mut len = 0;
    let mut i = 0;
    while i < encoded.len() {
        match encoded[i] {
            0 => return None,
            b'%' => {
                let hi = hex_value(*encoded.get(i + 1)?)?;
                let lo = hex_value(*encoded.get(i + 2)?)?;
                if hi == 0 && lo == 0 {
                    return None;
                }
                i += 3;
            }
            _ => i += 1,
        }
        len += 1;
    }
    Some(len)
}

/// Decode a percent-encoded byte string into `out`.
///
/// The input must have been validated with [`decoded_len`]; invalid escapes
/// are copied through unchanged.
pub fn decode_into(encoded: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < encoded.len() {
        let b = encoded[i];
        if b == b'%' {
            let pair = encoded
                .get(i + 1)
                .and_then(|&h| hex_value(h))
                .zip(encoded.get(i + 2).and_then(|&l| hex_value(l)));
            if let Some((hi, lo)) = pair {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(b);
        i += 1;
    }
}

/// Strip the `file://` prefix and validate the rest.
///
/// Returns the encoded path and its decoded length.
pub(crate) fn validate_file_uri(uri: &str) -> PortalResult<(&[u8], usize)> {
    let encoded = uri.strip_prefix(FILE_URI_PREFIX).ok_or_else(|| {
        PortalError::decode("D-Bus freedesktop portal returned a URI that is not a file URI.")
    })?;
    let encoded = encoded.as_bytes();
    let len = decoded_len(encoded).ok_or_else(|| {
        PortalError::decode("D-Bus freedesktop portal returned a malformed URI.")
    })?;
    Ok((encoded, len))
}

/// Decode a `file://` URI into raw path bytes.
pub fn decode_file_uri(uri: &str) -> PortalResult<Vec<u8>> {
    let (encoded, len) = validate_file_uri(uri)?;
    let mut out = Vec::with_capacity(len);
    decode_into(encoded, &mut out);
    Ok(out)
}

/// Decode a `file://` URI into a path.
pub fn file_uri_to_path(uri: &str) -> PortalResult<PathBuf> {
    decode_file_uri(uri).map(|bytes| PathBuf::from(OsString::from_vec(bytes)))
}

/// Encode a path as a `file://` URI.
///
/// Each `/`-separated segment is percent-encoded on its own, so separators
/// survive and every other reserved byte becomes an uppercase `%XX` escape.
pub fn encode_file_uri(path: &Path) -> String {
    let bytes = path.as_os_str().as_bytes();
    let mut out = String::with_capacity(FILE_URI_PREFIX.len() + bytes.len());
    out.push_str(FILE_URI_PREFIX);
    for (i, segment) in bytes.split(|&b| b == b'/').enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&urlencoding::encode_binary(segment));
    }
    out
}

/// Whether the last path component has an extension.
///
/// Scans backward from the end: a `.` seen before any `/` means yes.
pub fn has_extension(path: &[u8]) -> bool {
    path.iter()
        .rev()
        .find(|&&b| b == b'/' || b == b'.')
        .is_some_and(|&b| b == b'.')
}

/// Extension (with its dot) named by a filter glob.
///
/// Recognizes `*.ext`, where `ext` may use case-bracket groups such as
/// `[pP][nN][gG]` (collapsed to the lowercase letter). Bare `*` and any other
/// form yield `None`.
pub fn extension_from_glob(glob: &str) -> Option<String> {
    let rest = glob.strip_prefix("*.")?;
    let bytes = rest.as_bytes();
    let mut ext = String::from(".");
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                let group = bytes.get(i + 1..i + 4)?;
                let (lower, upper) = (group[0], group[1]);
                if group[2] != b']'
                    || !lower.is_ascii_alphabetic()
                    || lower.to_ascii_uppercase() != upper
                    || !lower.is_ascii_lowercase()
                {
                    return None;
                }
                ext.push(char::from(lower));
                i += 4;
            }
            b'*' | b'?' | b']' | b'/' => return None,
            _ => {
                let ch = rest[i..].chars().next()?;
                ext.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    (ext.len() > 1).then_some(ext)
}

/// Append the extension named by `filter_glob` to a path lacking one.
///
/// Returns whether anything was appended.
pub fn append_extension(path: &mut Vec<u8>, filter_glob: Option<&str>) -> bool {
    if has_extension(path) {
        return false;
    }
    match filter_glob.and_then(extension_from_glob) {
        Some(ext) => {
            path.extend_from_slice(ext.as_bytes());
            true
        }
        None => false,
    }
}
