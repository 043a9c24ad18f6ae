//! Packed selection results.
//!
//! A [`PathSet`] keeps every selected path in one byte buffer:
//!
//! - a single selection is stored as its full path;
//! - a multi-selection stores the directory of the first item once, followed by
//!   the base name of each item.
//!
//! Every entry ends with a NUL and the buffer ends with one extra NUL. The
//! portal returns multi-selections from a single directory, which is what the
//! shared-directory layout relies on.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use crate::error::{PortalError, PortalResult};
use crate::uri::{decode_into, validate_file_uri};

/// Which part of a decoded path is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathPart {
    Full,
    Dirname,
    Basename,
}

fn trim_trailing_slashes(path: &[u8]) -> &[u8] {
    let end = path
        .iter()
        .rposition(|&b| b != b'/')
        .map_or(0, |i| i + 1);
    &path[..end]
}

/// POSIX `basename` on raw bytes.
pub fn basename(path: &[u8]) -> &[u8] {
    if path.is_empty() {
        return b".";
    }
    let trimmed = trim_trailing_slashes(path);
    if trimmed.is_empty() {
        return b"/";
    }
    match trimmed.iter().rposition(|&b| b == b'/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// POSIX `dirname` on raw bytes.
pub fn dirname(path: &[u8]) -> &[u8] {
    let trimmed = trim_trailing_slashes(path);
    if trimmed.is_empty() {
        return if path.is_empty() { b"." } else { b"/" };
    }
    match trimmed.iter().rposition(|&b| b == b'/') {
        None => b".",
        Some(i) => {
            let parent = trim_trailing_slashes(&trimmed[..i]);
            if parent.is_empty() { b"/" } else { parent }
        }
    }
}

fn part_of(path: &[u8], part: PathPart) -> &[u8] {
    match part {
        PathPart::Full => path,
        PathPart::Dirname => dirname(path),
        PathPart::Basename => basename(path),
    }
}

/// Double the capacity of `buf` until `needed` more bytes fit.
fn grow_for(buf: &mut Vec<u8>, needed: usize) {
    let len = buf.len();
    let mut cap = buf.capacity().max(1);
    if cap - len >= needed {
        return;
    }
    while cap - len < needed {
        cap *= 2;
    }
    buf.reserve_exact(cap - len);
}

/// Growable buffer the entries are written into.
///
/// Capacity starts at the configured size and doubles whenever the next write
/// would not fit.
struct PathSetBuilder {
    buf: Vec<u8>,
    count: usize,
    scratch: Vec<u8>,
}

impl PathSetBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.max(1)),
            count: 0,
            scratch: Vec::new(),
        }
    }

    fn push_uri(&mut self, uri: &str, part: PathPart) -> PortalResult<()> {
        let (encoded, decoded_len) = validate_file_uri(uri)?;
        if part == PathPart::Full {
            grow_for(&mut self.buf, decoded_len + 1);
            decode_into(encoded, &mut self.buf);
        } else {
            self.scratch.clear();
            decode_into(encoded, &mut self.scratch);
            let piece = part_of(&self.scratch, part);
            grow_for(&mut self.buf, piece.len() + 1);
            self.buf.extend_from_slice(piece);
        }
        self.buf.push(0);
        self.count += 1;
        Ok(())
    }

    fn finish(mut self) -> PathSet {
        grow_for(&mut self.buf, 1);
        self.buf.push(0);
        PathSet {
            buf: self.buf,
            count: self.count,
        }
    }
}

/// The paths selected in one dialog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathSet {
    buf: Vec<u8>,
    /// Number of selected items (not entries)
    count: usize,
}

impl PathSet {
    /// Assemble a set from the URIs returned by the portal.
    ///
    /// `capacity` is the initial buffer size in bytes. Fails on the first URI
    /// that cannot be decoded, or when `uris` is empty.
    pub fn from_uris<S: AsRef<str>>(uris: &[S], capacity: usize) -> PortalResult<Self> {
        let mut builder = PathSetBuilder::with_capacity(capacity);
        match uris {
            [] => {
                return Err(PortalError::protocol(
                    "D-Bus response signal has an empty URI list.",
                ));
            }
            [only] => builder.push_uri(only.as_ref(), PathPart::Full)?,
            [first, ..] => {
                builder.push_uri(first.as_ref(), PathPart::Dirname)?;
                for uri in uris {
                    builder.push_uri(uri.as_ref(), PathPart::Basename)?;
                }
                // the directory entry is not an item
                builder.count -= 1;
            }
        }
        Ok(builder.finish())
    }

    /// A set holding one already-decoded path.
    pub fn single(path: Vec<u8>) -> Self {
        let mut buf = path;
        buf.reserve_exact(2);
        buf.push(0);
        buf.push(0);
        Self { buf, count: 1 }
    }

    /// Number of selected paths.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always `false`: a dialog that selected nothing was cancelled.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn entries(&self) -> impl Iterator<Item = &[u8]> {
        let body = self.buf.strip_suffix(b"\0").unwrap_or(&self.buf);
        body.split(|&b| b == 0).take_while(|e| !e.is_empty())
    }

    /// Shared directory of a multi-selection; `None` for a single path.
    pub fn directory(&self) -> Option<&Path> {
        if self.count < 2 {
            return None;
        }
        self.entries()
            .next()
            .map(|e| Path::new(OsStr::from_bytes(e)))
    }

    /// File names of the selected items, in order.
    pub fn basenames(&self) -> impl Iterator<Item = &OsStr> {
        let skip = usize::from(self.count > 1);
        self.entries()
            .skip(skip)
            .map(move |e| OsStr::from_bytes(if skip == 0 { basename(e) } else { e }))
    }

    /// Path at `index`.
    pub fn get(&self, index: usize) -> PortalResult<PathBuf> {
        if index >= self.count {
            return Err(PortalError::IndexOutOfBounds {
                index,
                len: self.count,
            });
        }
        Ok(self.nth(index))
    }

    fn nth(&self, index: usize) -> PathBuf {
        let mut entries = self.entries();
        if self.count == 1 {
            let entry = entries.next().unwrap_or_default();
            return PathBuf::from(OsString::from_vec(entry.to_vec()));
        }
        let dir = entries.next().unwrap_or_default();
        let name = entries.nth(index).unwrap_or_default();
        Path::new(OsStr::from_bytes(dir)).join(OsStr::from_bytes(name))
    }

    /// First selected path.
    pub fn first(&self) -> PathBuf {
        self.nth(0)
    }

    /// Iterate the selected paths in order.
    pub fn iter(&self) -> PathSetIter<'_> {
        PathSetIter {
            set: self,
            next: 0,
        }
    }

    /// Collect every path.
    pub fn to_vec(&self) -> Vec<PathBuf> {
        self.iter().collect()
    }

    /// Packed representation: NUL-terminated entries plus a final NUL.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes reserved by the packed buffer.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

/// Forward-only iterator over a [`PathSet`].
#[derive(Clone, Debug)]
pub struct PathSetIter<'a> {
    set: &'a PathSet,
    next: usize,
}

impl Iterator for PathSetIter<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.next >= self.set.count {
            return None;
        }
        let path = self.set.nth(self.next);
        self.next += 1;
        Some(path)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.set.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PathSetIter<'_> {}

impl<'a> IntoIterator for &'a PathSet {
    type Item = PathBuf;
    type IntoIter = PathSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
