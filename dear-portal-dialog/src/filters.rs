//! Filter encoding for the portal's `filters` / `current_filter` options.
//!
//! The portal takes a list of `(display name, [(type, pattern)])` entries where
//! type `0` is a shell glob. Two caller notations are accepted:
//!
//! - [`FileFilter`] lists (name + extensions), which become `*.ext` globs and a
//!   decorated display name such as `"C/C++ (c, cpp, cc)"`;
//! - [`LegacyFilters`] blocks of NUL-separated name/pattern pairs, whose
//!   `;`-separated patterns are rewritten into case-insensitive globs because
//!   portal globs are case-sensitive.
//!
//! In both notations an "All files" entry is appended after the caller's
//! filters. Callers that pass no filters at all get no filter option.

use crate::core::{FileFilter, LegacyFilters};

/// Display name of the synthetic catch-all filter.
pub const ALL_FILES: &str = "All files";
/// Pattern of the synthetic catch-all filter.
pub const ASTERISK: &str = "*";
/// Filter pattern type for shell globs.
pub const GLOB_PATTERN: u32 = 0;

/// One entry of the portal's filter list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFilter {
    /// Name shown in the dialog's filter selector
    pub name: String,
    /// `(type, pattern)` pairs; type 0 is a glob
    pub patterns: Vec<(u32, String)>,
}

impl WireFilter {
    /// Create a filter made of glob patterns.
    pub fn globs<I, S>(name: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            patterns: patterns
                .into_iter()
                .map(|p| (GLOB_PATTERN, p.into()))
                .collect(),
        }
    }

    /// Create a catch-all (`*`) filter.
    pub fn wildcard(name: impl Into<String>) -> Self {
        Self::globs(name, [ASTERISK])
    }

    /// First glob pattern, if any.
    pub fn first_glob(&self) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(kind, _)| *kind == GLOB_PATTERN)
            .map(|(_, p)| p.as_str())
    }
}

/// Encoded filter list plus the initially selected entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFilters {
    /// Entries in display order, the synthetic "All files" entry last
    pub filters: Vec<WireFilter>,
    /// Index into `filters` of the initially selected entry
    pub current: usize,
}

impl EncodedFilters {
    /// The initially selected entry.
    pub fn current_filter(&self) -> &WireFilter {
        &self.filters[self.current]
    }

    /// Index of the synthetic catch-all entry.
    pub fn wildcard_index(&self) -> usize {
        self.filters.len() - 1
    }
}

/// How the initially selected filter is chosen for extension lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterSelection<'a> {
    /// Select the first caller filter (open dialogs)
    First,
    /// Select the first filter containing the extension of this file name, or
    /// the catch-all entry when nothing matches (save dialogs)
    ByFileName(Option<&'a str>),
}

/// Extension of a file name, without the dot.
///
/// Returns `None` for names without a dot or with a trailing dot.
pub fn file_extension(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Index of the first filter whose extensions contain `extension`
/// (case-insensitively), or `filters.len()` (the catch-all slot) otherwise.
pub fn default_filter_index(filters: &[FileFilter], extension: &str) -> usize {
    filters
        .iter()
        .position(|f| {
            f.extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(filters.len())
}

fn extension_filter(filter: &FileFilter) -> WireFilter {
    let name = format!("{} ({})", filter.name, filter.extensions.join(", "));
    WireFilter::globs(name, filter.extensions.iter().map(|e| format!("*.{e}")))
}

/// Encode name + extension filters.
///
/// Returns `None` when `filters` is empty.
pub fn encode_extension_filters(
    filters: &[FileFilter],
    selection: FilterSelection<'_>,
) -> Option<EncodedFilters> {
    if filters.is_empty() {
        return None;
    }
    let mut out: Vec<WireFilter> = filters.iter().map(extension_filter).collect();
    out.push(WireFilter::wildcard(ALL_FILES));
    let current = match selection {
        FilterSelection::First => 0,
        FilterSelection::ByFileName(name) => name
            .and_then(file_extension)
            .map(|ext| default_filter_index(filters, ext))
            .unwrap_or(filters.len()),
    };
    Some(EncodedFilters {
        filters: out,
        current,
    })
}

/// Rewrite a glob so that every ASCII letter matches both cases
/// (`*.TXT` becomes `*.[tT][xX][tT]`).
pub fn case_insensitive_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        if ch.is_ascii_alphabetic() {
            out.push('[');
            out.push(ch.to_ascii_lowercase());
            out.push(ch.to_ascii_uppercase());
            out.push(']');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Encode a legacy NUL-separated filter block.
///
/// A name that is not followed by a pattern string is treated as a catch-all
/// entry and ends the block. Returns `None` when the block holds no filter.
pub fn encode_legacy_filters(legacy: &LegacyFilters) -> Option<EncodedFilters> {
    let mut parts = legacy.block.split('\0');
    let mut out = Vec::new();
    while let Some(name) = parts.next() {
        if name.is_empty() {
            break;
        }
        match parts.next() {
            Some(pattern) if !pattern.is_empty() => {
                out.push(WireFilter::globs(
                    name,
                    pattern.split(';').map(case_insensitive_glob),
                ));
            }
            _ => {
                out.push(WireFilter::wildcard(name));
                break;
            }
        }
    }
    if out.is_empty() {
        return None;
    }
    let current = match legacy.index {
        i if (1..=out.len()).contains(&i) => i - 1,
        _ => 0,
    };
    out.push(WireFilter::wildcard(ALL_FILES));
    Some(EncodedFilters {
        filters: out,
        current,
    })
}
