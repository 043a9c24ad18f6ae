//! Outgoing FileChooser request bodies.
//!
//! A request is `(parent_window: s, title: s, options: a{sv})`. The options are
//! kept as an ordered list so the body reads in the order it is written and so
//! tests can inspect individual entries.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::core::{DialogMode, FileDialog, Filters};
use crate::filters::{
    EncodedFilters, FilterSelection, WireFilter, encode_extension_filters, encode_legacy_filters,
};

/// Value of a single request option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
    /// Byte array; paths carry their terminating NUL
    Bytes(Vec<u8>),
    /// `a(sa(us))`
    Filters(Vec<WireFilter>),
    /// `(sa(us))`
    Filter(WireFilter),
}

impl OptionValue {
    /// D-Bus signature of the boxed value.
    pub fn signature(&self) -> &'static str {
        match self {
            OptionValue::Str(_) => "s",
            OptionValue::Bool(_) => "b",
            OptionValue::Bytes(_) => "ay",
            OptionValue::Filters(_) => "a(sa(us))",
            OptionValue::Filter(_) => "(sa(us))",
        }
    }
}

/// Body of an `OpenFile` / `SaveFile` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestBody {
    pub parent_window: String,
    pub title: String,
    pub options: Vec<(String, OptionValue)>,
}

impl RequestBody {
    /// Look up an option by key.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn push(&mut self, key: &str, value: OptionValue) {
        self.options.push((key.to_owned(), value));
    }

    fn push_filters(&mut self, encoded: Option<EncodedFilters>) {
        if let Some(encoded) = encoded {
            let current = encoded.current_filter().clone();
            self.push("filters", OptionValue::Filters(encoded.filters));
            self.push("current_filter", OptionValue::Filter(current));
        }
    }
}

/// Path bytes followed by a NUL, as the portal expects for `ay` paths.
pub(crate) fn nul_terminated(path: &Path) -> Vec<u8> {
    let bytes = path.as_os_str().as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

/// Build the request body for `dialog`, tagged with `handle_token`.
pub fn build_request(dialog: &FileDialog, handle_token: &str) -> RequestBody {
    let mode = dialog.mode;
    let mut body = RequestBody {
        parent_window: dialog
            .parent
            .map(|p| p.to_portal_string())
            .unwrap_or_default(),
        title: dialog
            .title
            .clone()
            .unwrap_or_else(|| mode.default_title().to_owned()),
        options: Vec::new(),
    };
    body.push("handle_token", OptionValue::Str(handle_token.to_owned()));

    match mode {
        DialogMode::OpenFile => {}
        DialogMode::OpenFiles => body.push("multiple", OptionValue::Bool(true)),
        DialogMode::PickFolder => body.push("directory", OptionValue::Bool(true)),
        DialogMode::SaveFile => {}
    }

    if mode != DialogMode::PickFolder {
        let selection = match mode {
            DialogMode::SaveFile => FilterSelection::ByFileName(dialog.default_name.as_deref()),
            _ => FilterSelection::First,
        };
        let encoded = match &dialog.filters {
            Filters::None => None,
            Filters::Extensions(list) => encode_extension_filters(list, selection),
            Filters::Legacy(legacy) => encode_legacy_filters(legacy),
        };
        body.push_filters(encoded);
    }

    if mode == DialogMode::SaveFile {
        push_save_hints(&mut body, dialog);
    }
    body
}

fn push_save_hints(body: &mut RequestBody, dialog: &FileDialog) {
    if let Some(name) = &dialog.default_name {
        body.push("current_name", OptionValue::Str(name.clone()));
    }
    let Some(dir) = &dialog.start_dir else {
        return;
    };
    body.push("current_folder", OptionValue::Bytes(nul_terminated(dir)));
    if let Some(name) = &dialog.default_name {
        let file = dir.join(name);
        if file.exists() {
            body.push("current_file", OptionValue::Bytes(nul_terminated(&file)));
        }
    }
}
