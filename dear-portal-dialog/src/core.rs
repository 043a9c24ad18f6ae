use std::path::PathBuf;

/// Dialog mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogMode {
    /// Pick a single file
    OpenFile,
    /// Pick multiple files
    OpenFiles,
    /// Pick a directory
    PickFolder,
    /// Save file
    SaveFile,
}

impl DialogMode {
    /// Title used when the caller does not supply one.
    pub fn default_title(self) -> &'static str {
        match self {
            DialogMode::OpenFile => "Open File",
            DialogMode::OpenFiles => "Open Files",
            DialogMode::PickFolder => "Select Folder",
            DialogMode::SaveFile => "Save File",
        }
    }

    /// Portal method carrying this mode.
    pub(crate) fn method(self) -> &'static str {
        match self {
            DialogMode::SaveFile => "SaveFile",
            _ => "OpenFile",
        }
    }
}

/// File filter (e.g., "Images" -> ["png", "jpg"]).
///
/// Extensions are provided without a leading dot and are sent to the portal as
/// `*.ext` globs, verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Filter display name
    pub name: String,
    /// Extensions without dot (e.g., "png")
    pub extensions: Vec<String>,
}

impl FileFilter {
    /// Create a filter from a name and extensions.
    pub fn new(name: impl Into<String>, exts: impl Into<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            extensions: exts.into(),
        }
    }

    /// Create a filter from a comma-separated extension list such as `"c,cpp,cc"`.
    pub fn from_spec(name: impl Into<String>, spec: &str) -> Self {
        Self {
            name: name.into(),
            extensions: spec.split(',').map(str::to_owned).collect(),
        }
    }
}

impl From<(&str, &[&str])> for FileFilter {
    fn from(value: (&str, &[&str])) -> Self {
        Self {
            name: value.0.to_owned(),
            extensions: value.1.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl<const N: usize> From<(&str, &[&str; N])> for FileFilter {
    fn from(value: (&str, &[&str; N])) -> Self {
        Self::from((value.0, &value.1[..]))
    }
}

impl From<(&str, &str)> for FileFilter {
    fn from(value: (&str, &str)) -> Self {
        Self::from_spec(value.0, value.1)
    }
}

/// Filters in the legacy multi-string notation.
///
/// The block holds consecutive NUL-terminated strings alternating a display
/// name and a `;`-separated pattern list, ending with an empty name, e.g.
/// `"Text\0*.txt\0C sources\0*.c;*.h\0\0"`. `index` is 1-based and selects the
/// initially active filter; 0 selects the first one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacyFilters {
    /// Raw filter block
    pub block: String,
    /// 1-based index of the initially selected filter
    pub index: usize,
}

impl LegacyFilters {
    /// Create a legacy filter block.
    pub fn new(block: impl Into<String>, index: usize) -> Self {
        Self {
            block: block.into(),
            index,
        }
    }
}

/// Filter configuration of a dialog
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Filters {
    /// No filters; the portal shows everything
    #[default]
    None,
    /// Name + extension list filters
    Extensions(Vec<FileFilter>),
    /// Legacy multi-string block
    Legacy(LegacyFilters),
}

/// Parent window the dialog should be transient for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentWindow {
    /// X11 window id
    X11(u64),
}

impl ParentWindow {
    /// Portal identifier string for this window (`"x11:<hex>"`).
    pub fn to_portal_string(self) -> String {
        match self {
            ParentWindow::X11(xid) => format!("x11:{xid:08x}"),
        }
    }

    /// Derive a parent hint from a raw window handle.
    ///
    /// Only X11 handles can be expressed without exporting the window first, so
    /// every other handle yields `None`.
    #[cfg(feature = "raw-window-handle")]
    pub fn from_raw(handle: raw_window_handle::RawWindowHandle) -> Option<Self> {
        use raw_window_handle::RawWindowHandle;
        match handle {
            RawWindowHandle::Xlib(h) => Some(ParentWindow::X11(h.window as u64)),
            RawWindowHandle::Xcb(h) => Some(ParentWindow::X11(u64::from(h.window.get()))),
            _ => None,
        }
    }
}

/// Runtime configuration of a [`Portal`](crate::Portal).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalConfig {
    /// Append the selected filter's extension to saved paths that lack one.
    ///
    /// Off by default: the portal's overwrite prompt and the sandbox never see
    /// the appended name.
    pub append_extension: bool,
    /// Initial capacity in bytes of the packed multi-path buffer.
    pub path_list_capacity: usize,
    /// Name of the thread that waits for pollable dialogs.
    pub worker_thread_name: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            append_extension: false,
            path_list_capacity: 256,
            worker_thread_name: "portal-dialog-monitor".to_owned(),
        }
    }
}

/// Builder describing one dialog request
#[derive(Clone, Debug)]
pub struct FileDialog {
    pub(crate) mode: DialogMode,
    pub(crate) title: Option<String>,
    pub(crate) parent: Option<ParentWindow>,
    pub(crate) filters: Filters,
    pub(crate) default_name: Option<String>,
    pub(crate) start_dir: Option<PathBuf>,
}

impl FileDialog {
    /// Create a new builder with the given mode
    pub fn new(mode: DialogMode) -> Self {
        Self {
            mode,
            title: None,
            parent: None,
            filters: Filters::None,
            default_name: None,
            start_dir: None,
        }
    }

    /// Dialog mode
    pub fn mode(&self) -> DialogMode {
        self.mode
    }

    /// Set the dialog title (defaults to a mode-specific title)
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the parent window
    pub fn parent_window(mut self, parent: ParentWindow) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the parent window from a raw window handle (ignored when unsupported)
    #[cfg(feature = "raw-window-handle")]
    pub fn parent_raw(mut self, handle: raw_window_handle::RawWindowHandle) -> Self {
        self.parent = ParentWindow::from_raw(handle);
        self
    }

    /// Set initial directory (used by save dialogs)
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_dir = Some(dir.into());
        self
    }

    /// Set default file name (for SaveFile)
    pub fn default_file_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Add a filter.
    ///
    /// Replaces a legacy filter block, if one was set.
    ///
    /// Examples
    /// ```
    /// use dear_portal_dialog::{DialogMode, FileDialog};
    /// let d = FileDialog::new(DialogMode::OpenFile)
    ///     .filter(("Images", &["png", "jpg"]))
    ///     .filter(("C/C++", "c,cpp,cc"));
    /// ```
    pub fn filter<F: Into<FileFilter>>(mut self, filter: F) -> Self {
        match &mut self.filters {
            Filters::Extensions(list) => list.push(filter.into()),
            other => *other = Filters::Extensions(vec![filter.into()]),
        }
        self
    }

    /// Add multiple filters.
    pub fn filters<I, F>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FileFilter>,
    {
        for f in filters {
            self = self.filter(f);
        }
        self
    }

    /// Use a legacy multi-string filter block instead of extension filters.
    ///
    /// ```
    /// use dear_portal_dialog::{DialogMode, FileDialog};
    /// let d = FileDialog::new(DialogMode::OpenFile)
    ///     .legacy_filters("All\0*.*\0Text\0*.TXT\0\0", 2);
    /// ```
    pub fn legacy_filters(mut self, block: impl Into<String>, index: usize) -> Self {
        self.filters = Filters::Legacy(LegacyFilters::new(block, index));
        self
    }
}
