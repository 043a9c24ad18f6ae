//! Revealing paths in the desktop file manager.
//!
//! Uses the `org.freedesktop.FileManager1` service: `ShowFolders` opens a
//! folder, `ShowItems` opens the containing folder with the item selected.

use std::path::{Path, PathBuf};

use crate::error::{PortalError, PortalResult};
use crate::session::Portal;
use crate::transport::{
    CallBody, FILE_MANAGER_NAME, FILE_MANAGER_OBJECT_PATH, MethodCall, Transport,
};
use crate::uri::encode_file_uri;

#[cfg(feature = "tracing")]
use tracing::debug;

/// What the file manager should do with the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileManagerMode {
    /// Open the path as a folder
    OpenFolder,
    /// Open the parent folder with the path selected
    SelectFile,
}

impl FileManagerMode {
    fn member(self) -> &'static str {
        match self {
            FileManagerMode::OpenFolder => "ShowFolders",
            FileManagerMode::SelectFile => "ShowItems",
        }
    }
}

/// Build the file manager call for one path.
pub fn file_manager_call(path: &Path, mode: FileManagerMode) -> MethodCall {
    MethodCall {
        destination: FILE_MANAGER_NAME,
        path: FILE_MANAGER_OBJECT_PATH,
        interface: FILE_MANAGER_NAME,
        member: mode.member(),
        body: CallBody::ShowItems {
            uris: vec![encode_file_uri(path)],
            startup_id: String::new(),
        },
    }
}

impl<T: Transport> Portal<T> {
    /// Show `path` in the file manager.
    ///
    /// With `canonicalize`, the path is made absolute with symlinks resolved
    /// first, which requires it to exist.
    pub fn show_in_file_manager(
        &self,
        path: impl AsRef<Path>,
        mode: FileManagerMode,
        canonicalize: bool,
    ) -> PortalResult<()> {
        let result = resolve(path.as_ref(), canonicalize).and_then(|path| {
            let call = file_manager_call(&path, mode);
            #[cfg(feature = "tracing")]
            debug!("{} {}", call.member, path.display());
            self.shared.transport.lock().call(&call).map(drop)
        });
        self.record(result)
    }
}

fn resolve(path: &Path, canonicalize: bool) -> PortalResult<PathBuf> {
    if !canonicalize {
        return Ok(path.to_path_buf());
    }
    std::fs::canonicalize(path)
        .map_err(|e| PortalError::io(format!("failed to resolve {}", path.display()), e))
}
