#![deny(rust_2018_idioms)]
//! Native file dialogs through the XDG desktop portal.
//!
//! Dialogs are shown by the desktop's `org.freedesktop.portal.FileChooser`
//! implementation over the session bus, which also works from inside Flatpak
//! and other sandboxes. The crate covers:
//!
//! - open (single and multiple), folder and save dialogs, blocking or pollable;
//! - name + extension filters and the legacy NUL-separated filter notation;
//! - decoding the returned `file://` URIs into native paths;
//! - revealing a path in the file manager (`org.freedesktop.FileManager1`).
//!
//! ```no_run
//! # #[cfg(feature = "zbus")]
//! # fn main() -> dear_portal_dialog::PortalResult<()> {
//! use dear_portal_dialog::{DialogMode, FileDialog, Portal};
//!
//! let portal = Portal::connect()?;
//! let dialog = FileDialog::new(DialogMode::OpenFiles).filter(("Images", &["png", "jpg"]));
//! match portal.open_blocking(&dialog) {
//!     Ok(paths) => {
//!         for path in &paths {
//!             println!("{}", path.display());
//!         }
//!     }
//!     Err(e) if e.is_cancelled() => println!("cancelled"),
//!     Err(e) => eprintln!("dialog failed: {e}"),
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "zbus"))]
//! # fn main() {}
//! ```
//!
//! The bus is reached through the [`Transport`] trait; [`ZbusTransport`] is the
//! implementation used by [`Portal::connect`].

mod core;
mod error;
mod file_manager;
pub mod filters;
mod handle;
pub mod logging;
mod message;
mod monitor;
mod path_set;
mod response;
mod session;
pub mod transport;
pub mod uri;
mod value;

pub use crate::core::{
    DialogMode, FileDialog, FileFilter, Filters, LegacyFilters, ParentWindow, PortalConfig,
};
pub use error::{PortalError, PortalResult};
pub use file_manager::{FileManagerMode, file_manager_call};
pub use handle::{CorrelationHandle, MatchRule, TOKEN_LEN, generate_token, request_object_path};
pub use message::{OptionValue, RequestBody, build_request};
pub use monitor::PendingDialog;
pub use path_set::{PathSet, PathSetIter, basename, dirname};
pub use response::{ResponseFields, read_dict, read_request_path, read_response, read_response_results};
#[cfg(feature = "zbus")]
pub use session::SessionPortal;
pub use session::Portal;
#[cfg(feature = "zbus")]
pub use transport::ZbusTransport;
pub use transport::{CallBody, IncomingMessage, MessageKind, MethodCall, Transport};
pub use value::Value;
