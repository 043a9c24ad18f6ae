//! Message-bus seam.
//!
//! The dialog engine only needs a handful of primitives from the session bus:
//! our unique connection name, match-rule management, a blocking method call,
//! and a non-blocking inbox plus a blocking "wait for more traffic" step. The
//! [`Transport`] trait captures exactly that, so the request flow can run
//! against the real bus ([`ZbusTransport`]) or a scripted one in tests.

#[cfg(feature = "zbus")]
mod session_bus;

#[cfg(feature = "zbus")]
pub use self::session_bus::ZbusTransport;

use crate::error::PortalResult;
use crate::handle::MatchRule;
use crate::message::RequestBody;
use crate::value::Value;

/// Well-known name of the desktop portal.
pub const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
/// Object path of the desktop portal.
pub const PORTAL_OBJECT_PATH: &str = "/org/freedesktop/portal/desktop";
/// File chooser interface.
pub const FILE_CHOOSER_INTERFACE: &str = "org.freedesktop.portal.FileChooser";
/// Interface of per-request objects.
pub const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";
/// Signal carrying the user's answer.
pub const RESPONSE_MEMBER: &str = "Response";

/// File manager service, object path and interface (all share one name).
pub const FILE_MANAGER_NAME: &str = "org.freedesktop.FileManager1";
pub const FILE_MANAGER_OBJECT_PATH: &str = "/org/freedesktop/FileManager1";

/// Arguments of an outgoing method call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallBody {
    /// `OpenFile` / `SaveFile` request
    Dialog(RequestBody),
    /// `ShowFolders` / `ShowItems`: `(as uris, s startup_id)`
    ShowItems { uris: Vec<String>, startup_id: String },
}

/// An outgoing method call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodCall {
    pub destination: &'static str,
    pub path: &'static str,
    pub interface: &'static str,
    pub member: &'static str,
    pub body: CallBody,
}

impl MethodCall {
    /// A FileChooser call (`OpenFile` or `SaveFile`).
    pub fn file_chooser(member: &'static str, body: RequestBody) -> Self {
        Self {
            destination: PORTAL_DESTINATION,
            path: PORTAL_OBJECT_PATH,
            interface: FILE_CHOOSER_INTERFACE,
            member,
            body: CallBody::Dialog(body),
        }
    }
}

/// Kind of an incoming message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
    Other,
}

/// An incoming message, reduced to what the request flow inspects.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingMessage {
    pub kind: MessageKind,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub args: Vec<Value>,
}

impl IncomingMessage {
    /// Build a signal message.
    pub fn signal(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            kind: MessageKind::Signal,
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            args,
        }
    }

    /// Build a `Request.Response` signal for the request object at `path`.
    pub fn response(path: impl Into<String>, status: u32, results: Value) -> Self {
        Self::signal(
            path,
            REQUEST_INTERFACE,
            RESPONSE_MEMBER,
            vec![Value::U32(status), results],
        )
    }

    /// Whether this is the `Response` signal of the request object at `path`.
    pub fn is_response_for(&self, path: &str) -> bool {
        self.kind == MessageKind::Signal
            && self.interface.as_deref() == Some(REQUEST_INTERFACE)
            && self.member.as_deref() == Some(RESPONSE_MEMBER)
            && self.path.as_deref() == Some(path)
    }
}

/// Session-bus operations used by the dialog engine.
///
/// Implementations are moved into a [`Portal`](crate::Portal) and shared with
/// the monitor thread of pollable dialogs behind a mutex, hence `Send`.
pub trait Transport: Send {
    /// Our unique connection name (e.g. `":1.42"`), if the bus assigned one.
    fn unique_name(&self) -> Option<String>;

    /// Install a match rule so the bus routes matching signals to us.
    fn add_match(&mut self, rule: &MatchRule) -> PortalResult<()>;

    /// Remove a previously installed match rule.
    fn remove_match(&mut self, rule: &MatchRule) -> PortalResult<()>;

    /// Send a method call and block until its reply arrives.
    ///
    /// Returns the reply arguments. Error replies are reported as
    /// [`PortalError::Transport`](crate::PortalError::Transport).
    fn call(&mut self, call: &MethodCall) -> PortalResult<Vec<Value>>;

    /// Pop the next queued incoming message without blocking.
    fn pop_message(&mut self) -> Option<IncomingMessage>;

    /// Block until more traffic was read into the queue.
    ///
    /// Returns `false` when the connection is gone.
    fn read_write(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn unique_name(&self) -> Option<String> {
        (**self).unique_name()
    }

    fn add_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        (**self).add_match(rule)
    }

    fn remove_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        (**self).remove_match(rule)
    }

    fn call(&mut self, call: &MethodCall) -> PortalResult<Vec<Value>> {
        (**self).call(call)
    }

    fn pop_message(&mut self) -> Option<IncomingMessage> {
        (**self).pop_message()
    }

    fn read_write(&mut self) -> bool {
        (**self).read_write()
    }
}
