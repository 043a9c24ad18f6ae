//! Portal connection and the dialog request flow.
//!
//! A request goes through four steps:
//!
//! 1. mint a handle token, predict the request object path and subscribe to
//!    its `Response` signal;
//! 2. send `OpenFile`/`SaveFile` and adopt the object path from the reply;
//! 3. pump incoming messages until the matching `Response` arrives;
//! 4. decode the response into a [`PathSet`].
//!
//! Steps 1 and 2 always run on the caller's thread. Steps 3 and 4 run there
//! too for [`Portal::open_blocking`], or on a monitor thread for
//! [`Portal::open_pollable`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{DialogMode, FileDialog, PortalConfig};
use crate::error::{LastError, PortalError, PortalResult};
use crate::handle::CorrelationHandle;
use crate::message::build_request;
use crate::monitor::PendingDialog;
use crate::path_set::PathSet;
use crate::response::{read_request_path, read_response};
use crate::transport::{IncomingMessage, MethodCall, Transport};
use crate::uri::{append_extension, decode_file_uri};

#[cfg(feature = "zbus")]
use crate::transport::ZbusTransport;

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace};

/// State shared between a [`Portal`] and its in-flight dialogs.
pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: Mutex<T>,
    pub(crate) unique_name: String,
    pub(crate) last_error: LastError,
    pub(crate) config: PortalConfig,
}

/// Connection to the desktop portal.
///
/// One portal can run any number of dialogs one after another. A pollable
/// dialog keeps the connection alive until its monitor thread finishes, even
/// if the portal itself is dropped first.
pub struct Portal<T: Transport> {
    pub(crate) shared: Arc<Shared<T>>,
}

/// Portal on the session bus.
#[cfg(feature = "zbus")]
pub type SessionPortal = Portal<ZbusTransport>;

#[cfg(feature = "zbus")]
impl Portal<ZbusTransport> {
    /// Connect to the session bus with the default configuration.
    pub fn connect() -> PortalResult<Self> {
        Self::connect_with_config(PortalConfig::default())
    }

    /// Connect to the session bus.
    pub fn connect_with_config(config: PortalConfig) -> PortalResult<Self> {
        Self::with_transport_and_config(ZbusTransport::session()?, config)
    }
}

impl<T: Transport> Portal<T> {
    /// Wrap an existing transport with the default configuration.
    pub fn with_transport(transport: T) -> PortalResult<Self> {
        Self::with_transport_and_config(transport, PortalConfig::default())
    }

    /// Wrap an existing transport.
    pub fn with_transport_and_config(transport: T, config: PortalConfig) -> PortalResult<Self> {
        let unique_name = transport.unique_name().ok_or_else(|| {
            PortalError::transport("Unable to get the unique name of our D-Bus connection.")
        })?;
        #[cfg(feature = "tracing")]
        info!("Desktop portal session ready as {}", unique_name);
        Ok(Self {
            shared: Arc::new(Shared {
                transport: Mutex::new(transport),
                unique_name,
                last_error: LastError::default(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.shared.config
    }

    /// Our unique name on the bus.
    pub fn unique_name(&self) -> &str {
        &self.shared.unique_name
    }

    /// Message of the most recent failure, if any.
    ///
    /// Cancellation is not a failure and never shows up here.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.get()
    }

    pub fn clear_error(&self) {
        self.shared.last_error.clear();
    }

    pub(crate) fn record<R>(&self, result: PortalResult<R>) -> PortalResult<R> {
        if let Err(err) = &result {
            self.shared.last_error.record(err);
        }
        result
    }

    /// Show a dialog and block until the user answers.
    ///
    /// Returns [`PortalError::Cancelled`] when the user dismissed the dialog.
    pub fn open_blocking(&self, dialog: &FileDialog) -> PortalResult<PathSet> {
        let result = self
            .send_request(dialog)
            .and_then(|mut live| live.wait_for_selection());
        self.record(result)
    }

    /// Send the request for `dialog` and subscribe to its response.
    pub(crate) fn send_request(&self, dialog: &FileDialog) -> PortalResult<LiveRequest<T>> {
        let mut handle = CorrelationHandle::mint(&self.shared.unique_name);
        let call = MethodCall::file_chooser(
            dialog.mode.method(),
            build_request(dialog, handle.token()),
        );
        #[cfg(feature = "tracing")]
        debug!(
            "Requesting {} ({:?}) on {}",
            call.member,
            dialog.mode,
            handle.object_path()
        );

        let mut transport = self.shared.transport.lock();
        if let Err(err) = issue_request(&mut *transport, &mut handle, &call) {
            handle.unsubscribe(&mut *transport);
            return Err(err);
        }
        drop(transport);

        Ok(LiveRequest {
            shared: Arc::clone(&self.shared),
            handle,
            mode: dialog.mode,
        })
    }
}

impl<T: Transport + 'static> Portal<T> {
    /// Show a dialog without blocking.
    ///
    /// The request is sent before this returns; a monitor thread then waits
    /// for the answer. Poll the returned [`PendingDialog`].
    pub fn open_pollable(&self, dialog: &FileDialog) -> PortalResult<PendingDialog> {
        let result = self.send_request(dialog).and_then(|live| {
            PendingDialog::spawn(live, self.shared.config.worker_thread_name.clone())
        });
        self.record(result)
    }
}

impl<T: Transport> Drop for Portal<T> {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        debug!(
            "Closing portal session {} ({} live references)",
            self.shared.unique_name,
            Arc::strong_count(&self.shared)
        );
    }
}

fn issue_request<T: Transport + ?Sized>(
    transport: &mut T,
    handle: &mut CorrelationHandle,
    call: &MethodCall,
) -> PortalResult<()> {
    handle.subscribe(transport)?;
    // blocks until the portal hands back the request object path
    let reply = transport.call(call)?;
    let path = read_request_path(&reply)?;
    handle.reconcile(transport, path)?;
    #[cfg(feature = "tracing")]
    trace!("Awaiting response on {}", handle.object_path());
    Ok(())
}

/// A request that was sent and whose response has not been consumed yet.
///
/// Dropping it removes the response subscription.
pub(crate) struct LiveRequest<T: Transport> {
    shared: Arc<Shared<T>>,
    handle: CorrelationHandle,
    mode: DialogMode,
}

impl<T: Transport> LiveRequest<T> {
    pub(crate) fn last_error(&self) -> &LastError {
        &self.shared.last_error
    }

    /// Wait for the response and decode it.
    pub(crate) fn wait_for_selection(&mut self) -> PortalResult<PathSet> {
        let reply = {
            let mut transport = self.shared.transport.lock();
            await_response(&mut *transport, self.handle.object_path())
        };
        let result =
            reply.and_then(|msg| decode_selection(&msg, self.mode, &self.shared.config));
        #[cfg(feature = "tracing")]
        match &result {
            Ok(paths) => debug!(
                "Request {} completed with {} path(s)",
                self.handle.token(),
                paths.len()
            ),
            Err(PortalError::Cancelled) => debug!("Request {} cancelled", self.handle.token()),
            Err(err) => debug!("Request {} failed: {}", self.handle.token(), err),
        }
        result
    }
}

impl<T: Transport> Drop for LiveRequest<T> {
    fn drop(&mut self) {
        let mut transport = self.shared.transport.lock();
        self.handle.unsubscribe(&mut *transport);
    }
}

/// Pump the transport until the `Response` signal for `path` arrives.
///
/// Every other message is discarded.
pub(crate) fn await_response<T: Transport + ?Sized>(
    transport: &mut T,
    path: &str,
) -> PortalResult<IncomingMessage> {
    loop {
        while let Some(msg) = transport.pop_message() {
            if msg.is_response_for(path) {
                return Ok(msg);
            }
            #[cfg(feature = "tracing")]
            trace!(
                "Discarding {:?} {:?}.{:?} on {:?}",
                msg.kind, msg.interface, msg.member, msg.path
            );
        }
        if !transport.read_write() {
            return Err(PortalError::transport(
                "D-Bus freedesktop portal did not give us a reply.",
            ));
        }
    }
}

/// Turn a `Response` signal into the selected paths.
pub(crate) fn decode_selection(
    msg: &IncomingMessage,
    mode: DialogMode,
    config: &PortalConfig,
) -> PortalResult<PathSet> {
    let append = mode == DialogMode::SaveFile && config.append_extension;
    let fields = read_response(&msg.args, append)?;
    if mode == DialogMode::OpenFiles {
        return PathSet::from_uris(&fields.uris, config.path_list_capacity);
    }
    let uri = fields
        .uris
        .first()
        .ok_or_else(|| PortalError::protocol("D-Bus response signal has no URI field."))?;
    let mut path = decode_file_uri(uri)?;
    if append && append_extension(&mut path, fields.current_filter.as_deref()) {
        #[cfg(feature = "tracing")]
        debug!(
            "Appended extension from filter {:?}",
            fields.current_filter
        );
    }
    Ok(PathSet::single(path))
}
