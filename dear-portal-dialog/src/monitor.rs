//! Pollable dialogs.
//!
//! [`Portal::open_pollable`](crate::Portal::open_pollable) sends the request on
//! the caller's thread and hands the wait to a monitor thread. The monitor
//! publishes the outcome into a shared cell; the caller polls the cell with
//! [`PendingDialog::is_ready`] and takes the result exactly once with
//! [`PendingDialog::try_take`].

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{LastError, PortalError, PortalResult};
use crate::path_set::PathSet;
use crate::session::LiveRequest;
use crate::transport::Transport;

#[cfg(feature = "tracing")]
use tracing::debug;

#[derive(Debug, Default)]
struct ResultCell {
    completed: bool,
    outcome: Option<PortalResult<PathSet>>,
}

/// A dialog whose answer is awaited on a background thread.
///
/// Dropping it before completion leaves the dialog open; the monitor thread
/// finishes on its own once the portal answers or the connection closes.
#[derive(Debug)]
pub struct PendingDialog {
    cell: Arc<Mutex<ResultCell>>,
    last_error: LastError,
    worker: thread::JoinHandle<()>,
}

impl PendingDialog {
    pub(crate) fn spawn<T: Transport + 'static>(
        mut live: LiveRequest<T>,
        thread_name: String,
    ) -> PortalResult<Self> {
        let cell = Arc::new(Mutex::new(ResultCell::default()));
        let last_error = live.last_error().clone();
        let worker_cell = Arc::clone(&cell);
        let worker_errors = last_error.clone();
        #[cfg(feature = "tracing")]
        debug!("Starting dialog monitor {:?}", thread_name);
        let worker = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let outcome = live.wait_for_selection();
                // the subscription goes away before the result is visible
                drop(live);
                if let Err(err) = &outcome {
                    worker_errors.record(err);
                }
                #[cfg(feature = "tracing")]
                debug!("Pollable dialog finished: {}", describe(&outcome));
                let mut cell = worker_cell.lock();
                cell.completed = true;
                cell.outcome = Some(outcome);
            })
            .map_err(PortalError::WorkerSpawn)?;
        Ok(Self {
            cell,
            last_error,
            worker,
        })
    }

    /// Whether the answer has arrived. Never blocks on the dialog.
    pub fn is_ready(&self) -> bool {
        self.cell.lock().completed
    }

    /// Take the answer.
    ///
    /// Returns [`PortalError::NotReady`] while the dialog is still open,
    /// [`PortalError::Cancelled`] if the user dismissed it, and
    /// [`PortalError::AlreadyTaken`] once the result has been taken.
    pub fn try_take(&self) -> PortalResult<PathSet> {
        let result = {
            let mut cell = self.cell.lock();
            if cell.completed {
                cell.outcome.take().unwrap_or(Err(PortalError::AlreadyTaken))
            } else {
                Err(PortalError::NotReady)
            }
        };
        // the dialog's own failure was recorded by the monitor thread
        if let Err(err @ (PortalError::NotReady | PortalError::AlreadyTaken)) = &result {
            self.last_error.record(err);
        }
        result
    }

    /// Whether the monitor thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

#[cfg(feature = "tracing")]
fn describe(outcome: &PortalResult<PathSet>) -> String {
    match outcome {
        Ok(paths) => format!("{} path(s)", paths.len()),
        Err(err) => err.to_string(),
    }
}
