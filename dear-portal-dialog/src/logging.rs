//! Logging setup for applications using portal dialogs
//!
//! The crate itself only emits `tracing` events (behind the `tracing`
//! feature). These helpers install a `tracing-subscriber` formatter for
//! applications that do not set up their own. They return `false` when a
//! global subscriber is already installed instead of panicking.

/// Default filter: info+ for this crate, warn+ for everything else
#[cfg(feature = "tracing")]
pub const DEFAULT_FILTER: &str = "dear_portal_dialog=info,warn";

/// Development filter: debug+ for this crate and the bus library
#[cfg(feature = "tracing")]
pub const DEV_FILTER: &str = "dear_portal_dialog=debug,zbus=info,warn";

/// Initialize a tracing subscriber, honoring `RUST_LOG` when set
#[cfg(feature = "tracing")]
pub fn init_tracing() -> bool {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}

/// Initialize a tracing subscriber with a custom filter
#[cfg(feature = "tracing")]
pub fn init_tracing_with_filter(filter: &str) -> bool {
    use tracing_subscriber::{EnvFilter, fmt};

    fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}

/// Verbose setup for debugging bus traffic; thread names show which events
/// come from dialog monitor threads
#[cfg(feature = "tracing")]
pub fn init_tracing_dev() -> bool {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEV_FILTER.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .is_ok()
}

// Fallback implementations when tracing is not available
#[cfg(not(feature = "tracing"))]
pub fn init_tracing() -> bool {
    false
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing_with_filter(_filter: &str) -> bool {
    false
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing_dev() -> bool {
    false
}
