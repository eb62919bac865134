//! Process-wide tracing setup for storefront binaries.
//!
//! Library crates only emit `tracing` events; a binary calls [`init`] once
//! at startup to decide where they go.

pub mod subscriber;

pub use subscriber::{LogFormat, LogSettings};

/// Install the default subscriber (JSON, `info`, `RUST_LOG` wins).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::install(&LogSettings::from_env());
}

/// Install a subscriber with explicit settings. Same idempotence as [`init`].
pub fn init_with(settings: &LogSettings) {
    subscriber::install(settings);
}
