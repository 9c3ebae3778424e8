//! End-to-end test suite for OpenPad.
//!
//! Everything here runs against the in-memory fake USB stack; no real
//! hardware is required. The fixtures module scripts a virtual Switch 2
//! controller (bulk handshake acks, flash calibration blocks, player LED
//! acks) so the full open/initialize/update path can be exercised from
//! the public APIs.

#![deny(rust_2018_idioms)]
#![deny(warnings)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::print_stdout)]

pub mod fixtures;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per process. Safe to call from every
/// test; later calls are no-ops.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
