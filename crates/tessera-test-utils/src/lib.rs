//! Test utilities for Tessera development.
//!
//! - [`RecordingVmem`] wraps the platform virtual memory and counts every
//!   call, so tests can check how often an arena talks to the OS.
//! - [`fixtures`] builds worlds and values used across test suites.
//! - [`init_tracing`] installs a test-writer subscriber once per process.
//! - [`expect_violation`] runs a closure and returns the precondition
//!   report it panicked with.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
mod vmem;

use std::any::Any;
use std::panic::{self, UnwindSafe};
use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use vmem::{RecordingVmem, VmemCounts};

static INIT: Once = Once::new();

/// Install a `tracing` subscriber writing through the test harness.
///
/// `RUST_LOG` overrides the default filter of `tessera=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "tessera=debug,tessera_arena=debug,tessera_value=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        String::from("<non-string panic>")
    }
}

/// Run `f`, which must fail a precondition, and return the report.
///
/// # Panics
///
/// If `f` returns normally, or panics with something other than a
/// precondition report.
pub fn expect_violation<R>(f: impl FnOnce() -> R + UnwindSafe) -> String {
    match panic::catch_unwind(f) {
        Ok(_) => panic!("expected a precondition violation"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            assert!(
                message.starts_with("precondition violated at "),
                "unexpected panic: {message}"
            );
            message
        }
    }
}
