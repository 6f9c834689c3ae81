//! Scheduling runtime: runs reconciliation cycles on a fixed interval, or a
//! one-shot teardown, on a tokio runtime.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_until, start_blocking, RunOptions, RunSummary};
