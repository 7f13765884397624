#![forbid(unsafe_code)]

//! One-shot request/response driver for line-oriented stdio servers.
//!
//! Spawns a server process, optionally waits for a readiness marker in its
//! output, writes exactly one newline-terminated request, collects a
//! response under a bounded wait policy, and guarantees the child is
//! terminated and reaped on every exit path.

pub mod config;
pub mod driver;
pub mod errors;
pub mod exchange;
pub mod readiness;
pub mod report;
pub mod request;
pub mod response;
pub mod server;

pub use config::ProbeConfig;
pub use errors::{AppError, Result};
pub use report::ProbeReport;
