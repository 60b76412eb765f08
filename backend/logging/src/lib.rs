//! Structured logging setup for falabot.
//!
//! Console output for operators, optional daily-rolling NDJSON files, and
//! `RUST_LOG`-based level control.

pub mod logger;

pub use logger::{build_filter, init_logger};
