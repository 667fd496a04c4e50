//! Logging setup for forage search runs.
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by an `EnvFilter`,
//! with human-readable or JSON output.

pub mod tracer;

pub use tracer::{LogFormat, TracingConfig, TracingError, build_filter, init_tracing};
