//! Telemetry for the harness.
//!
//! Structured logging through `tracing`, with all output funneled through one
//! [`LogCapture`] console channel.

mod capture;
mod logging;
mod spans;

pub use capture::{CaptureWriter, LogCapture, SharedBuffer};
pub use logging::{init_logging, LogConfig, LogError, LogFormat, LogMode};
pub use spans::{SpanExt, TestSpan};
