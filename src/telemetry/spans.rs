//! Span helpers for per-test tracing.

use std::fmt::Display;
use std::time::Duration;

use tracing::{field::Empty, info_span, Span};

use crate::suite::TestId;

/// Outcome recording on a test span.
pub trait SpanExt {
    fn record_outcome<E: Display>(&self, outcome: &Result<(), E>, elapsed: Duration);
}

impl SpanExt for Span {
    fn record_outcome<E: Display>(&self, outcome: &Result<(), E>, elapsed: Duration) {
        self.record(
            "elapsed_us",
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        );
        match outcome {
            Ok(()) => {
                self.record("state", "succeeded");
            }
            Err(e) => {
                self.record("state", "failed");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the span wrapped around each test body.
pub struct TestSpan;

impl TestSpan {
    /// `state`, `elapsed_us` and `error.message` are filled in by
    /// [`SpanExt::record_outcome`].
    pub fn new(id: TestId, name: &str) -> Span {
        info_span!(
            "test",
            id,
            name = %name,
            state = Empty,
            elapsed_us = Empty,
            error.message = Empty,
        )
    }
}
