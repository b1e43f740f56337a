//! Run-or-skip wrapper around each test body.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use super::{SuiteCtx, SuiteSummary, TestId, TestState};
use crate::telemetry::{LogCapture, LogMode, SpanExt, TestSpan};

/// Drives tests through a [`SuiteCtx`], announcing each on the console.
pub struct SuiteRunner {
    suite: SuiteCtx,
    console: LogCapture,
    mode: LogMode,
}

impl SuiteRunner {
    pub fn new(suite: SuiteCtx, console: LogCapture, mode: LogMode) -> Self {
        Self {
            suite,
            console,
            mode,
        }
    }

    pub fn suite(&self) -> &SuiteCtx {
        &self.suite
    }

    pub fn console(&self) -> &LogCapture {
        &self.console
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// Register `name`, run `body` if the filter selects it, and record the
    /// outcome.
    ///
    /// A body that returns `Err` or panics is recorded as failed. In buffered
    /// mode its captured output is printed before the failure line; a passing
    /// test's output is dropped.
    pub fn run_test<F, E>(&mut self, name: &str, body: F) -> TestState
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let id = self.suite.add_test(name);

        let state = if self.suite.should_run(id) {
            self.execute(id, name, body)
        } else {
            if self.suite.should_print(id) {
                self.console.println(&format!("{id}: {name}"));
            }
            TestState::Skipped
        };

        if let Err(e) = self.suite.set_test_state(id, state) {
            tracing::error!(error = %e, "failed to record test state");
        }
        state
    }

    fn execute<F, E>(&mut self, id: TestId, name: &str, body: F) -> TestState
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let buffered = self.mode.is_buffered();
        if buffered {
            self.console.init();
        }
        self.console.println("");
        self.console.println(&format!("{id}: {name} STARTING"));

        let span = TestSpan::new(id, name);
        let started = Instant::now();
        let outcome = span.in_scope(|| match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "test failed");
                Err(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "test panicked");
                Err(format!("panicked: {message}"))
            }
        });
        span.record_outcome(&outcome, started.elapsed());

        let output = if buffered {
            self.console.shutdown()
        } else {
            String::new()
        };

        match outcome {
            Ok(()) => {
                self.console.println(&format!("{id}: {name} SUCCEEDED"));
                TestState::Succeeded
            }
            Err(_) => {
                self.console.print(&output);
                self.console.println(&format!("{id}: {name} FAILED"));
                self.console.println("");
                TestState::Failed
            }
        }
    }

    pub fn summary(&self) -> SuiteSummary {
        SuiteSummary::from_suite(&self.suite)
    }

    /// Consume the runner, returning the registry.
    pub fn into_suite(self) -> SuiteCtx {
        self.suite
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::RunFilter;
    use crate::telemetry::SharedBuffer;

    fn make_runner(filter: RunFilter, mode: LogMode) -> (SuiteRunner, SharedBuffer) {
        let sink = SharedBuffer::new();
        let console = LogCapture::with_sink(sink.clone());
        (SuiteRunner::new(SuiteCtx::with_filter(filter), console, mode), sink)
    }

    #[test]
    fn test_buffered_success_prints_only_result() {
        let (mut runner, sink) = make_runner(RunFilter::all(), LogMode::Buffered);
        let state = runner.run_test("quiet", || {
            runner_noise();
            Ok::<_, String>(())
        });
        assert_eq!(state, TestState::Succeeded);
        assert_eq!(sink.contents(), "1: quiet SUCCEEDED\n");
    }

    #[test]
    fn test_buffered_failure_flushes_capture() {
        let (mut runner, sink) = make_runner(RunFilter::all(), LogMode::Buffered);
        let state = runner.run_test("loud", || Err("boom"));
        assert_eq!(state, TestState::Failed);
        assert_eq!(sink.contents(), "\n1: loud STARTING\n1: loud FAILED\n\n");
    }

    #[test]
    fn test_passthrough_prints_starting() {
        let (mut runner, sink) = make_runner(RunFilter::all(), LogMode::Passthrough);
        runner.run_test("open", || Ok::<_, String>(()));
        assert_eq!(sink.contents(), "\n1: open STARTING\n1: open SUCCEEDED\n");
    }

    #[test]
    fn test_panic_is_failure() {
        let (mut runner, _sink) = make_runner(RunFilter::all(), LogMode::Buffered);
        let state = runner.run_test("panics", || -> Result<(), String> { panic!("bad") });
        assert_eq!(state, TestState::Failed);
        assert_eq!(runner.suite().failed(), vec![1]);
    }

    #[test]
    fn test_skip_announced_only_with_marker() {
        let (mut runner, sink) = make_runner(RunFilter::new(vec![2]), LogMode::Buffered);
        runner.run_test("one", || Ok::<_, String>(()));
        assert_eq!(sink.contents(), "");

        let (mut runner, sink) = make_runner(RunFilter::list_only(), LogMode::Buffered);
        let state = runner.run_test("one", || -> Result<(), String> { panic!("must not run") });
        assert_eq!(state, TestState::Skipped);
        assert_eq!(sink.contents(), "1: one\n");
    }

    fn runner_noise() {
        tracing::info!("discarded on success");
    }
}
