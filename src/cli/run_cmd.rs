// Copyright 2024-2026 SECAPI-HARNESS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run` and `list` subcommands.

use std::sync::Arc;

use thiserror::Error;

use crate::config::HarnessConfig;
use crate::conformance::{self, SuiteEnv};
use crate::engine::{SecEngine, SoftEngine};
use crate::suite::{RunFilter, SuiteCtx, SuiteRunner, SuiteSummary};
use crate::telemetry::LogCapture;

/// Malformed `run` arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Invalid test id: {0}")]
    InvalidId(String),
    #[error("Unknown option: {0}")]
    UnknownOption(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub filter: RunFilter,
    pub json: bool,
}

/// Parse test ids only. Any non-integer is a usage error.
pub fn parse_run_filter<S: AsRef<str>>(args: &[S]) -> Result<RunFilter, UsageError> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref().trim();
            arg.parse::<i64>()
                .map_err(|_| UsageError::InvalidId(arg.to_string()))
        })
        .collect()
}

/// Parse `[ids...] [--json]`.
pub fn parse_run_args<S: AsRef<str>>(args: &[S]) -> Result<RunOptions, UsageError> {
    let mut json = false;
    let mut ids = Vec::with_capacity(args.len());
    for arg in args {
        match arg.as_ref() {
            "--json" => json = true,
            opt if opt.starts_with("--") => return Err(UsageError::UnknownOption(opt.to_string())),
            id => ids.push(id),
        }
    }
    Ok(RunOptions {
        filter: parse_run_filter(&ids)?,
        json,
    })
}

/// Run the conformance suite against `engine` and return its summary.
pub fn run_suite(
    engine: Arc<dyn SecEngine>,
    filter: RunFilter,
    config: &HarnessConfig,
    console: LogCapture,
) -> SuiteSummary {
    let env = SuiteEnv::from_config(engine, config);
    let mut runner = SuiteRunner::new(SuiteCtx::with_filter(filter), console, config.log_mode);
    conformance::register_all(&mut runner, &env);
    runner.summary()
}

/// Run against the built-in engine and print the summary.
///
/// Returns the process exit code.
pub fn run(options: &RunOptions, config: &HarnessConfig, console: LogCapture) -> i32 {
    tracing::info!(filter = ?options.filter.ids(), mode = ?config.log_mode, "starting run");
    let summary = run_suite(
        Arc::new(SoftEngine::new()),
        options.filter.clone(),
        config,
        console.clone(),
    );

    if options.json {
        match summary.to_json() {
            Ok(json) => console.println(&json),
            Err(e) => {
                eprintln!("Failed to serialize summary: {e}");
                return 1;
            }
        }
    } else {
        console.print(&summary.render_text());
    }
    if let Err(e) = console.flush() {
        eprintln!("Failed to flush output: {e}");
    }
    summary.exit_code()
}

/// Announce every registered test without running any.
pub fn run_list(config: &HarnessConfig, console: LogCapture) -> i32 {
    run_suite(
        Arc::new(SoftEngine::new()),
        RunFilter::list_only(),
        config,
        console,
    );
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_and_json_flag() {
        let opts = parse_run_args(&["3", "--json", "7"]).unwrap();
        assert_eq!(opts.filter.ids(), &[3, 7]);
        assert!(opts.json);
    }

    #[test]
    fn test_parse_rejects_non_integer() {
        assert_eq!(
            parse_run_filter(&["1", "two"]),
            Err(UsageError::InvalidId("two".into()))
        );
        assert_eq!(
            parse_run_args(&["--verbose"]),
            Err(UsageError::UnknownOption("--verbose".into()))
        );
    }

    #[test]
    fn test_negative_ids_parse() {
        let filter = parse_run_filter(&["-1"]).unwrap();
        assert!(filter.is_verbose_skip());
    }

    #[test]
    fn test_empty_args_run_everything() {
        let opts = parse_run_args::<&str>(&[]).unwrap();
        assert!(opts.filter.is_empty());
        assert!(!opts.json);
    }
}
