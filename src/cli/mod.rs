// Copyright 2024-2026 SECAPI-HARNESS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for harness commands.
//!
//! ## Usage
//!
//! ```bash
//! secapi-harness-cli              # Run the whole conformance suite
//! secapi-harness-cli 3 7          # Run tests 3 and 7 only
//! secapi-harness-cli 0            # Run nothing, list every test
//! secapi-harness-cli run --json   # Run everything, JSON summary
//! ```

pub mod config_cmd;
pub mod run_cmd;

pub use run_cmd::{parse_run_args, parse_run_filter, run_suite, RunOptions, UsageError};

/// Exit code for malformed command lines.
pub const EXIT_USAGE: i32 = 2;
