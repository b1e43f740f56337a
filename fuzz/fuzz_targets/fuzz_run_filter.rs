//! Fuzz target for CLI run-filter parsing.
//!
//! Arbitrary argument lists must parse or fail with a usage error, and a
//! parsed filter must answer `should_run`/`should_print` without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use secapi_harness::cli::parse_run_args;
use secapi_harness::SuiteCtx;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let args: Vec<&str> = text.split_whitespace().collect();

    if let Ok(options) = parse_run_args(&args) {
        let suite = SuiteCtx::with_filter(options.filter);
        for id in 0..64 {
            if suite.should_run(id) {
                assert!(suite.should_print(id));
            }
        }
    }
});
