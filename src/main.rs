//! secapi-harness entry point.
//!
//! ## CLI Subcommands
//!
//! - `secapi-harness-cli [ids...]` or `run [ids...] [--json]` - Run the suite (default)
//! - `secapi-harness-cli list` - List tests without running them
//! - `secapi-harness-cli config show|defaults` - Print configuration

use std::process::ExitCode;

use secapi_harness::cli::{config_cmd, parse_run_args, run_cmd, EXIT_USAGE};
use secapi_harness::config::{self as harness_config, HarnessConfig};
use secapi_harness::telemetry::{init_logging, LogCapture};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");

    match command {
        "run" => run(args.get(2..).unwrap_or_default()),
        "list" => {
            let (config, console) = startup();
            exit(run_cmd::run_list(&config, console))
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    exit(EXIT_USAGE)
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("secapi-harness {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        // Bare ids or flags imply `run`.
        first if first.starts_with("--") || first.parse::<i64>().is_ok() => run(&args[1..]),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            exit(EXIT_USAGE)
        }
    }
}

fn run(args: &[String]) -> ExitCode {
    let options = match parse_run_args(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            return exit(EXIT_USAGE);
        }
    };
    let (config, console) = startup();
    exit(run_cmd::run(&options, &config, console))
}

/// Load configuration and install logging into a fresh console.
fn startup() -> (HarnessConfig, LogCapture) {
    let config = harness_config::load();
    let console = LogCapture::stdout();
    if let Err(e) = init_logging(&config.log, console.clone()) {
        eprintln!("Logging disabled: {}", e);
    }
    (config, console)
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_usage() {
    eprintln!(
        "secapi-harness v{}

USAGE:
    secapi-harness-cli [COMMAND] [OPTIONS]

COMMANDS:
    run [IDS...]     Run the conformance suite (default). Bare ids imply run.
    list             List every test without running any (same as `run 0`)
    config show      Show effective configuration
    config defaults  Show default configuration
    version          Show version information
    help             Show this help message

OPTIONS:
    --json           Print the run summary as JSON

TEST SELECTION:
    No ids runs everything. Otherwise only the listed ids run and the rest
    are skipped. A single id of 0 or less runs nothing but still lists
    every test.

ENVIRONMENT:
    SECAPI_HARNESS_GLOBAL_DIR  Engine global store (default: /tmp/sec_api_test_global)
    SECAPI_HARNESS_APP_DIR     Engine app store (default: /tmp/sec_api_test_app)
    SECAPI_HARNESS_FULL_LOGS   Print output of passing tests too (default: false)
    SECAPI_HARNESS_LOG_LEVEL   Log filter (default: info)
    SECAPI_HARNESS_LOG_FORMAT  pretty or json (default: pretty)

EXIT CODES:
    0  Every attempted test passed
    1  At least one attempted test failed
    2  Usage error
",
        env!("CARGO_PKG_VERSION")
    );
}
