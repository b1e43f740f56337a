// Copyright 2024-2026 SECAPI-HARNESS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults.
//!
//! These read configuration straight from environment variables.

use crate::config::{self, EffectiveConfig, DEFAULT_APP_DIR, DEFAULT_GLOBAL_DIR, DEFAULT_LOG_LEVEL};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print!("{}", render_config(&cfg));
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("SECAPI_HARNESS_GLOBAL_DIR={DEFAULT_GLOBAL_DIR}");
    println!("SECAPI_HARNESS_APP_DIR={DEFAULT_APP_DIR}");
    println!("SECAPI_HARNESS_FULL_LOGS=false");
    println!("SECAPI_HARNESS_LOG_LEVEL={DEFAULT_LOG_LEVEL}");
    println!("SECAPI_HARNESS_LOG_FORMAT=pretty");
}

fn render_config(cfg: &EffectiveConfig) -> String {
    format!(
        "SECAPI_HARNESS_GLOBAL_DIR={}\n\
         SECAPI_HARNESS_APP_DIR={}\n\
         SECAPI_HARNESS_FULL_LOGS={}\n\
         SECAPI_HARNESS_LOG_LEVEL={}\n\
         SECAPI_HARNESS_LOG_FORMAT={}\n",
        cfg.global_dir,
        cfg.app_dir,
        cfg.full_logs,
        cfg.log_level,
        cfg.log_format,
    )
}
