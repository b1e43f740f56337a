//! Harness configuration loading from environment variables.
//!
//! All configuration values are loaded from `SECAPI_HARNESS_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SECAPI_HARNESS_GLOBAL_DIR` | /tmp/sec_api_test_global | Engine global store |
//! | `SECAPI_HARNESS_APP_DIR` | /tmp/sec_api_test_app | Engine app store |
//! | `SECAPI_HARNESS_FULL_LOGS` | false | Print all test output as it happens |
//! | `SECAPI_HARNESS_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `SECAPI_HARNESS_LOG_FORMAT` | pretty | `pretty` or `json` |

use std::path::PathBuf;

use serde::Serialize;

use crate::telemetry::{LogConfig, LogFormat, LogMode};

pub const DEFAULT_GLOBAL_DIR: &str = "/tmp/sec_api_test_global";
pub const DEFAULT_APP_DIR: &str = "/tmp/sec_api_test_app";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub global_dir: String,
    pub app_dir: String,
    pub log_mode: String,
    pub full_logs: bool,
    pub log_level: String,
    pub log_format: String,
}

/// All harness configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub global_dir: PathBuf,
    pub app_dir: PathBuf,
    pub log_mode: LogMode,
    pub log: LogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            global_dir: PathBuf::from(DEFAULT_GLOBAL_DIR),
            app_dir: PathBuf::from(DEFAULT_APP_DIR),
            log_mode: LogMode::Buffered,
            log: LogConfig::default(),
        }
    }
}

/// Parse a boolean env var, returning `default` on missing or invalid.
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Read a path env var; empty values count as missing.
fn parse_path(key: &str, default: &str) -> PathBuf {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => PathBuf::from(val),
        _ => PathBuf::from(default),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let level = std::env::var("SECAPI_HARNESS_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let format = std::env::var("SECAPI_HARNESS_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig { format, level }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> HarnessConfig {
    let full_logs = parse_bool("SECAPI_HARNESS_FULL_LOGS", false);

    HarnessConfig {
        global_dir: parse_path("SECAPI_HARNESS_GLOBAL_DIR", DEFAULT_GLOBAL_DIR),
        app_dir: parse_path("SECAPI_HARNESS_APP_DIR", DEFAULT_APP_DIR),
        log_mode: LogMode::from_full_logs(full_logs),
        log: load_log_config(),
    }
}

impl HarnessConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            global_dir: self.global_dir.display().to_string(),
            app_dir: self.app_dir.display().to_string(),
            log_mode: self.log_mode.to_string(),
            full_logs: !self.log_mode.is_buffered(),
            log_level: self.log.level.clone(),
            log_format: self.log.format.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "SECAPI_HARNESS_GLOBAL_DIR",
        "SECAPI_HARNESS_APP_DIR",
        "SECAPI_HARNESS_FULL_LOGS",
        "SECAPI_HARNESS_LOG_LEVEL",
        "SECAPI_HARNESS_LOG_FORMAT",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.global_dir, PathBuf::from("/tmp/sec_api_test_global"));
        assert_eq!(cfg.app_dir, PathBuf::from("/tmp/sec_api_test_app"));
        assert_eq!(cfg.log_mode, LogMode::Buffered);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SECAPI_HARNESS_GLOBAL_DIR", "/var/tmp/g");
        std::env::set_var("SECAPI_HARNESS_APP_DIR", "/var/tmp/a");
        std::env::set_var("SECAPI_HARNESS_FULL_LOGS", "true");
        std::env::set_var("SECAPI_HARNESS_LOG_LEVEL", "secapi_harness=debug");
        std::env::set_var("SECAPI_HARNESS_LOG_FORMAT", "json");
        let cfg = load();
        assert_eq!(cfg.global_dir, PathBuf::from("/var/tmp/g"));
        assert_eq!(cfg.app_dir, PathBuf::from("/var/tmp/a"));
        assert_eq!(cfg.log_mode, LogMode::Passthrough);
        assert_eq!(cfg.log.level, "secapi_harness=debug");
        assert_eq!(cfg.log.format, LogFormat::Json);
        let eff = cfg.effective_config();
        assert_eq!(eff.log_mode, "passthrough");
        assert!(eff.full_logs);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SECAPI_HARNESS_FULL_LOGS", "maybe");
        std::env::set_var("SECAPI_HARNESS_LOG_FORMAT", "xml");
        std::env::set_var("SECAPI_HARNESS_APP_DIR", "  ");
        let cfg = load();
        assert_eq!(cfg.log_mode, LogMode::Buffered);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.app_dir, PathBuf::from(DEFAULT_APP_DIR));
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_contains_all_fields() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        assert_eq!(eff.global_dir, DEFAULT_GLOBAL_DIR);
        assert_eq!(eff.app_dir, DEFAULT_APP_DIR);
        assert_eq!(eff.log_mode, "buffered");
        assert!(!eff.full_logs);
        assert_eq!(eff.log_level, "info");
        assert_eq!(eff.log_format, "pretty");
    }
}
