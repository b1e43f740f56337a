//! Harness error taxonomy.
//!
//! Engine failures, fixture lookup failures and registry misuse each get their
//! own enum; [`HarnessError`] unifies them for test bodies so they can use `?`.

use thiserror::Error;

use crate::creds::CredsError;
use crate::engine::EngineError;

/// Misuse of the suite registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuiteError {
    #[error("Unknown test id {id}: {registered} tests registered")]
    UnknownTest { id: usize, registered: usize },
}

/// Any failure a test body or the resource context can report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Credential lookup failed: {0}")]
    Creds(#[from] CredsError),

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error("Test context has no open processor")]
    NotInitialized,

    #[error("Check failed: {0}")]
    Assertion(String),
}

impl HarnessError {
    /// Build an [`HarnessError::Assertion`] from anything printable.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    /// The engine error underneath, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Fail the current test body with [`HarnessError::Assertion`] unless the
/// condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::Assertion(format!($($arg)+)));
        }
    };
}
