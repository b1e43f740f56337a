//! secapi-harness
//!
//! Test-harness core for exercising a native security API: keys,
//! certificates, bundles and MAC/cipher/signature/digest/random operations,
//! driven through an opaque engine boundary.
//!
//! # Components
//!
//! - **Suite registry** ([`suite`]): stable 1-based test ids, run filtering,
//!   outcome recording and the end-of-run summary.
//! - **Resource context** ([`context`]): owns every engine handle a test
//!   creates and releases whatever the test leaves behind, operations before
//!   the keys they reference.
//!
//! The engine itself sits behind [`engine::SecEngine`]; [`engine::SoftEngine`]
//! is an in-process implementation used by the CLI and the tests.

pub mod cli;
pub mod config;
pub mod conformance;
pub mod context;
pub mod creds;
pub mod engine;
pub mod error;
pub mod suite;
pub mod telemetry;
pub mod util;

pub use context::{Scoped, TestCtx};
pub use engine::{SecEngine, SoftEngine};
pub use error::{HarnessError, Result, SuiteError};
pub use suite::{RunFilter, SuiteCtx, SuiteRunner, SuiteSummary, TestId, TestState};
