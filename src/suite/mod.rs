//! Suite registry.
//!
//! Tests register in call order and get dense 1-based ids. A [`RunFilter`]
//! decides which of them execute; everything else is recorded as skipped.

mod runner;
mod summary;

use std::fmt;

use serde::Serialize;

use crate::error::SuiteError;

pub use runner::SuiteRunner;
pub use summary::{SuiteSummary, SummaryEntry};

/// 1-based test identifier, assigned in registration order.
pub type TestId = usize;

/// Outcome of a registered test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    /// Registered, no outcome recorded yet.
    #[default]
    Unset,
    Succeeded,
    Failed,
    Skipped,
}

impl TestState {
    /// Succeeded or failed.
    pub fn is_attempted(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-supplied selection of test ids.
///
/// Empty runs everything. A single non-positive entry is the verbose-skip
/// marker: nothing runs, but every skipped test is still announced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    ids: Vec<i64>,
}

impl RunFilter {
    pub fn new(ids: Vec<i64>) -> Self {
        Self { ids }
    }

    /// The empty filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// The `{0}` filter: run nothing, announce everything.
    pub fn list_only() -> Self {
        Self { ids: vec![0] }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: TestId) -> bool {
        i64::try_from(id).is_ok_and(|id| self.ids.contains(&id))
    }

    pub fn is_verbose_skip(&self) -> bool {
        matches!(self.ids.as_slice(), [only] if *only <= 0)
    }
}

impl FromIterator<i64> for RunFilter {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A registered test: display name plus outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntry {
    pub name: String,
    pub state: TestState,
}

/// Registry of tests for one run.
#[derive(Debug, Default)]
pub struct SuiteCtx {
    tests: Vec<TestEntry>,
    filter: RunFilter,
}

impl SuiteCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: RunFilter) -> Self {
        Self {
            tests: Vec::new(),
            filter,
        }
    }

    pub fn set_run_params(&mut self, filter: RunFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &RunFilter {
        &self.filter
    }

    /// Register `name` and return its id, which is the new entry count.
    pub fn add_test(&mut self, name: impl Into<String>) -> TestId {
        self.tests.push(TestEntry {
            name: name.into(),
            state: TestState::Unset,
        });
        self.tests.len()
    }

    pub fn should_run(&self, id: TestId) -> bool {
        self.filter.is_empty() || self.filter.contains(id)
    }

    /// Whether `id` is announced: it runs, or the filter is the verbose-skip marker.
    pub fn should_print(&self, id: TestId) -> bool {
        self.should_run(id) || self.filter.is_verbose_skip()
    }

    pub fn set_test_state(&mut self, id: TestId, state: TestState) -> Result<(), SuiteError> {
        let registered = self.tests.len();
        let entry = id
            .checked_sub(1)
            .and_then(|idx| self.tests.get_mut(idx))
            .ok_or(SuiteError::UnknownTest { id, registered })?;

        if entry.state != TestState::Unset && entry.state != state {
            tracing::warn!(id, from = %entry.state, to = %state, "test state overwritten");
        }
        entry.state = state;
        Ok(())
    }

    pub fn test_entry(&self, id: TestId) -> Result<&TestEntry, SuiteError> {
        id.checked_sub(1)
            .and_then(|idx| self.tests.get(idx))
            .ok_or(SuiteError::UnknownTest {
                id,
                registered: self.tests.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    fn ids_where(&self, pred: impl Fn(TestState) -> bool) -> Vec<TestId> {
        self.tests
            .iter()
            .enumerate()
            .filter(|(_, entry)| pred(entry.state))
            .map(|(idx, _)| idx + 1)
            .collect()
    }

    pub fn failed(&self) -> Vec<TestId> {
        self.ids_where(|s| s == TestState::Failed)
    }

    pub fn succeeded(&self) -> Vec<TestId> {
        self.ids_where(|s| s == TestState::Succeeded)
    }

    pub fn skipped(&self) -> Vec<TestId> {
        self.ids_where(|s| s == TestState::Skipped)
    }

    pub fn attempted(&self) -> Vec<TestId> {
        self.ids_where(|s| s.is_attempted())
    }

    pub fn all(&self) -> Vec<TestId> {
        (1..=self.tests.len()).collect()
    }
}
