//! End-of-run report.

use std::fmt::Write as _;

use serde::Serialize;

use super::{SuiteCtx, TestId, TestState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub id: TestId,
    pub name: String,
    pub state: TestState,
}

/// Attempted, succeeded, failed and skipped tests of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub registered: usize,
    pub attempted: Vec<SummaryEntry>,
    pub succeeded: Vec<SummaryEntry>,
    pub failed: Vec<SummaryEntry>,
    pub skipped: Vec<SummaryEntry>,
}

impl SuiteSummary {
    pub fn from_suite(suite: &SuiteCtx) -> Self {
        let entries = |ids: Vec<TestId>| -> Vec<SummaryEntry> {
            ids.into_iter()
                .filter_map(|id| {
                    suite.test_entry(id).ok().map(|entry| SummaryEntry {
                        id,
                        name: entry.name.clone(),
                        state: entry.state,
                    })
                })
                .collect()
        };

        Self {
            registered: suite.len(),
            attempted: entries(suite.attempted()),
            succeeded: entries(suite.succeeded()),
            failed: entries(suite.failed()),
            skipped: entries(suite.skipped()),
        }
    }

    /// 1 if any attempted test failed, else 0.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.failed.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\nSummary: {} registered, {} attempted, {} succeeded, {} failed, {} skipped",
            self.registered,
            self.attempted.len(),
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        );
        for (label, entries) in [
            ("Attempted", &self.attempted),
            ("Failed", &self.failed),
            ("Skipped", &self.skipped),
        ] {
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{label}:");
            for entry in entries {
                let _ = writeln!(out, "  {}: {}", entry.id, entry.name);
            }
        }
        out
    }
}
