//! Match outcomes and the assertion reports handed to reporting collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator used when rendering a description path.
pub const DESCRIPTION_SEPARATOR: &str = " -> ";

/// A single structural difference between an expected and an observed value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mismatch {
    /// JSON path of the differing node, rooted at `$`.
    pub path: String,
    /// Value the matcher expected at `path`.
    pub expected: Value,
    /// Value found at `path`; `None` when the observed value has nothing there.
    pub observed: Option<Value>,
}

impl Mismatch {
    /// Mismatch at the root of the compared values.
    pub fn at_root(expected: Value, observed: Value) -> Self {
        Self {
            path: "$".into(),
            expected,
            observed: Some(observed),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path != "$" {
            write!(f, "at {}: ", self.path)?;
        }
        match &self.observed {
            Some(observed) => write!(f, "expected {}, observed {}", self.expected, observed),
            None => write!(f, "expected {}, observed nothing", self.expected),
        }
    }
}

fn render_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Verdict returned by a structural matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MatchResult {
    /// Whether the observed value satisfied the expectation.
    pub success: bool,
    /// Differences found; empty on success.
    #[serde(default)]
    pub mismatches: Vec<Mismatch>,
}

impl MatchResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            mismatches: Vec::new(),
        }
    }

    pub fn failed(mismatches: Vec<Mismatch>) -> Self {
        Self {
            success: false,
            mismatches,
        }
    }

    /// Human-readable mismatch detail, one difference per `; `-separated entry.
    pub fn detail(&self) -> String {
        render_mismatches(&self.mismatches)
    }
}

/// Final status of an assertion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssertionStatus {
    Passed,
    Failed,
}

/// Everything a reporter needs to render one assertion outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionReport {
    /// Enclosing flow descriptions, outermost first, ending with the assertion's own label.
    pub description: Vec<String>,
    pub expected: Value,
    /// Value produced by the last attempt.
    pub observed: Value,
    pub status: AssertionStatus,
    #[serde(default)]
    pub mismatches: Vec<Mismatch>,
    /// Number of times the actual step was invoked (>= 1).
    pub attempts: u32,
    pub reported_at: DateTime<Utc>,
}

impl AssertionReport {
    /// Builds a report from a matcher verdict, stamped with the current time.
    pub fn new(description: Vec<String>, expected: Value, observed: Value, result: MatchResult, attempts: u32) -> Self {
        let status = if result.success {
            AssertionStatus::Passed
        } else {
            AssertionStatus::Failed
        };
        Self {
            description,
            expected,
            observed,
            status,
            mismatches: result.mismatches,
            attempts,
            reported_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == AssertionStatus::Passed
    }

    /// Description path rendered as `outer -> inner -> label`.
    pub fn description_path(&self) -> String {
        self.description.join(DESCRIPTION_SEPARATOR)
    }

    /// Mismatch detail joined into one line.
    pub fn detail(&self) -> String {
        render_mismatches(&self.mismatches)
    }
}

impl fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            AssertionStatus::Passed => write!(f, "{}: passed after {} attempt(s)", self.description_path(), self.attempts),
            AssertionStatus::Failed => write!(
                f,
                "{}: failed after {} attempt(s): {}",
                self.description_path(),
                self.attempts,
                self.detail()
            ),
        }
    }
}
