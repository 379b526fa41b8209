//! Reporting collaborators for assertion outcomes.
//!
//! Assertions never raise on mismatch; they hand an [`AssertionReport`] to the scope's
//! [`Reporter`] and keep going. Whether a failed assertion fails the run is decided by whoever
//! reads the reports (see [`crate::harness`]).

use std::sync::{Mutex, PoisonError};

use flowstate_types::AssertionReport;
use tracing::{info, warn};

/// Receives one report per evaluated assertion.
pub trait Reporter: Send + Sync {
    fn report(&self, report: &AssertionReport);
}

/// Logs every report through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: &AssertionReport) {
        log_report(report);
    }
}

/// Logs and keeps every report for later inspection.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<AssertionReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far, in evaluation order.
    pub fn reports(&self) -> Vec<AssertionReport> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reports of failed assertions only.
    pub fn failures(&self) -> Vec<AssertionReport> {
        self.reports().into_iter().filter(|report| !report.passed()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, report: &AssertionReport) {
        log_report(report);
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).push(report.clone());
    }
}

fn log_report(report: &AssertionReport) {
    if report.passed() {
        info!(
            description = %report.description_path(),
            attempts = report.attempts,
            "assertion passed"
        );
    } else {
        warn!(
            description = %report.description_path(),
            attempts = report.attempts,
            expected = %report.expected,
            observed = %report.observed,
            mismatch = %report.detail(),
            "assertion failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_types::{MatchResult, Mismatch};
    use serde_json::json;
    use std::{sync::Arc, thread};

    #[test]
    fn recording_reporter_separates_failures() {
        let reporter = RecordingReporter::new();
        reporter.report(&AssertionReport::new(vec!["ok".into()], json!(1), json!(1), MatchResult::passed(), 1));
        reporter.report(&AssertionReport::new(
            vec!["bad".into()],
            json!(2),
            json!(1),
            MatchResult::failed(vec![Mismatch::at_root(json!(2), json!(1))]),
            2,
        ));

        assert_eq!(reporter.reports().len(), 2);
        let failures = reporter.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].description_path(), "bad");
        assert_eq!(failures[0].attempts, 2);
    }

    #[test]
    fn poisoned_recorder_still_keeps_failures() {
        let reporter = Arc::new(RecordingReporter::new());
        let holder = Arc::clone(&reporter);
        let _ = thread::spawn(move || {
            let _reports = holder.reports.lock().expect("first lock");
            panic!("reporter thread died while holding the lock");
        })
        .join();
        assert!(reporter.reports.is_poisoned());

        reporter.report(&AssertionReport::new(
            vec!["after panic".into()],
            json!(2),
            json!(1),
            MatchResult::failed(vec![Mismatch::at_root(json!(2), json!(1))]),
            1,
        ));
        assert_eq!(reporter.failures().len(), 1);
    }
}
