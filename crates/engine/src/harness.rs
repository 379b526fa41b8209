//! Adapter running a flow as a host test case.
//!
//! A `#[test]` function returning `anyhow::Result<()>` can hand its flow to
//! [`run_flow_test`]; raised errors and failed assertions both surface as `Err`.

use std::sync::Arc;

use anyhow::{Result, bail};
use flowstate_types::AssertionReport;
use tracing::info;

use crate::{
    assertion::report::{RecordingReporter, Reporter},
    logging::init_tracing,
    runner::{RunConfig, run_star},
    step::Step,
    value::StepValue,
};

/// Forwards every report to several reporters.
struct FanOut {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl Reporter for FanOut {
    fn report(&self, report: &AssertionReport) {
        for reporter in &self.reporters {
            reporter.report(report);
        }
    }
}

/// Runs `step` through [`run_star`] and fails when it raises or when any assertion failed.
///
/// Reports still reach the reporter configured on `config`.
pub fn run_flow_test<S: 'static>(name: &str, config: RunConfig<S>, step: &Step<S>) -> Result<StepValue> {
    init_tracing();

    let recorder = Arc::new(RecordingReporter::new());
    let recording: Arc<dyn Reporter> = recorder.clone();
    let configured = Arc::clone(&config.reporter);
    let config = config.reporter(Arc::new(FanOut {
        reporters: vec![configured, recording],
    }));

    info!(test = %name, "running flow test");
    let (value, _) = run_star(&config, step).map_err(|error| error.context(format!("flow test '{name}' raised")))?;

    let failures = recorder.failures();
    if !failures.is_empty() {
        let rendered: Vec<String> = failures.iter().map(ToString::to_string).collect();
        bail!("flow test '{name}' had {} failed assertion(s):\n{}", failures.len(), rendered.join("\n"));
    }
    Ok(value)
}
