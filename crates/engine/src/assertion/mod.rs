//! Match assertions: compare an expected value against an observed one, optionally probing,
//! report the verdict, and return the observed value as a normal step.
//!
//! - `matcher` holds the structural matchers (`Embeds`, `Equals`)
//! - `report` holds the reporting collaborators

use std::sync::Arc;

use flowstate_types::{AssertionReport, ProbeParams};
use serde_json::Value;

use crate::{
    probe::probe,
    scope::Scope,
    step::{Raised, Step, return_value},
    value::StepValue,
};

pub mod matcher;
pub mod report;

pub use matcher::{Embeds, Equals, Matcher};
pub use report::{RecordingReporter, Reporter, TracingReporter};

/// Label appended to the description path of every assertion unless overridden.
pub const DEFAULT_LABEL: &str = "match";

/// What an assertion observes: a literal, or a step (flows included) producing the value.
pub enum Actual<S> {
    Value(Value),
    Step(Step<S>),
}

impl<S> From<Step<S>> for Actual<S> {
    fn from(step: Step<S>) -> Self {
        Actual::Step(step)
    }
}

impl<S> From<Value> for Actual<S> {
    fn from(value: Value) -> Self {
        Actual::Value(value)
    }
}

impl<S: 'static> Actual<S> {
    /// Normalizes the actual side into a step; literals become constant steps.
    pub fn ensure_step(self) -> Step<S> {
        match self {
            Actual::Value(value) => return_value(value),
            Actual::Step(step) => step,
        }
    }
}

/// Per-assertion configuration.
#[derive(Clone)]
pub struct MatchOptions {
    /// Retry budget; `None` uses the scope's defaults at invocation time.
    pub params: Option<ProbeParams>,
    pub matcher: Arc<dyn Matcher>,
    /// Appended to the description path in reports.
    pub label: String,
}

impl MatchOptions {
    pub fn with_params(mut self, params: ProbeParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            params: None,
            matcher: Arc::new(Embeds),
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl From<ProbeParams> for MatchOptions {
    fn from(params: ProbeParams) -> Self {
        MatchOptions::default().with_params(params)
    }
}

/// Assertion step using the default matcher ([`Embeds`]) and the scope's probe defaults.
pub fn match_value<S: 'static>(expected: impl Into<Value>, actual: impl Into<Actual<S>>) -> Step<S> {
    match_value_with(expected, actual, MatchOptions::default())
}

/// Assertion step comparing `expected` with the value `actual` produces.
///
/// The step returns the observed value (not the verdict) and the state the actual step left
/// behind, so it can sit mid-flow. The observed value is compared through its JSON form; a
/// value without one raises [`crate::error::FlowError::NoJsonForm`]. A mismatch is reported, never raised,
/// and errors raised by the actual step propagate as usual. The reported description is the
/// assertion's own position: the enclosing flows followed by `options.label`.
pub fn match_value_with<S: 'static>(expected: impl Into<Value>, actual: impl Into<Actual<S>>, options: MatchOptions) -> Step<S> {
    let expected = expected.into();
    let actual = actual.into().ensure_step();
    let requires = actual.free_symbols().clone();
    let MatchOptions { params, matcher, label } = options;

    let observe = move |state: S, scope: &Scope| -> Result<(Observation, S), Raised<S>> {
        let (observed, next) = actual.invoke(state, scope)?;
        match observed.to_json() {
            Ok(json) => Ok((Observation { value: observed, json }, next)),
            Err(error) => Err(Raised::new(error, next)),
        }
    };

    Step::new(move |state, scope: &Scope| {
        let description = scope.description_with(&label);
        let params = params.unwrap_or_else(|| scope.probe_defaults());

        let (observation, result, attempts, state) = if params.is_retrying() {
            let probed = probe(
                state,
                &params,
                scope.sleeper(),
                |state| {
                    let (observation, next) = observe(state, scope)?;
                    let result = matcher.matches(&expected, &observation.json);
                    Ok(((observation, result), next))
                },
                |(_, result)| result.success,
            )?;
            let (observation, result) = probed.observation;
            (observation, result, probed.attempts, probed.state)
        } else {
            let (observation, state) = observe(state, scope)?;
            let result = matcher.matches(&expected, &observation.json);
            (observation, result, 1, state)
        };

        let Observation { value, json } = observation;
        scope
            .reporter()
            .report(&AssertionReport::new(description, expected.clone(), json, result, attempts));
        Ok((value, state))
    })
    .requiring(requires)
}

/// Value seen by one attempt, with the JSON form handed to the matcher.
struct Observation {
    value: StepValue,
    json: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        probe::tests::RecordingSleeper,
        step::{get_state, swap_state},
    };
    use flowstate_types::AssertionStatus;
    use serde_json::json;

    fn recording_scope() -> (Scope, Arc<RecordingReporter>, Arc<RecordingSleeper>) {
        let reporter = Arc::new(RecordingReporter::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let scope = Scope::default().with_reporter(reporter.clone()).with_sleeper(sleeper.clone());
        (scope, reporter, sleeper)
    }

    #[test]
    fn literal_actual_is_matched_once() {
        let (scope, reporter, _) = recording_scope();
        let step = match_value::<Value>(json!({"a": 1}), json!({"a": 1, "b": 2}));

        let (value, state) = step.invoke(json!("untouched"), &scope).expect("assertion returns");
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!({"a": 1, "b": 2})));
        assert_eq!(state, json!("untouched"));
        assert_eq!(reporter.reports()[0].status, AssertionStatus::Passed);
        assert_eq!(reporter.reports()[0].description, vec![DEFAULT_LABEL]);
    }

    #[test]
    fn probed_assertion_retries_until_match_and_threads_state() {
        let (scope, reporter, sleeper) = recording_scope();
        let bump = swap_state(|state: &Value| json!(state.as_i64().unwrap_or_default() + 1));
        let observe = crate::flow::flow("observe", vec![bump.into(), get_state(|state: &Value| state.clone()).into()])
            .expect("flow builds");
        let step = match_value_with(3, observe, ProbeParams::new(5, 10).expect("params").into());

        let (value, state) = step.invoke(json!(0), &scope).expect("assertion returns");
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!(3)));
        assert_eq!(state, json!(3));
        assert_eq!(sleeper.count(), 2);

        let report = &reporter.reports()[0];
        assert!(report.passed());
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn exhausted_probe_reports_last_observation() {
        let (scope, reporter, sleeper) = recording_scope();
        let step = match_value_with(
            json!({"status": "ready"}),
            get_state(|_: &Value| json!({"status": "pending"})),
            MatchOptions::from(ProbeParams::new(3, 0).expect("params")).with_label("deploy is ready"),
        );

        let (value, _) = step.invoke(Value::Null, &scope).expect("assertion returns");
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!({"status": "pending"})));
        assert_eq!(sleeper.count(), 2);

        let failures = reporter.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attempts, 3);
        assert_eq!(failures[0].description_path(), "deploy is ready");
        assert_eq!(failures[0].detail(), "at $.status: expected \"ready\", observed \"pending\"");
    }

    #[test]
    fn scope_defaults_drive_assertions_without_params() {
        let (scope, reporter, _) = recording_scope();
        let scope = scope.with_probe_defaults(ProbeParams::new(2, 0).expect("params"));
        let step = match_value::<Value>(1, json!(2));

        step.invoke(Value::Null, &scope).expect("assertion returns");
        assert_eq!(reporter.failures()[0].attempts, 2);
    }

    #[test]
    fn equals_matcher_can_be_selected() {
        let (scope, reporter, _) = recording_scope();
        let options = MatchOptions::default().with_matcher(Arc::new(Equals));
        let step = match_value_with::<Value>(json!({"a": 1}), json!({"a": 1, "b": 2}), options);

        step.invoke(Value::Null, &scope).expect("assertion returns");
        assert_eq!(reporter.failures().len(), 1);
    }

    #[test]
    fn observed_value_without_json_form_raises() {
        let (scope, reporter, _) = recording_scope();
        let previous_state = swap_state(|state: &Value| json!(state.as_i64().unwrap_or_default() + 1));
        let step = match_value(0, previous_state);

        let raised = step.invoke(json!(0), &scope).unwrap_err();
        assert!(matches!(
            raised.error.downcast_ref::<crate::error::FlowError>(),
            Some(crate::error::FlowError::NoJsonForm { .. })
        ));
        assert_eq!(raised.state, json!(1));
        assert!(reporter.reports().is_empty());
    }
}
