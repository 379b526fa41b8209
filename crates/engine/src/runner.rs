//! Entry points that drive a composed step against an initial state.
//!
//! - [`run`] is forgiving: a raised error comes back as the value half of the pair, next to
//!   the state at the point of failure.
//! - [`run_star`] is strict: it builds the state with [`RunConfig`]'s `init`, and a raised
//!   error propagates as `Err` unless the configured `on_error` hook recovers it.
//!
//! Both reject steps with unbound free symbols before any state is threaded.

use std::sync::Arc;

use anyhow::Result;
use flowstate_types::ProbeParams;
use tracing::{debug, error, warn};

use crate::{
    assertion::report::{Reporter, TracingReporter},
    error::FlowError,
    probe::{Sleeper, ThreadSleeper},
    scope::Scope,
    settings::Settings,
    step::{Raised, Step},
    value::StepValue,
};

/// Pair returned by a run: the return value (or the raised error) and the final state.
pub type Evaluation<S> = (Result<StepValue>, S);

/// Run strategy used by [`run_star`].
pub type RunnerFn<S> = Arc<dyn Fn(&Step<S>, S, &Scope) -> Evaluation<S> + Send + Sync>;

type InitFn<S> = Arc<dyn Fn() -> Result<S> + Send + Sync>;
type CleanupFn<S> = Arc<dyn Fn(&S) + Send + Sync>;
type OnErrorFn<S> = Arc<dyn Fn(anyhow::Error, &S) -> Result<StepValue> + Send + Sync>;

/// Empty initial state.
pub fn empty_state<S: Default>() -> S {
    S::default()
}

/// Runs `step` against `initial_state`, capturing any raised error as the returned value.
pub fn run<S: 'static>(step: &Step<S>, initial_state: S) -> Evaluation<S> {
    run_in_scope(step, initial_state, &Scope::default())
}

/// [`run`] starting from [`empty_state`].
pub fn run_default<S: Default + 'static>(step: &Step<S>) -> Evaluation<S> {
    run(step, empty_state())
}

/// [`run`] with explicit collaborators (reporter, sleeper, probe defaults).
pub fn run_in_scope<S: 'static>(step: &Step<S>, initial_state: S, scope: &Scope) -> Evaluation<S> {
    if let Err(error) = ensure_closed(step) {
        warn!(error = %error, "flow rejected before running");
        return (Err(error.into()), initial_state);
    }

    match step.invoke(initial_state, scope) {
        Ok((value, state)) => (Ok(value), state),
        Err(Raised { error, state }) => {
            warn!(error = %error, "flow raised");
            (Err(error), state)
        }
    }
}

/// Fails when `step` needs symbols nothing binds.
pub fn ensure_closed<S: 'static>(step: &Step<S>) -> Result<(), FlowError> {
    if step.free_symbols().is_empty() {
        return Ok(());
    }
    Err(FlowError::UnboundSymbols {
        symbols: step.free_symbols().iter().cloned().collect(),
    })
}

/// Configuration for [`run_star`].
pub struct RunConfig<S> {
    init: InitFn<S>,
    cleanup: Option<CleanupFn<S>>,
    runner: RunnerFn<S>,
    on_error: OnErrorFn<S>,
    pub(crate) reporter: Arc<dyn Reporter>,
    sleeper: Arc<dyn Sleeper>,
    probe_defaults: ProbeParams,
}

impl<S: 'static> RunConfig<S> {
    /// Configuration building each run's state with `init`.
    pub fn with_init<F>(init: F) -> Self
    where
        F: Fn() -> Result<S> + Send + Sync + 'static,
    {
        Self {
            init: Arc::new(init),
            cleanup: None,
            runner: Arc::new(run_in_scope::<S>),
            on_error: Arc::new(raise::<S>),
            reporter: Arc::new(TracingReporter),
            sleeper: Arc::new(ThreadSleeper),
            probe_defaults: ProbeParams::default(),
        }
    }

    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn() -> Result<S> + Send + Sync + 'static,
    {
        self.init = Arc::new(init);
        self
    }

    /// Hook invoked with the final state after every run, successful or not.
    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn runner<F>(mut self, runner: F) -> Self
    where
        F: Fn(&Step<S>, S, &Scope) -> Evaluation<S> + Send + Sync + 'static,
    {
        self.runner = Arc::new(runner);
        self
    }

    /// Hook deciding what a raised error becomes. The default logs and re-raises; returning
    /// `Ok` recovers the run with that value.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(anyhow::Error, &S) -> Result<StepValue> + Send + Sync + 'static,
    {
        self.on_error = Arc::new(on_error);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Applies probe defaults from loaded settings.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.probe_defaults = settings.probe;
        self
    }

    fn scope(&self) -> Scope {
        Scope::new(Arc::clone(&self.reporter), Arc::clone(&self.sleeper)).with_probe_defaults(self.probe_defaults)
    }
}

impl<S: Default + 'static> Default for RunConfig<S> {
    fn default() -> Self {
        Self::with_init(|| Ok(S::default()))
    }
}

fn raise<S>(error: anyhow::Error, _state: &S) -> Result<StepValue> {
    error!(error = %error, "flow failed");
    Err(error)
}

/// Builds the initial state with `config.init`, runs `step` with `config.runner`, and returns
/// the value and final state. Raised errors go through `config.on_error`, which raises by
/// default.
pub fn run_star<S: 'static>(config: &RunConfig<S>, step: &Step<S>) -> Result<(StepValue, S)> {
    ensure_closed(step)?;

    let initial_state = (config.init)()?;
    let (result, state) = (config.runner)(step, initial_state, &config.scope());

    if let Some(cleanup) = &config.cleanup {
        debug!("running cleanup");
        cleanup(&state);
    }

    match result {
        Ok(value) => Ok((value, state)),
        Err(error) => {
            let value = (config.on_error)(error, &state)?;
            Ok((value, state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        flow::flow,
        step::{binding, get_state, invoke},
    };
    use anyhow::bail;
    use serde_json::{Value, json};
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn run_captures_raised_error_with_last_state() {
        let step = flow(
            "boom",
            vec![
                invoke(|| -> Result<()> { bail!("kaboom") }).into(),
                get_state(|state: &Value| state.clone()).into(),
            ],
        )
        .expect("flow builds");

        let (result, state) = run(&step, json!({"count": 1}));
        assert_eq!(result.unwrap_err().to_string(), "kaboom");
        assert_eq!(state, json!({"count": 1}));
    }

    #[test]
    fn run_rejects_unbound_symbols_before_threading_state() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invoked);
        let step = flow(
            "dangling",
            vec![
                invoke(move || -> Result<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .into(),
                binding("missing").into(),
            ],
        )
        .expect("flow builds");

        let (result, state) = run(&step, json!("initial"));
        assert!(result.unwrap_err().to_string().contains("missing"));
        assert_eq!(state, json!("initial"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_star_uses_init_and_raises() {
        let config = RunConfig::with_init(|| Ok(json!({"count": 5})));
        let failing = invoke::<Value, (), _>(|| bail!("db unavailable"));

        let error = run_star(&config, &failing).unwrap_err();
        assert_eq!(error.to_string(), "db unavailable");

        let (value, state) = run_star(&config, &get_state(|state: &Value| state["count"].clone())).expect("run succeeds");
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!(5)));
        assert_eq!(state, json!({"count": 5}));
    }

    #[test]
    fn run_star_fails_when_init_fails() {
        let config = RunConfig::<Value>::with_init(|| bail!("fixture missing"));
        let error = run_star(&config, &get_state(|state: &Value| state.clone())).unwrap_err();
        assert_eq!(error.to_string(), "fixture missing");
    }

    #[test]
    fn on_error_hook_can_recover() {
        let config = RunConfig::<Value>::default().on_error(|error, _| Ok(StepValue::new(json!({"recovered": error.to_string()}))));
        let failing = invoke::<Value, (), _>(|| bail!("flaky"));

        let (value, state) = run_star(&config, &failing).expect("hook recovers");
        assert_eq!(value.to_json().expect("renders"), json!({"recovered": "flaky"}));
        assert_eq!(state, Value::Null);
    }

    #[test]
    fn cleanup_sees_final_state_even_on_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = RunConfig::with_init(|| Ok(json!("fixture"))).cleanup(move |state: &Value| {
            sink.lock().expect("sink lock").push(state.clone());
        });

        let _ = run_star(&config, &invoke::<Value, (), _>(|| bail!("nope")));
        assert_eq!(*seen.lock().expect("seen lock"), vec![json!("fixture")]);
    }

    #[test]
    fn custom_runner_replaces_strategy() {
        let config = RunConfig::<Value>::default().runner(|_, state, _| (Ok(StepValue::new("short-circuited")), state));
        let (value, _) = run_star(&config, &invoke::<Value, (), _>(|| bail!("never runs"))).expect("runner returns");
        assert_eq!(value.downcast_ref::<&str>(), Some(&"short-circuited"));
    }
}
