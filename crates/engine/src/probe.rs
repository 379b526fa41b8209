//! Bounded retry loop.
//!
//! A probe re-invokes an attempt until its observation succeeds or the attempt budget from
//! [`ProbeParams`] is spent, blocking the calling thread between attempts. The last
//! observation is always returned so callers can render a meaningful failure.

use std::{thread, time::Duration};

use flowstate_types::ProbeParams;
use tracing::debug;

use crate::{
    scope::Scope,
    step::{Raised, Step},
    value::StepValue,
};

/// Blocks between probe attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Final observation of a probe.
#[derive(Debug)]
pub struct Probed<O, S> {
    /// Observation from the last attempt.
    pub observation: O,
    /// State produced by the last attempt.
    pub state: S,
    /// Number of attempts made (>= 1).
    pub attempts: u32,
}

/// Runs `attempt` until `succeeded` accepts its observation or `params.times_to_try` attempts
/// were made.
///
/// Each retry receives the state produced by the previous attempt. An attempt that raises ends
/// the probe immediately with that error.
pub fn probe<S, O, A, P>(state: S, params: &ProbeParams, sleeper: &dyn Sleeper, mut attempt: A, succeeded: P) -> Result<Probed<O, S>, Raised<S>>
where
    A: FnMut(S) -> Result<(O, S), Raised<S>>,
    P: Fn(&O) -> bool,
{
    let max_attempts = params.times_to_try.max(1);
    let mut attempts = 0u32;
    let mut state = state;
    loop {
        attempts += 1;
        let (observation, next_state) = attempt(state)?;

        if succeeded(&observation) {
            debug!(attempts, "probe satisfied");
            return Ok(Probed {
                observation,
                state: next_state,
                attempts,
            });
        }

        if attempts >= max_attempts {
            debug!(attempts, "probe exhausted");
            return Ok(Probed {
                observation,
                state: next_state,
                attempts,
            });
        }

        debug!(attempts, sleep_time_ms = params.sleep_time_ms, "probe retrying");
        sleeper.sleep(params.sleep_duration());
        state = next_state;
    }
}

/// Step that re-invokes `step` until its return value is truthy (see [`StepValue::is_truthy`]).
///
/// Returns the last value observed, truthy or not.
pub fn probe_step<S: 'static>(step: Step<S>, params: ProbeParams) -> Step<S> {
    let requires = step.free_symbols().clone();
    Step::new(move |state, scope: &Scope| {
        let probed = probe(state, &params, scope.sleeper(), |state| step.invoke(state, scope), StepValue::is_truthy)?;
        Ok((probed.observation, probed.state))
    })
    .requiring(requires)
}
