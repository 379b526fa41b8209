//! The atomic unit of a flow and its primitive constructors.
//!
//! A [`Step`] is a computation `State -> (StepValue, State)` evaluated against a [`Scope`]. The
//! engine moves the state into each step and takes it back from the result, so a state is
//! never cloned; it is only replaced by what a step hands back.

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::Serialize;

use crate::{error::FlowError, scope::Bindings, scope::Scope, value::StepValue};

/// Error raised by a step together with the state at the point of failure.
pub struct Raised<S> {
    pub error: anyhow::Error,
    pub state: S,
}

impl<S> Raised<S> {
    pub fn new(error: impl Into<anyhow::Error>, state: S) -> Self {
        Self {
            error: error.into(),
            state,
        }
    }
}

impl<S> fmt::Debug for Raised<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raised").field("error", &self.error).finish_non_exhaustive()
    }
}

/// Result of invoking a step: the return value and next state, or the raised error and the
/// last state produced before it.
pub type Outcome<S> = Result<(StepValue, S), Raised<S>>;

type StepFn<S> = dyn Fn(S, &Scope) -> Outcome<S> + Send + Sync;

/// A composable computation over a state value.
///
/// Steps are cheap to clone. Each step records the symbols it needs from an enclosing
/// binding environment ([`Step::free_symbols`]); flows use this to reject references to
/// symbols nobody binds before any state is threaded.
pub struct Step<S> {
    body: Arc<StepFn<S>>,
    requires: BTreeSet<String>,
}

impl<S> Clone for Step<S> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
            requires: self.requires.clone(),
        }
    }
}

impl<S> fmt::Debug for Step<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("requires", &self.requires).finish_non_exhaustive()
    }
}

impl<S: 'static> Step<S> {
    /// Wraps a raw step body.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(S, &Scope) -> Outcome<S> + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(body),
            requires: BTreeSet::new(),
        }
    }
}

impl<S> Step<S> {
    /// Declares symbols this step reads from the enclosing bindings.
    pub fn requiring<I, T>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.requires.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Runs the step once against `state`.
    pub fn invoke(&self, state: S, scope: &Scope) -> Outcome<S> {
        (self.body)(state, scope)
    }

    /// Symbols this step expects an enclosing flow to have bound.
    pub fn free_symbols(&self) -> &BTreeSet<String> {
        &self.requires
    }
}

/// Step returning `f(state)` and leaving the state unchanged.
pub fn get_state<S, T, F>(f: F) -> Step<S>
where
    S: 'static,
    T: Serialize + Send + Sync + 'static,
    F: Fn(&S) -> T + Send + Sync + 'static,
{
    Step::new(move |state, _| {
        let value = f(&state);
        Ok((StepValue::new(value), state))
    })
}

/// Like [`get_state`] for fallible reads; an error raises with the state untouched.
pub fn try_get_state<S, T, F>(f: F) -> Step<S>
where
    S: 'static,
    T: Serialize + Send + Sync + 'static,
    F: Fn(&S) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Step::new(move |state, _| match f(&state) {
        Ok(value) => Ok((StepValue::new(value), state)),
        Err(error) => Err(Raised::new(error, state)),
    })
}

/// Step replacing the state with `f(state)` and returning the previous state itself.
///
/// The previous state is moved into an opaque [`StepValue`]; take it back with
/// [`StepValue::into_inner`] or borrow it with [`StepValue::downcast_ref`].
pub fn swap_state<S, F>(f: F) -> Step<S>
where
    S: Send + Sync + 'static,
    F: Fn(&S) -> S + Send + Sync + 'static,
{
    Step::new(move |state, _| {
        let next = f(&state);
        Ok((StepValue::opaque(state), next))
    })
}

/// Like [`swap_state`] for fallible transitions; an error raises with the previous state.
pub fn try_swap_state<S, F>(f: F) -> Step<S>
where
    S: Send + Sync + 'static,
    F: Fn(&S) -> anyhow::Result<S> + Send + Sync + 'static,
{
    Step::new(move |state, _| match f(&state) {
        Ok(next) => Ok((StepValue::opaque(state), next)),
        Err(error) => Err(Raised::new(error, state)),
    })
}

/// Step returning `value` and leaving the state unchanged.
///
/// Every invocation shares the same value. Values that depend on bindings must be produced at
/// invocation time with [`binding`] or [`deferred`] instead.
pub fn return_value<S, T>(value: T) -> Step<S>
where
    S: 'static,
    T: Serialize + Send + Sync + 'static,
{
    let value = StepValue::new(value);
    Step::new(move |state, _| Ok((value.clone(), state)))
}

/// Step running `f` for its side effect; returns null and leaves the state unchanged.
///
/// Errors from `f` propagate to the enclosing flow.
pub fn invoke<S, T, F>(f: F) -> Step<S>
where
    S: 'static,
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
{
    Step::new(move |state, _| match f() {
        Ok(_) => Ok((StepValue::null(), state)),
        Err(error) => Err(Raised::new(error, state)),
    })
}

/// Step returning the value bound under `symbol` in the enclosing flows.
pub fn binding<S: 'static>(symbol: impl Into<String>) -> Step<S> {
    let symbol = symbol.into();
    let requires = [symbol.clone()];
    Step::new(move |state, scope: &Scope| match scope.bindings().get(&symbol) {
        Ok(value) => Ok((value.clone(), state)),
        Err(error) => Err(Raised::new(error, state)),
    })
    .requiring(requires)
}

/// Step built from the current bindings each time it is invoked.
///
/// `requires` names the symbols `builder` reads so that flows can validate them up front. The
/// builder only sees those symbols, and the step it returns may only require symbols from the
/// same list; anything else raises [`FlowError::UndeclaredSymbol`] or
/// [`FlowError::UndeclaredSymbols`].
pub fn deferred<S, F>(requires: &[&str], builder: F) -> Step<S>
where
    S: 'static,
    F: Fn(&Bindings) -> anyhow::Result<Step<S>> + Send + Sync + 'static,
{
    let declared: BTreeSet<String> = requires.iter().map(|symbol| symbol.to_string()).collect();
    let checked = declared.clone();
    Step::new(move |state, scope: &Scope| {
        let view = scope.bindings().restricted_to(&checked);
        let step = match builder(&view) {
            Ok(step) => step,
            Err(error) => return Err(Raised::new(error, state)),
        };
        let undeclared: Vec<String> = step.free_symbols().difference(&checked).cloned().collect();
        if !undeclared.is_empty() {
            return Err(Raised::new(FlowError::UndeclaredSymbols { symbols: undeclared }, state));
        }
        step.invoke(state, scope)
    })
    .requiring(declared)
}

/// Step applying `f` to the return value of `step`.
pub fn fmap<S, T, F>(f: F, step: Step<S>) -> Step<S>
where
    S: 'static,
    T: Serialize + Send + Sync + 'static,
    F: Fn(StepValue) -> T + Send + Sync + 'static,
{
    let requires = step.free_symbols().clone();
    Step::new(move |state, scope: &Scope| {
        let (value, state) = step.invoke(state, scope)?;
        Ok((StepValue::new(f(value)), state))
    })
    .requiring(requires)
}

/// Runs `step` only when `condition` holds; otherwise returns null without touching the state.
pub fn when<S: 'static>(condition: bool, step: Step<S>) -> Step<S> {
    if condition {
        step
    } else {
        Step::new(|state, _| Ok((StepValue::null(), state)))
    }
}

/// Builds one step per value and runs them in order, returning their values as a
/// `Vec<StepValue>`.
pub fn for_each<S, I, F>(values: I, f: F) -> Step<S>
where
    S: 'static,
    I: IntoIterator,
    F: Fn(I::Item) -> Step<S>,
{
    let steps: Vec<Step<S>> = values.into_iter().map(f).collect();
    let requires: BTreeSet<String> = steps.iter().flat_map(|step| step.free_symbols().iter().cloned()).collect();
    Step::new(move |state, scope: &Scope| {
        let mut returned = Vec::with_capacity(steps.len());
        let mut state = state;
        for step in &steps {
            let (value, next) = step.invoke(state, scope)?;
            returned.push(value);
            state = next;
        }
        Ok((StepValue::new(returned), state))
    })
    .requiring(requires)
}

/// Step returning the description path of the flows it runs in.
pub fn current_description<S: 'static>() -> Step<S> {
    Step::new(|state, scope: &Scope| Ok((StepValue::new(scope.description_path()), state)))
}
