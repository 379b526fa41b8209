//! Evaluation environment threaded alongside the state.
//!
//! A [`Scope`] is what every step sees besides the state itself: the description path of the
//! enclosing flows, the symbols bound so far, and the collaborators used by assertions
//! (reporter and sleeper). Flows extend a copy of the scope they are invoked with, so bindings
//! flow inward to nested flows but never back out to the parent.

use std::{any::type_name, fmt, sync::Arc};

use flowstate_types::{DESCRIPTION_SEPARATOR, ProbeParams};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::{
    assertion::report::{Reporter, TracingReporter},
    error::FlowError,
    probe::{Sleeper, ThreadSleeper},
    value::StepValue,
};

/// Symbol table visible to a flow element.
///
/// Preserves binding order; rebinding a symbol shadows the earlier value in place. A view
/// restricted to declared symbols (see [`Bindings::restricted_to`]) reports every miss as an
/// undeclared read.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: IndexMap<String, StepValue>,
    restricted: bool,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value bound under `symbol`, failing when nothing is bound.
    pub fn get(&self, symbol: &str) -> Result<&StepValue, FlowError> {
        self.values.get(symbol).ok_or_else(|| {
            let symbol = symbol.to_string();
            if self.restricted {
                FlowError::UndeclaredSymbol { symbol }
            } else {
                FlowError::UnboundSymbol { symbol }
            }
        })
    }

    /// Borrows the value bound under `symbol` as a `T`.
    pub fn get_ref<T: 'static>(&self, symbol: &str) -> Result<&T, FlowError> {
        let value = self.get(symbol)?;
        value.downcast_ref::<T>().ok_or_else(|| FlowError::BindingType {
            symbol: symbol.to_string(),
            expected: type_name::<T>(),
            found: value.type_name(),
        })
    }

    /// Reads the value bound under `symbol` as a `T`: a clone when it already is one,
    /// otherwise deserialized from its JSON form.
    pub fn get_as<T>(&self, symbol: &str) -> Result<T, FlowError>
    where
        T: DeserializeOwned + Clone + 'static,
    {
        let value = self.get(symbol)?;
        if let Some(typed) = value.downcast_ref::<T>() {
            return Ok(typed.clone());
        }
        Ok(T::deserialize(value.to_json()?)?)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.values.contains_key(symbol)
    }

    /// Returns a copy extended with `symbol`, leaving `self` untouched.
    pub fn with(&self, symbol: impl Into<String>, value: StepValue) -> Self {
        let mut extended = self.clone();
        extended.insert(symbol, value);
        extended
    }

    /// View holding only `symbols`; reads of anything else fail as undeclared.
    pub fn restricted_to<'a>(&self, symbols: impl IntoIterator<Item = &'a String>) -> Self {
        let values = symbols
            .into_iter()
            .filter_map(|symbol| self.values.get(symbol).map(|value| (symbol.clone(), value.clone())))
            .collect();
        Self { values, restricted: true }
    }

    pub(crate) fn insert(&mut self, symbol: impl Into<String>, value: StepValue) {
        self.values.insert(symbol.into(), value);
    }
}

/// Environment handed to every step invocation.
#[derive(Clone)]
pub struct Scope {
    description: Vec<String>,
    bindings: Bindings,
    reporter: Arc<dyn Reporter>,
    sleeper: Arc<dyn Sleeper>,
    probe_defaults: ProbeParams,
}

impl Scope {
    /// Creates a root scope with explicit collaborators and default probe parameters.
    pub fn new(reporter: Arc<dyn Reporter>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            description: Vec::new(),
            bindings: Bindings::new(),
            reporter,
            sleeper,
            probe_defaults: ProbeParams::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Probe parameters used by assertions that do not carry their own.
    pub fn with_probe_defaults(mut self, params: ProbeParams) -> Self {
        self.probe_defaults = params;
        self
    }

    /// Descriptions of the enclosing flows, outermost first.
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Description path rendered as `outer -> inner`.
    pub fn description_path(&self) -> String {
        self.description.join(DESCRIPTION_SEPARATOR)
    }

    /// Description path extended with a trailing label, without entering a new scope.
    pub fn description_with(&self, label: &str) -> Vec<String> {
        let mut description = self.description.clone();
        description.push(label.to_string());
        description
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub fn probe_defaults(&self) -> ProbeParams {
        self.probe_defaults
    }

    /// Child scope for a nested flow: same bindings and collaborators, one more description.
    pub(crate) fn enter(&self, description: &str) -> Self {
        let mut child = self.clone();
        child.description.push(description.to_string());
        child
    }

    pub(crate) fn bind(&mut self, symbol: &str, value: StepValue) {
        self.bindings.insert(symbol, value);
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter), Arc::new(ThreadSleeper))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("description", &self.description)
            .field("bindings", &self.bindings)
            .field("probe_defaults", &self.probe_defaults)
            .finish_non_exhaustive()
    }
}
