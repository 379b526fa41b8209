//! Named flows: ordered elements compiled into a single step.
//!
//! Compiling a flow is a left fold over its elements that threads the state and a growing
//! binding environment. Elements bound inside a flow are visible to its later elements and to
//! flows nested in them, never to the parent or to siblings.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::{
    error::FlowError,
    scope::Scope,
    step::{Outcome, Step},
    value::StepValue,
};

/// One entry of a flow.
pub enum Element<S> {
    /// Runs the step; its value becomes the flow's value if it is the last element.
    Step(Step<S>),
    /// Runs the step and binds its return value under `symbol` for later elements.
    Bind { symbol: String, step: Step<S> },
    /// Binds a literal under `symbol` for later elements.
    Let { symbol: String, value: StepValue },
}

impl<S> Element<S> {
    fn free_symbols(&self) -> Option<&BTreeSet<String>> {
        match self {
            Element::Step(step) | Element::Bind { step, .. } => Some(step.free_symbols()),
            Element::Let { .. } => None,
        }
    }

    fn bound_symbol(&self) -> Option<&str> {
        match self {
            Element::Step(_) => None,
            Element::Bind { symbol, .. } | Element::Let { symbol, .. } => Some(symbol.as_str()),
        }
    }
}

impl<S> From<Step<S>> for Element<S> {
    fn from(step: Step<S>) -> Self {
        Element::Step(step)
    }
}

/// Binds the return value of `step` under `symbol`.
pub fn bind<S>(symbol: impl Into<String>, step: Step<S>) -> Element<S> {
    Element::Bind {
        symbol: symbol.into(),
        step,
    }
}

/// Binds a literal value under `symbol`.
pub fn let_value<S, T>(symbol: impl Into<String>, value: T) -> Element<S>
where
    T: Serialize + Send + Sync + 'static,
{
    Element::Let {
        symbol: symbol.into(),
        value: StepValue::new(value),
    }
}

/// Compiles `elements` into one step labeled `description`.
///
/// The returned step's free symbols are those its elements require and no earlier element of
/// this flow binds; an enclosing flow (or the runner) decides whether they are satisfied.
///
/// ```rust
/// use flowstate_engine::{bind, binding, flow, return_value, run};
/// use serde_json::{Value, json};
///
/// let step = flow("greeting", vec![
///     bind("name", return_value("ada")),
///     binding("name").into(),
/// ])?;
/// let (value, _) = run(&step, Value::Null);
/// assert_eq!(value?.to_json()?, json!("ada"));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn flow<S: 'static>(description: impl Into<String>, elements: Vec<Element<S>>) -> Result<Step<S>, FlowError> {
    let description = description.into();
    if elements.is_empty() {
        return Err(FlowError::EmptyFlow { description });
    }

    let free_symbols = free_symbols_of(&elements);
    Ok(Step::new(move |state, scope: &Scope| run_elements(&description, &elements, state, scope)).requiring(free_symbols))
}

fn free_symbols_of<S>(elements: &[Element<S>]) -> BTreeSet<String> {
    let mut bound: HashSet<&str> = HashSet::new();
    let mut free = BTreeSet::new();
    for element in elements {
        if let Some(required) = element.free_symbols() {
            free.extend(required.iter().filter(|symbol| !bound.contains(symbol.as_str())).cloned());
        }
        if let Some(symbol) = element.bound_symbol() {
            bound.insert(symbol);
        }
    }
    free
}

fn run_elements<S: 'static>(description: &str, elements: &[Element<S>], state: S, parent: &Scope) -> Outcome<S> {
    let mut scope = parent.enter(description);
    debug!(flow = %scope.description_path(), elements = elements.len(), "flow started");

    let mut state = state;
    let mut returned = StepValue::null();
    for element in elements {
        match element {
            Element::Step(step) => {
                let (value, next) = step.invoke(state, &scope).inspect_err(|raised| log_raised(&scope, &raised.error))?;
                returned = value;
                state = next;
            }
            Element::Bind { symbol, step } => {
                let (value, next) = step.invoke(state, &scope).inspect_err(|raised| log_raised(&scope, &raised.error))?;
                scope.bind(symbol, value.clone());
                returned = value;
                state = next;
            }
            Element::Let { symbol, value } => {
                scope.bind(symbol, value.clone());
                returned = value.clone();
            }
        }
    }

    debug!(flow = %scope.description_path(), "flow finished");
    Ok((returned, state))
}

fn log_raised(scope: &Scope, error: &anyhow::Error) {
    debug!(flow = %scope.description_path(), error = %error, "flow interrupted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{binding, deferred, get_state, return_value, swap_state};
    use serde_json::{Value, json};

    #[test]
    fn empty_flow_is_rejected() {
        let error = flow::<Value>("nothing", Vec::new()).unwrap_err();
        assert!(matches!(error, FlowError::EmptyFlow { ref description } if description == "nothing"));
    }

    #[test]
    fn later_elements_see_earlier_bindings() {
        let step = flow(
            "bindings",
            vec![
                let_value("base", 40),
                bind("offset", return_value(2)),
                deferred(&["base", "offset"], |bindings| {
                    let total = bindings.get_as::<i64>("base")? + bindings.get_as::<i64>("offset")?;
                    Ok(return_value(total))
                })
                .into(),
            ],
        )
        .expect("flow builds");

        assert!(step.free_symbols().is_empty());
        let (value, _) = step.invoke(Value::Null, &Scope::default()).expect("flow returns");
        assert_eq!(value.to_json().expect("renders"), json!(42));
    }

    #[test]
    fn flow_reports_symbols_it_cannot_bind_itself() {
        let step = flow::<Value>("dangling", vec![bind("a", return_value(1)), binding("a").into(), binding("b").into()])
            .expect("flow builds");
        assert_eq!(step.free_symbols().iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn nested_flow_bindings_do_not_leak_to_parent() {
        let inner = flow::<Value>("inner", vec![bind("secret", return_value("x"))]).expect("inner builds");
        let outer = flow("outer", vec![inner.into(), binding("secret").into()]).expect("outer builds");
        assert!(outer.free_symbols().contains("secret"));
    }

    #[test]
    fn nested_flow_sees_parent_bindings() {
        let inner = flow::<Value>("inner", vec![binding("user").into()]).expect("inner builds");
        assert!(inner.free_symbols().contains("user"));

        let outer = flow("outer", vec![let_value("user", "ada"), inner.into()]).expect("outer builds");
        assert!(outer.free_symbols().is_empty());
        let (value, _) = outer.invoke(Value::Null, &Scope::default()).expect("flow returns");
        assert_eq!(value.downcast_ref::<&str>(), Some(&"ada"));
    }

    #[test]
    fn state_threads_through_elements_in_order() {
        let step = flow(
            "counter",
            vec![
                swap_state(|state: &Value| json!({"count": state["count"].as_i64().unwrap_or_default() + 1})).into(),
                swap_state(|state: &Value| json!({"count": state["count"].as_i64().unwrap_or_default() * 10})).into(),
                get_state(|state: &Value| state["count"].clone()).into(),
            ],
        )
        .expect("flow builds");
        let (value, state) = step.invoke(json!({"count": 0}), &Scope::default()).expect("flow returns");
        assert_eq!(value.downcast_ref::<Value>(), Some(&json!(10)));
        assert_eq!(state, json!({"count": 10}));
    }
}
