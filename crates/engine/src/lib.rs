//! # Flowstate Engine
//!
//! The Flowstate engine composes integration-test flows out of small steps that thread a
//! caller-defined state value. Each step consumes the state and hands back a return value plus
//! the next state; flows sequence steps (and nested flows), binding intermediate values to
//! named symbols for later elements.
//!
//! ## Key Features
//!
//! - **Primitives**: `get_state`, `swap_state`, `return_value`, `invoke`, and friends
//! - **Flows**: named, nestable sequences with lexically scoped bindings
//! - **Runners**: `run` captures raised errors as values, `run_star` raises them
//! - **Assertions**: `match_value` compares against a structural matcher, optionally
//!   retrying through a bounded probe, and reports instead of raising
//!
//! ## Usage
//!
//! ```rust
//! use flowstate_engine::{flow, get_state, match_value, run, swap_state};
//! use serde_json::{Value, json};
//!
//! let step = flow("increment", vec![
//!     swap_state(|state: &Value| json!({"count": state["count"].as_i64().unwrap_or(0) + 1})).into(),
//!     match_value(1, get_state(|state: &Value| state["count"].clone())).into(),
//! ])?;
//!
//! let (value, state) = run(&step, json!({"count": 0}));
//! assert_eq!(value?.to_json()?, json!(1));
//! assert_eq!(state, json!({"count": 1}));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - **`step`**: the `Step` type and primitive constructors
//! - **`value`**: `StepValue`, the typed return value of every step
//! - **`flow`**: flow elements and compilation
//! - **`scope`**: bindings and the evaluation environment
//! - **`runner`**: `run`, `run_star`, and `RunConfig`
//! - **`probe`**: the bounded retry loop
//! - **`assertion`**: match assertions, matchers, and reporters
//! - **`harness`**: adapter for `#[test]` functions

pub mod assertion;
pub mod error;
pub mod flow;
pub mod harness;
pub mod logging;
pub mod probe;
pub mod runner;
pub mod scope;
pub mod settings;
pub mod step;
pub mod value;

// Re-export commonly used types for convenience
pub use assertion::{
    Actual, Embeds, Equals, MatchOptions, Matcher, RecordingReporter, Reporter, TracingReporter, match_value, match_value_with,
};
pub use error::FlowError;
pub use flow::{Element, bind, flow, let_value};
pub use flowstate_types::{AssertionReport, AssertionStatus, MatchResult, Mismatch, ProbeParams};
pub use harness::run_flow_test;
pub use logging::init_tracing;
pub use probe::{Probed, Sleeper, ThreadSleeper, probe, probe_step};
pub use runner::{Evaluation, RunConfig, RunnerFn, empty_state, ensure_closed, run, run_default, run_in_scope, run_star};
pub use scope::{Bindings, Scope};
pub use settings::Settings;
pub use step::{
    Outcome, Raised, Step, binding, current_description, deferred, fmap, for_each, get_state, invoke, return_value, swap_state,
    try_get_state, try_swap_state, when,
};
pub use value::StepValue;
