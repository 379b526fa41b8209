//! Values returned by steps.
//!
//! A [`StepValue`] keeps whatever a step produced as-is, behind an `Arc`, and is read back
//! with typed accessors. Values built from `Serialize` types also remember how to render
//! themselves as JSON; that rendering is only used where a JSON form is required (matchers and
//! reports). Opaque values, such as a previous state handed back by `swap_state`, have no JSON
//! form.

use std::{
    any::{Any, type_name},
    fmt,
    sync::Arc,
};

use serde::{Serialize, Serializer, ser::Error as _};
use serde_json::Value;

use crate::error::FlowError;

type JsonFn = fn(&(dyn Any + Send + Sync + 'static)) -> Result<Value, FlowError>;

/// Return value of a step.
///
/// Cloning shares the underlying value.
#[derive(Clone)]
pub struct StepValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    to_json: Option<JsonFn>,
}

impl StepValue {
    /// Wraps a serializable value; it keeps its JSON form for matchers.
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
            to_json: Some(render_json::<T> as JsonFn),
        }
    }

    /// Wraps a value that has no JSON form.
    pub fn opaque<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
            to_json: None,
        }
    }

    /// The value of side-effect-only steps; renders as JSON `null`.
    pub fn null() -> Self {
        Self::new(())
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the value out by move. Fails, returning `self`, when the type differs or the value
    /// is still shared with a clone.
    pub fn into_inner<T: Send + Sync + 'static>(self) -> Result<T, Self> {
        let Self {
            value,
            type_name,
            to_json,
        } = self;
        match value.downcast::<T>() {
            Ok(typed) => Arc::try_unwrap(typed).map_err(|typed| Self {
                value: typed,
                type_name,
                to_json,
            }),
            Err(value) => Err(Self {
                value,
                type_name,
                to_json,
            }),
        }
    }

    /// Whether the value has a JSON rendering.
    pub fn has_json(&self) -> bool {
        self.to_json.is_some()
    }

    /// Renders the value as JSON.
    pub fn to_json(&self) -> Result<Value, FlowError> {
        match self.to_json {
            Some(render) => render(self.value.as_ref()),
            None => Err(FlowError::NoJsonForm {
                type_name: self.type_name,
            }),
        }
    }

    /// False for null-like values (unit, JSON null) and `false`; true for everything else.
    pub fn is_truthy(&self) -> bool {
        if self.is::<()>() {
            return false;
        }
        if let Some(flag) = self.downcast_ref::<bool>() {
            return *flag;
        }
        if let Some(json) = self.downcast_ref::<Value>() {
            return !matches!(json, Value::Null | Value::Bool(false));
        }
        true
    }
}

fn render_json<T: Serialize + 'static>(value: &(dyn Any + Send + Sync + 'static)) -> Result<Value, FlowError> {
    match value.downcast_ref::<T>() {
        Some(typed) => Ok(serde_json::to_value(typed)?),
        None => Err(FlowError::NoJsonForm {
            type_name: type_name::<T>(),
        }),
    }
}

impl fmt::Debug for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(json) => f.debug_tuple("StepValue").field(&self.type_name).field(&json).finish(),
            Err(_) => f.debug_tuple("StepValue").field(&self.type_name).finish_non_exhaustive(),
        }
    }
}

impl Serialize for StepValue {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        match self.to_json() {
            Ok(json) => json.serialize(serializer),
            Err(error) => Err(Ser::Error::custom(error)),
        }
    }
}
