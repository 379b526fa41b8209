//! Engine error types.

use thiserror::Error;

/// Errors produced while building or validating flows, and while resolving bindings.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A flow was declared without any elements.
    #[error("flow '{description}' has no elements")]
    EmptyFlow { description: String },

    /// A step requires symbols that no enclosing flow binds before it.
    #[error("unbound symbols: {}", .symbols.join(", "))]
    UnboundSymbols { symbols: Vec<String> },

    /// A binding lookup found nothing under the symbol.
    #[error("symbol '{symbol}' is not bound in this scope")]
    UnboundSymbol { symbol: String },

    /// A deferred builder read a symbol missing from its declared requirements.
    #[error("symbol '{symbol}' was read without being declared")]
    UndeclaredSymbol { symbol: String },

    /// A deferred builder produced a step needing symbols it never declared.
    #[error("built step requires undeclared symbols: {}", .symbols.join(", "))]
    UndeclaredSymbols { symbols: Vec<String> },

    /// A bound value is not of the requested type.
    #[error("symbol '{symbol}' holds {found}, not {expected}")]
    BindingType {
        symbol: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A value without a JSON form reached a place that needs one.
    #[error("value of type {type_name} has no JSON form")]
    NoJsonForm { type_name: &'static str },

    /// A value could not be converted to or from JSON.
    #[error("value conversion failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
