//! Plugin System - Named transformation passes over a [`Document`]
//!
//! A plugin is a capability: a canonical name, optional default parameters
//! and an `apply` step. Built-in passes and external declarative plugins
//! share the same [`Plugin`] trait so the executor never distinguishes them.

pub mod builtin;
pub mod external;
pub mod registry;

use serde_json::Value;
use thiserror::Error;

use crate::document::Document;

pub use external::{ExternalPlugin, PluginLoadError};
pub use registry::{resolve_plugins, PluginDefinition, PluginRegistry, ResolvedPlugin};

/// Parameter map of a plugin: option name to JSON value.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid value for param `{name}`: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("missing param `{0}`")]
    MissingParam(String),

    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        PluginError::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A transformation pass.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Declared parameters and their defaults. `None` means the plugin takes
    /// no parameters.
    fn default_params(&self) -> Option<Params> {
        None
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError>;
}

pub fn bool_param(params: &Params, name: &str, default: bool) -> Result<bool, PluginError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(PluginError::invalid(name, format!("expected boolean, got {other}"))),
    }
}

pub fn usize_param(params: &Params, name: &str, default: usize) -> Result<usize, PluginError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                PluginError::invalid(name, format!("expected non-negative integer, got {n}"))
            }),
        Some(other) => Err(PluginError::invalid(name, format!("expected integer, got {other}"))),
    }
}

pub fn str_param<'a>(
    params: &'a Params,
    name: &str,
    default: &'a str,
) -> Result<&'a str, PluginError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(PluginError::invalid(name, format!("expected string, got {other}"))),
    }
}

/// A list of strings; a single string is accepted as a one-element list.
pub fn str_list_param(params: &Params, name: &str) -> Result<Vec<String>, PluginError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(PluginError::invalid(
                    name,
                    format!("expected string item, got {other}"),
                )),
            })
            .collect(),
        Some(other) => Err(PluginError::invalid(name, format!("expected list, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_param_defaults_and_types() {
        let p = params(json!({"minify": false, "floatPrecision": 2, "prefix": "a-"}));
        assert!(!bool_param(&p, "minify", true).unwrap());
        assert!(bool_param(&p, "remove", true).unwrap());
        assert_eq!(usize_param(&p, "floatPrecision", 3).unwrap(), 2);
        assert_eq!(str_param(&p, "prefix", "").unwrap(), "a-");
        assert!(bool_param(&p, "prefix", false).is_err());
    }

    #[test]
    fn test_str_list_param() {
        let p = params(json!({"one": "fill", "many": ["fill", "stroke"], "bad": [1]}));
        assert_eq!(str_list_param(&p, "one").unwrap(), vec!["fill"]);
        assert_eq!(str_list_param(&p, "many").unwrap().len(), 2);
        assert!(str_list_param(&p, "missing").unwrap().is_empty());
        assert!(str_list_param(&p, "bad").is_err());
    }
}
