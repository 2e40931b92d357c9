//! Environment-variable resolution with pipe-filter expressions
//!
//! An expression is `filter1:filter2:VARNAME`; the base variable name is the
//! substring after the final separator, and filters apply innermost first
//! (the one written closest to the variable name). `not:bool:TEST_ENV` with
//! `TEST_ENV=true` therefore parses the boolean, then negates it.

use std::sync::Arc;

use serde_json::Value;

use crate::contract::SettingsError;

/// Source of raw variable values; `None` means the variable is absent
pub type EnvSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Extract the base variable name from a pipe-filter expression
pub fn base_name(expression: &str) -> &str {
    expression
        .rfind(':')
        .map_or(expression, |i| &expression[i + 1..])
}

#[derive(Clone)]
pub struct EnvVarResolver {
    source: EnvSource,
}

impl EnvVarResolver {
    /// Resolver backed by the process environment
    pub fn new() -> Self {
        Self {
            source: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Resolver backed by an arbitrary source, for tests and embedding
    pub fn with_source(source: EnvSource) -> Self {
        Self { source }
    }

    /// Raw value of the expression's base variable, unfiltered
    pub fn raw(&self, expression: &str) -> Option<String> {
        (self.source)(base_name(expression))
    }

    /// Presence probe. Missing env vars are an expected condition, so this
    /// is a boolean rather than an error path.
    pub fn has_value(&self, expression: &str) -> bool {
        self.raw(expression).is_some()
    }

    /// Resolve the expression, applying every filter
    pub fn resolve(&self, expression: &str) -> Result<Value, SettingsError> {
        let err = |details: String| SettingsError::Env {
            expression: expression.to_owned(),
            details,
        };

        let mut parts: Vec<&str> = expression.split(':').collect();
        let var = parts.pop().unwrap_or(expression);
        let raw = (self.source)(var)
            .ok_or_else(|| err(format!("variable '{var}' is not set")))?;

        let mut value = Value::String(raw);
        for filter in parts.iter().rev() {
            value = apply_filter(filter, value, expression)?;
        }
        Ok(value)
    }
}

impl Default for EnvVarResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_filter(filter: &str, value: Value, expression: &str) -> Result<Value, SettingsError> {
    let err = |details: String| SettingsError::Env {
        expression: expression.to_owned(),
        details,
    };

    match filter {
        "string" => match value {
            Value::String(_) => Ok(value),
            other => Ok(Value::String(other.to_string())),
        },
        "trim" => match value {
            Value::String(s) => Ok(Value::String(s.trim().to_owned())),
            other => Err(err(format!("'trim' expects a string, got {other}"))),
        },
        "bool" => match value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                other => Err(err(format!("'{other}' is not a boolean"))),
            },
            other => Err(err(format!("'bool' expects a string, got {other}"))),
        },
        "int" => match value {
            Value::Number(ref n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| err(format!("'{s}' is not an integer"))),
            other => Err(err(format!("'int' expects a string, got {other}"))),
        },
        "float" => match value {
            Value::Number(_) => Ok(value),
            Value::String(s) => {
                let parsed: f64 = s
                    .trim()
                    .parse()
                    .map_err(|_| err(format!("'{s}' is not a number")))?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| err(format!("'{s}' is not a finite number")))
            }
            other => Err(err(format!("'float' expects a string, got {other}"))),
        },
        "not" => match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(err(format!("'not' expects a boolean, got {other}"))),
        },
        other => Err(err(format!("unknown filter '{other}'"))),
    }
}
