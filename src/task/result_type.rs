//! Declared result types and coercion of agent output into them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FlowError, Result};

/// Shape of the value a task is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    String,
    Integer,
    Number,
    Boolean,
    /// Any JSON value, passed through untouched
    Json,
    List(Box<ResultType>),
}

impl ResultType {
    pub fn list_of(item: ResultType) -> Self {
        Self::List(Box::new(item))
    }

    /// JSON schema describing a valid result.
    pub fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Json => json!({}),
            Self::List(item) => json!({"type": "array", "items": item.json_schema()}),
        }
    }

    /// Coerce `value` into this type.
    ///
    /// Strings holding a number, boolean or JSON array are parsed; integral
    /// floats become integers; scalars and structures render to strings.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        let fail = |value: &Value| FlowError::Cast {
            value: truncate(&value.to_string()),
            target: self.to_string(),
        };

        match self {
            Self::Json => Ok(value),
            Self::String => match value {
                Value::String(_) => Ok(value),
                Value::Null => Err(fail(&value)),
                other => Ok(Value::String(other.to_string())),
            },
            Self::Integer => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(json!(f as i64))
                    }
                    _ => Err(fail(&value)),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| json!(i))
                    .map_err(|_| fail(&value)),
                _ => Err(fail(&value)),
            },
            Self::Number => match &value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail(&value)),
                _ => Err(fail(&value)),
            },
            Self::Boolean => match &value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "yes" => Ok(Value::Bool(true)),
                    "false" | "no" => Ok(Value::Bool(false)),
                    _ => Err(fail(&value)),
                },
                _ => Err(fail(&value)),
            },
            Self::List(item) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|v| item.coerce(v))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                Value::String(ref s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Array(_)) => self.coerce(parsed),
                    _ => Err(fail(&value)),
                },
                other => Err(fail(&other)),
            },
        }
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 80;
    if s.chars().count() > MAX {
        format!("{}...", s.chars().take(MAX).collect::<String>())
    } else {
        s.to_string()
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Json => write!(f, "json"),
            Self::List(item) => write!(f, "list[{}]", item),
        }
    }
}
