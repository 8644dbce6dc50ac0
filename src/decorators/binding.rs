//! Binding call arguments to a declared parameter list.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::task::Context;

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// Ordered parameter list of a wrapped function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.push(name.into(), None);
        self
    }

    /// Add a parameter with a default value.
    pub fn param_with_default(mut self, name: impl Into<String>, default: Value) -> Self {
        self.push(name.into(), Some(default));
        self
    }

    fn push(&mut self, name: String, default: Option<Value>) {
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.default = default,
            None => self.params.push(Param { name, default }),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Bind `args` and apply defaults. The resulting context holds exactly
    /// the declared parameters.
    pub fn bind(&self, args: CallArgs) -> Result<Context> {
        let CallArgs {
            positional,
            mut keyword,
        } = args;

        if positional.len() > self.params.len() {
            return Err(FlowError::binding(format!(
                "too many positional arguments: expected at most {}, got {}",
                self.params.len(),
                positional.len()
            )));
        }

        if let Some(unknown) = keyword
            .keys()
            .find(|k| !self.params.iter().any(|p| &p.name == *k))
        {
            return Err(FlowError::binding(format!(
                "got an unexpected keyword argument '{}'",
                unknown
            )));
        }

        let mut bound = Context::new();
        let mut positional = positional.into_iter();
        for param in &self.params {
            let value = match positional.next() {
                Some(value) => {
                    if keyword.contains_key(&param.name) {
                        return Err(FlowError::binding(format!(
                            "multiple values for argument '{}'",
                            param.name
                        )));
                    }
                    value
                }
                None => match keyword.remove(&param.name).or_else(|| param.default.clone()) {
                    Some(value) => value,
                    None => {
                        return Err(FlowError::binding(format!(
                            "missing a required argument: '{}'",
                            param.name
                        )))
                    }
                },
            };
            bound.insert(param.name.clone(), value);
        }

        Ok(bound)
    }
}

/// Arguments of one call: positional values then keyword values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }
}

impl From<Vec<Value>> for CallArgs {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keyword: BTreeMap::new(),
        }
    }
}

impl From<()> for CallArgs {
    fn from(_: ()) -> Self {
        Self::default()
    }
}
