//! Completion tools - let an agent mark a task successful or failed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolRef};
use crate::task::Task;

/// The pair of completion tools for `task`.
pub fn completion_tools(task: &Task) -> Vec<ToolRef> {
    vec![
        Arc::new(MarkTaskSuccessful::new(task.clone())),
        Arc::new(MarkTaskFailed::new(task.clone())),
    ]
}

/// Tool that records a task's result.
pub struct MarkTaskSuccessful {
    task: Task,
    name: String,
    description: String,
}

impl MarkTaskSuccessful {
    pub fn new(task: Task) -> Self {
        let name = format!("mark_task_{}_successful", task.id().short());
        let description = format!(
            "Mark task {} (\"{}\") as successful and provide its result.",
            task.id().short(),
            task.objective()
        );
        Self {
            task,
            name,
            description,
        }
    }
}

#[async_trait]
impl Tool for MarkTaskSuccessful {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let result_schema = self
            .task
            .result_type()
            .map(|t| t.json_schema())
            .unwrap_or_else(|| json!({}));
        json!({
            "type": "object",
            "properties": {
                "result": result_schema
            },
            "required": ["result"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let raw = match args {
            Value::Object(mut map) => map.remove("result").unwrap_or(Value::Null),
            other => other,
        };

        let result = match self.task.result_type() {
            Some(result_type) => result_type.coerce(raw)?,
            None => raw,
        };

        if !self.task.mark_successful(result) {
            return Err(anyhow::anyhow!(
                "Task {} is already {}",
                self.task.id().short(),
                self.task.status()
            ));
        }
        Ok(format!("Task {} marked successful.", self.task.id().short()))
    }
}

#[derive(Debug, Deserialize)]
struct MarkFailedArgs {
    reason: String,
}

/// Tool that records why a task could not be completed.
pub struct MarkTaskFailed {
    task: Task,
    name: String,
    description: String,
}

impl MarkTaskFailed {
    pub fn new(task: Task) -> Self {
        let name = format!("mark_task_{}_failed", task.id().short());
        let description = format!(
            "Mark task {} (\"{}\") as failed. Only use this when the task cannot be completed.",
            task.id().short(),
            task.objective()
        );
        Self {
            task,
            name,
            description,
        }
    }
}

#[async_trait]
impl Tool for MarkTaskFailed {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the task could not be completed."
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let args: MarkFailedArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;

        if !self.task.mark_failed(args.reason) {
            return Err(anyhow::anyhow!(
                "Task {} is already {}",
                self.task.id().short(),
                self.task.status()
            ));
        }
        Ok(format!("Task {} marked failed.", self.task.id().short()))
    }
}
