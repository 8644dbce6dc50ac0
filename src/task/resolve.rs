use std::collections::BTreeMap;

use serde_json::Value;

use super::{Task, TaskStatus};
use crate::error::{FlowError, Result};

/// Value returned by a flow body. May embed task handles, which are replaced
/// by their results when the flow resolves its output.
#[derive(Debug, Clone)]
pub enum FlowValue {
    Value(Value),
    Task(Task),
    List(Vec<FlowValue>),
    Map(BTreeMap<String, FlowValue>),
}

impl FlowValue {
    /// The plain JSON value, if this holds no task handles.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Task(_) => None,
            Self::List(items) => items
                .into_iter()
                .map(FlowValue::into_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| v.into_value().map(|v| (k, v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
        }
    }
}

impl From<Value> for FlowValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Task> for FlowValue {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<&Task> for FlowValue {
    fn from(task: &Task) -> Self {
        Self::Task(task.clone())
    }
}

impl<T: Into<FlowValue>> From<Vec<T>> for FlowValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Replace every task in `value` by its result. Fails on the first task that
/// is not successful.
pub fn resolve_tasks(value: FlowValue) -> Result<Value> {
    match value {
        FlowValue::Value(v) => Ok(v),
        FlowValue::Task(task) => match task.status() {
            TaskStatus::Successful => Ok(task.result().unwrap_or(Value::Null)),
            status => Err(FlowError::TaskResolution {
                objective: task.objective().to_string(),
                status,
            }),
        },
        FlowValue::List(items) => items
            .into_iter()
            .map(resolve_tasks)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        FlowValue::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| resolve_tasks(v).map(|v| (k, v)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_nested_tasks() {
        let a = Task::new("a");
        let b = Task::new("b");
        a.mark_successful(json!(1));
        b.mark_successful(json!("two"));

        let value = FlowValue::Map(BTreeMap::from([
            ("first".to_string(), FlowValue::from(&a)),
            (
                "rest".to_string(),
                FlowValue::List(vec![FlowValue::from(b), FlowValue::from(json!(3))]),
            ),
        ]));

        assert_eq!(
            resolve_tasks(value).unwrap(),
            json!({"first": 1, "rest": ["two", 3]})
        );
    }

    #[test]
    fn test_unsuccessful_task_fails_resolution() {
        let pending = Task::new("still thinking");
        let err = resolve_tasks(FlowValue::from(vec![pending])).unwrap_err();
        assert!(matches!(
            err,
            FlowError::TaskResolution { status: TaskStatus::Pending, .. }
        ));
    }

    #[test]
    fn test_into_value_rejects_tasks() {
        assert_eq!(FlowValue::from(json!([1])).into_value(), Some(json!([1])));
        assert!(FlowValue::from(Task::new("t")).into_value().is_none());
    }
}
