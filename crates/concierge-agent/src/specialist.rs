//! Specialist trait and task argument helpers.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::backend::ToolBackend;
use crate::error::{DispatchError, DispatchResult};
use crate::registry::RegistryEntry;
use crate::specialists::{CustomerDataSpecialist, SupportSpecialist};
use crate::types::{Payload, SpecialistId, SpecialistKind};

/// A backend able to perform a fixed set of named tasks.
///
/// Implementations are selected by [`SpecialistKind`]; dispatch inside a
/// specialist is a lookup on the task name.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Registry id this instance serves under.
    fn id(&self) -> &SpecialistId;

    /// Implementation kind.
    fn kind(&self) -> SpecialistKind;

    /// Perform `task` with the given input.
    ///
    /// Fails with `TaskRejected` for tasks the kind does not implement or
    /// malformed input, and with `SpecialistError` for application failures.
    async fn handle(&self, task: &str, input: &Payload) -> DispatchResult<Payload>;
}

/// Instantiate the in-process specialist for a registry entry.
pub fn build_specialist(
    entry: &RegistryEntry,
    backend: Arc<dyn ToolBackend>,
) -> Arc<dyn Specialist> {
    match entry.kind {
        SpecialistKind::CustomerData => {
            Arc::new(CustomerDataSpecialist::new(entry.id.clone(), backend))
        }
        SpecialistKind::Support => Arc::new(SupportSpecialist::new(entry.id.clone(), backend)),
    }
}

/// Typed access to a task payload.
///
/// Missing or ill-typed arguments are reported as `TaskRejected` against the
/// specialist and task being served.
pub struct TaskInput<'a> {
    specialist: &'a SpecialistId,
    task: &'a str,
    payload: &'a Payload,
}

impl<'a> TaskInput<'a> {
    pub fn new(specialist: &'a SpecialistId, task: &'a str, payload: &'a Payload) -> Self {
        Self {
            specialist,
            task,
            payload,
        }
    }

    /// Rejection for this task.
    pub fn reject(&self, reason: impl Into<String>) -> DispatchError {
        DispatchError::rejected(self.specialist, self.task, reason)
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.payload.get(field).filter(|v| !v.is_null())
    }

    /// Required integer; numeric strings are accepted.
    pub fn int(&self, field: &str) -> DispatchResult<i64> {
        self.opt_int(field)?
            .ok_or_else(|| self.reject(format!("missing required field '{field}'")))
    }

    /// Optional integer.
    pub fn opt_int(&self, field: &str) -> DispatchResult<Option<i64>> {
        match self.present(field) {
            None => Ok(None),
            Some(value) => as_int(value)
                .map(Some)
                .ok_or_else(|| self.reject(format!("field '{field}' must be an integer"))),
        }
    }

    /// Required string.
    pub fn str(&self, field: &str) -> DispatchResult<&'a str> {
        self.opt_str(field)?
            .ok_or_else(|| self.reject(format!("missing required field '{field}'")))
    }

    /// Optional string.
    pub fn opt_str(&self, field: &str) -> DispatchResult<Option<&'a str>> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.reject(format!("field '{field}' must be a string"))),
        }
    }

    /// Optional list of integers.
    pub fn opt_int_list(&self, field: &str) -> DispatchResult<Option<Vec<i64>>> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    as_int(item).ok_or_else(|| {
                        self.reject(format!("field '{field}' must contain integers"))
                    })
                })
                .collect::<DispatchResult<Vec<_>>>()
                .map(Some),
            Some(_) => Err(self.reject(format!("field '{field}' must be a list"))),
        }
    }

    /// Required list of integers.
    pub fn int_list(&self, field: &str) -> DispatchResult<Vec<i64>> {
        self.opt_int_list(field)?
            .ok_or_else(|| self.reject(format!("missing required field '{field}'")))
    }

    /// Required JSON object.
    pub fn object(&self, field: &str) -> DispatchResult<&'a Payload> {
        match self.present(field) {
            None => Err(self.reject(format!("missing required field '{field}'"))),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(self.reject(format!("field '{field}' must be an object"))),
        }
    }

    /// Optional JSON object.
    pub fn opt_object(&self, field: &str) -> DispatchResult<Option<&'a Payload>> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(self.reject(format!("field '{field}' must be an object"))),
        }
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payload;
    use serde_json::json;

    #[test]
    fn test_task_input_int() {
        let id = SpecialistId::new("customer_data");
        let p = payload(json!({"customer_id": 5, "other": "12", "bad": true}));
        let input = TaskInput::new(&id, "get_customer", &p);

        assert_eq!(input.int("customer_id").unwrap(), 5);
        assert_eq!(input.int("other").unwrap(), 12);
        assert!(matches!(
            input.int("bad"),
            Err(DispatchError::TaskRejected { .. })
        ));
        assert!(matches!(
            input.int("missing"),
            Err(DispatchError::TaskRejected { .. })
        ));
    }

    #[test]
    fn test_task_input_lists_and_objects() {
        let id = SpecialistId::new("support");
        let p = payload(json!({"ids": [1, 2, "3"], "data": {"email": "a@b.c"}, "nil": null}));
        let input = TaskInput::new(&id, "t", &p);

        assert_eq!(input.int_list("ids").unwrap(), vec![1, 2, 3]);
        assert!(input.object("data").unwrap().contains_key("email"));
        assert!(input.opt_object("nil").unwrap().is_none());
        assert!(input.object("ids").is_err());
    }
}
