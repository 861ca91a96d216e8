//! Scripted specialist proxies for tests.
//!
//! [`StubProxy`] answers each task according to a configured [`StubBehavior`]
//! and counts how often it was called, so callers can assert on retries and
//! on calls that must never happen.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::envelope::Envelope;
use crate::error::{DispatchError, DispatchResult};
use crate::proxy::{SpecialistProxy, Transport};
use crate::types::{Payload, SpecialistId};

/// How a stub answers one task.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Reply with this result
    Reply(Payload),
    /// Fail every attempt as unreachable
    Unavailable,
    /// Fail with an application error
    Error(String),
    /// Reject the task
    Reject(String),
    /// Never answer
    Hang,
    /// Be unreachable for the first `failures` attempts, then reply
    Flaky { failures: usize, reply: Payload },
}

/// Proxy with scripted per-task behavior.
pub struct StubProxy {
    id: SpecialistId,
    behaviors: HashMap<String, StubBehavior>,
    fallback: StubBehavior,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl StubProxy {
    /// Stub that replies with an empty result to every task.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: SpecialistId::new(id),
            behaviors: HashMap::new(),
            fallback: StubBehavior::Reply(Payload::new()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply to `task` with `result`.
    pub fn reply(self, task: impl Into<String>, result: serde_json::Value) -> Self {
        self.on(task, StubBehavior::Reply(crate::types::payload(result)))
    }

    /// Configure the behavior for `task`.
    pub fn on(mut self, task: impl Into<String>, behavior: StubBehavior) -> Self {
        self.behaviors.insert(task.into(), behavior);
        self
    }

    /// Behavior for tasks without an explicit one.
    pub fn otherwise(mut self, behavior: StubBehavior) -> Self {
        self.fallback = behavior;
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every task invoked, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of attempts made for `task`.
    pub fn attempts(&self, task: &str) -> usize {
        self.calls().iter().filter(|t| *t == task).count()
    }

    /// Total number of attempts.
    pub fn total_attempts(&self) -> usize {
        self.calls().len()
    }

    fn record_call(&self, task: &str) -> usize {
        match self.calls.lock() {
            Ok(mut calls) => {
                calls.push(task.to_string());
                calls.iter().filter(|t| *t == task).count()
            }
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl SpecialistProxy for StubProxy {
    fn specialist(&self) -> &SpecialistId {
        &self.id
    }

    fn transport(&self) -> Transport {
        Transport::Local
    }

    async fn invoke(&self, request: &Envelope) -> DispatchResult<Envelope> {
        let task = request.task_name();
        let attempt = self.record_call(task);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.behaviors.get(task).unwrap_or(&self.fallback);
        match behavior {
            StubBehavior::Reply(result) => Envelope::answer(request, result.clone()),
            StubBehavior::Unavailable => {
                Err(DispatchError::unavailable(&self.id, "stub is unreachable"))
            }
            StubBehavior::Error(message) => Err(DispatchError::specialist(&self.id, message)),
            StubBehavior::Reject(reason) => Err(DispatchError::rejected(&self.id, task, reason)),
            StubBehavior::Hang => std::future::pending().await,
            StubBehavior::Flaky { failures, reply } => {
                if attempt <= *failures {
                    Err(DispatchError::unavailable(&self.id, "stub is warming up"))
                } else {
                    Envelope::answer(request, reply.clone())
                }
            }
        }
    }
}
