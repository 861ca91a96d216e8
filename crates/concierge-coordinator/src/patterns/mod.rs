//! Coordination patterns
//!
//! Each pattern is a small state machine driven to one of two terminal
//! states. `Done` carries the synthesized answer; `Failed` carries the call
//! that exhausted its budget and a degraded answer built from it.
//!
//! ```text
//! Task Allocation  Start → ResolveSpecialist → Invoke → Synthesize → Done
//! Negotiation      Start → ProbeCapability → CanHandle → InvokeDirect → Synthesize → Done
//!                                          ↘ CannotHandle → GatherContext
//!                                            → InvokeWithContext → Synthesize → Done
//! Multi-Step       Start → InvokeFirst → ExtractKeys → InvokeSecond → Merge
//!                  → Synthesize → Done
//! ```

pub mod multi_step;
pub mod negotiation;
pub mod task_allocation;

use concierge_agent::{CoordinationTrail, MessageKind, Payload, SpecialistId};
use serde_json::Value;

use crate::classifier::{Classification, Pattern};
use crate::dispatch::{CallFailure, Dispatcher};
use crate::synthesis::{Synthesis, synthesize_failure};

/// How a pattern ended.
#[derive(Debug)]
pub enum Conclusion {
    Done(Synthesis),
    Failed {
        failure: CallFailure,
        synthesis: Synthesis,
    },
}

/// Execution context of one pattern run.
pub(crate) struct Run<'a> {
    dispatcher: &'a Dispatcher,
    trail: &'a mut CoordinationTrail,
    classification: &'a Classification,
    completed: Vec<String>,
}

impl<'a> Run<'a> {
    fn new(
        dispatcher: &'a Dispatcher,
        trail: &'a mut CoordinationTrail,
        classification: &'a Classification,
    ) -> Self {
        Self {
            dispatcher,
            trail,
            classification,
            completed: Vec::new(),
        }
    }

    /// Resolve and invoke `task`, returning the reply payload.
    async fn call(
        &mut self,
        kind: MessageKind,
        task: &str,
        content: Payload,
    ) -> Result<Payload, CallFailure> {
        let reply = self
            .dispatcher
            .invoke(&mut *self.trail, kind, task, content)
            .await?;
        self.completed.push(task.to_string());
        Ok(reply.content)
    }

    /// Invoke `task` on a specialist resolved earlier.
    async fn call_on(
        &mut self,
        specialist: &SpecialistId,
        kind: MessageKind,
        task: &str,
        content: Payload,
    ) -> Result<Payload, CallFailure> {
        let reply = self
            .dispatcher
            .invoke_on(&mut *self.trail, specialist, kind, task, content)
            .await?;
        self.completed.push(task.to_string());
        Ok(reply.content)
    }

    fn fail(&self, failure: CallFailure) -> Conclusion {
        let synthesis = synthesize_failure(&failure, &self.completed);
        Conclusion::Failed { failure, synthesis }
    }
}

/// Drive the pattern selected by `classification` to a terminal state.
pub async fn execute(
    dispatcher: &Dispatcher,
    trail: &mut CoordinationTrail,
    classification: &Classification,
) -> Conclusion {
    let run = Run::new(dispatcher, trail, classification);
    match classification.pattern() {
        Pattern::TaskAllocation => task_allocation::run(run).await,
        Pattern::Negotiation => negotiation::run(run).await,
        Pattern::MultiStep => multi_step::run(run).await,
    }
}

/// Array field of a reply, empty when absent.
pub(crate) fn list_field(payload: &Payload, key: &str) -> Vec<Value> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Object field of a reply, `None` when absent or null.
pub(crate) fn record_field(payload: &Payload, key: &str) -> Option<Value> {
    payload.get(key).filter(|v| v.is_object()).cloned()
}
