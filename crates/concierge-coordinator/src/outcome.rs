//! Result of one coordination pass.

use concierge_agent::{CoordinationTrail, CorrelationId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classifier::{Pattern, Plan};
use crate::dispatch::CallFailure;

/// Terminal state a pattern reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// Which specialist call ended the pattern in `Failed`, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    /// Specialist the call was addressed to; absent when the task never resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,
    /// Task that failed
    pub task: String,
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

impl From<&CallFailure> for FailureDescriptor {
    fn from(failure: &CallFailure) -> Self {
        Self {
            specialist: failure.specialist.as_ref().map(|s| s.to_string()),
            task: failure.task.clone(),
            code: failure.error.error_code().to_string(),
            message: failure.error.to_string(),
            attempts: failure.attempts,
        }
    }
}

/// What a completed or degraded coordination pass hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationOutcome {
    pub correlation_id: CorrelationId,
    pub pattern: Pattern,
    pub plan: Plan,
    pub status: OutcomeStatus,
    /// Synthesized answer, never empty
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDescriptor>,
    pub trail: CoordinationTrail,
    /// Counters describing the results, e.g. `tickets_found`
    #[serde(default)]
    pub statistics: Map<String, Value>,
}

impl CoordinationOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}
