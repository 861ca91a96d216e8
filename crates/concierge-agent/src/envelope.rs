//! Message envelopes exchanged between the router and specialists.
//!
//! Every specialist invocation is a pair of envelopes: an outbound `request`
//! or `query` from the router, and an inbound `response` or `escalation`
//! addressed back to it. Both carry the correlation id of the end-user
//! request they belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::types::{MessageKind, Payload, SpecialistId};

/// Identifier shared by every envelope of one end-user request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id, e.g. one received over the wire.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One structured message between the router and a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique envelope id
    pub id: String,
    /// Correlation id of the end-user request
    pub correlation_id: CorrelationId,
    /// Originator
    pub sender: SpecialistId,
    /// Addressee
    pub recipient: SpecialistId,
    /// Message kind
    pub kind: MessageKind,
    /// Task being invoked or answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Task payload or result
    #[serde(default)]
    pub content: Payload,
    /// Id of the envelope this one answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope sent by the router to a specialist.
    ///
    /// Only `query` and `request` kinds may originate at the router.
    pub fn outbound(
        correlation_id: &CorrelationId,
        recipient: &SpecialistId,
        kind: MessageKind,
        task: impl Into<String>,
        content: Payload,
    ) -> DispatchResult<Self> {
        if !kind.is_outbound() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "router cannot originate a {kind} envelope"
            )));
        }
        if recipient.is_router() {
            return Err(DispatchError::InvalidEnvelope(
                "router cannot address itself".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.clone(),
            sender: SpecialistId::router(),
            recipient: recipient.clone(),
            kind,
            task: Some(task.into()),
            content,
            in_reply_to: None,
            timestamp: Utc::now(),
        })
    }

    /// Create the reply to `request`, sent by its recipient.
    pub fn reply_to(
        request: &Envelope,
        kind: MessageKind,
        content: Payload,
    ) -> DispatchResult<Self> {
        if !kind.is_inbound() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "a {kind} envelope cannot answer a request"
            )));
        }
        if !request.kind.is_outbound() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "cannot reply to a {} envelope",
                request.kind
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            correlation_id: request.correlation_id.clone(),
            sender: request.recipient.clone(),
            recipient: request.sender.clone(),
            kind,
            task: request.task.clone(),
            content,
            in_reply_to: Some(request.id.clone()),
            timestamp: Utc::now(),
        })
    }

    /// Reply to `request` carrying a task result.
    ///
    /// A capability probe answered with `can_handle: false` is recorded as an
    /// escalation; everything else is a plain response.
    pub fn answer(request: &Envelope, content: Payload) -> DispatchResult<Self> {
        let declined = request.kind == MessageKind::Query
            && content.get("can_handle").and_then(|v| v.as_bool()) == Some(false);
        let kind = if declined {
            MessageKind::Escalation
        } else {
            MessageKind::Response
        };
        Self::reply_to(request, kind, content)
    }

    /// Check that `self` is a valid answer to `request`.
    ///
    /// Replies must come from the addressed recipient, go back to the
    /// sender, and keep the correlation id.
    pub fn validate_reply(&self, request: &Envelope) -> DispatchResult<()> {
        if !self.kind.is_inbound() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "{} is not a reply kind",
                self.kind
            )));
        }
        if self.sender != request.recipient {
            return Err(DispatchError::InvalidEnvelope(format!(
                "reply sent by {} but request was addressed to {}",
                self.sender, request.recipient
            )));
        }
        if self.recipient != request.sender {
            return Err(DispatchError::InvalidEnvelope(format!(
                "reply addressed to {} instead of {}",
                self.recipient, request.sender
            )));
        }
        if self.correlation_id != request.correlation_id {
            return Err(DispatchError::InvalidEnvelope(
                "reply carries a different correlation id".to_string(),
            ));
        }
        if self
            .in_reply_to
            .as_ref()
            .is_some_and(|id| *id != request.id)
        {
            return Err(DispatchError::InvalidEnvelope(
                "reply answers a different envelope".to_string(),
            ));
        }
        Ok(())
    }

    /// Task name, or an empty string for bookkeeping envelopes.
    pub fn task_name(&self) -> &str {
        self.task.as_deref().unwrap_or_default()
    }
}
