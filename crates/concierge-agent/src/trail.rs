//! Append-only record of the envelopes exchanged for one end-user request.

use serde::{Deserialize, Serialize};

use crate::envelope::{CorrelationId, Envelope};
use crate::error::{DispatchError, DispatchResult};

/// Ordered log of every envelope sent or received during one coordination pass.
///
/// The trail is owned by a single request; envelopes can be appended but never
/// modified or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationTrail {
    correlation_id: CorrelationId,
    envelopes: Vec<Envelope>,
}

impl CoordinationTrail {
    /// Create an empty trail for the given request.
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            envelopes: Vec::new(),
        }
    }

    /// Correlation id every envelope in this trail carries.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Append one envelope.
    pub fn record(&mut self, envelope: Envelope) -> DispatchResult<()> {
        if envelope.correlation_id != self.correlation_id {
            return Err(DispatchError::InvalidEnvelope(format!(
                "envelope {} belongs to request {}, not {}",
                envelope.id, envelope.correlation_id, self.correlation_id
            )));
        }
        self.envelopes.push(envelope);
        Ok(())
    }

    /// Append a request and its reply as one contiguous pair.
    pub fn record_exchange(&mut self, request: Envelope, reply: Envelope) -> DispatchResult<()> {
        reply.validate_reply(&request)?;
        self.record(request)?;
        self.record(reply)
    }

    /// Number of envelopes recorded so far.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Iterate envelopes in the order they were appended.
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter()
    }

    /// Borrow all envelopes.
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Consume the trail, yielding its envelopes.
    pub fn into_envelopes(self) -> Vec<Envelope> {
        self.envelopes
    }

    /// Verify that outbound and inbound envelopes strictly alternate.
    ///
    /// Each inbound envelope must answer the outbound envelope directly
    /// before it. Bookkeeping envelopes are not part of the alternation.
    pub fn check_alternation(&self) -> DispatchResult<()> {
        let mut pending: Option<&Envelope> = None;
        for envelope in self.envelopes.iter() {
            if envelope.kind.is_outbound() {
                if let Some(open) = pending {
                    return Err(DispatchError::InvalidEnvelope(format!(
                        "request {} was never answered before {}",
                        open.id, envelope.id
                    )));
                }
                pending = Some(envelope);
            } else if envelope.kind.is_inbound() {
                let Some(open) = pending.take() else {
                    return Err(DispatchError::InvalidEnvelope(format!(
                        "reply {} has no preceding request",
                        envelope.id
                    )));
                };
                envelope.validate_reply(open)?;
            }
        }
        match pending {
            Some(open) => Err(DispatchError::InvalidEnvelope(format!(
                "request {} has no reply",
                open.id
            ))),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a CoordinationTrail {
    type Item = &'a Envelope;
    type IntoIter = std::slice::Iter<'a, Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.iter()
    }
}
