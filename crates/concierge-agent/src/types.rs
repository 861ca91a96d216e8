//! Shared vocabulary for specialists and the messages exchanged with them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dynamic task payload: string keys to JSON values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Build a [`Payload`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty payload.
pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Stable identifier of a specialist, or of the router itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialistId(String);

impl SpecialistId {
    /// Identity used by the coordinator when it sends or receives envelopes.
    pub const ROUTER: &'static str = "router";

    /// Create a new identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The distinguished router identity.
    pub fn router() -> Self {
        Self(Self::ROUTER.to_string())
    }

    /// Whether this is the router identity.
    pub fn is_router(&self) -> bool {
        self.0 == Self::ROUTER
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecialistId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of a message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Capability probe from the router
    Query,
    /// Task invocation from the router
    Request,
    /// Result returned by the addressed specialist
    Response,
    /// Reply declining to handle a probe
    Escalation,
    /// Router-internal bookkeeping
    Coordination,
}

impl MessageKind {
    /// Kinds the router sends to a specialist.
    pub fn is_outbound(&self) -> bool {
        matches!(self, MessageKind::Query | MessageKind::Request)
    }

    /// Kinds a specialist sends back to the router.
    pub fn is_inbound(&self) -> bool {
        matches!(self, MessageKind::Response | MessageKind::Escalation)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Query => "query",
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Escalation => "escalation",
            MessageKind::Coordination => "coordination",
        };
        f.write_str(name)
    }
}

/// Closed set of specialist implementations known to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistKind {
    /// Reads and updates customer records
    CustomerData,
    /// Answers support questions and manages tickets
    Support,
}

impl SpecialistKind {
    /// Task names the implementation actually serves.
    pub fn tasks(&self) -> &'static [&'static str] {
        match self {
            SpecialistKind::CustomerData => &[
                "get_customer",
                "list_customers",
                "update_customer",
                "get_customer_history",
            ],
            SpecialistKind::Support => &[
                "check_can_handle",
                "handle_support",
                "create_ticket",
                "get_tickets_by_priority",
                "get_open_tickets_for_customers",
            ],
        }
    }

    /// Whether the implementation serves `task`.
    pub fn implements(&self, task: &str) -> bool {
        self.tasks().contains(&task)
    }
}

impl fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialistKind::CustomerData => f.write_str("customer_data"),
            SpecialistKind::Support => f.write_str("support"),
        }
    }
}

/// Declared shape of one task offered by a specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task name, unique across the registry
    pub name: String,
    /// Input argument names
    #[serde(default)]
    pub input_fields: Vec<String>,
    /// Result field names
    #[serde(default)]
    pub output_fields: Vec<String>,
}

impl TaskDescriptor {
    /// Create a descriptor with no declared fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_fields: Vec::new(),
            output_fields: Vec::new(),
        }
    }

    /// Declare input fields.
    pub fn with_inputs(mut self, fields: &[&str]) -> Self {
        self.input_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Declare output fields.
    pub fn with_outputs(mut self, fields: &[&str]) -> Self {
        self.output_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}
