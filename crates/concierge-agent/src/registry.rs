//! Capability Registry
//!
//! Static directory of specialists: which specialist serves each task, what
//! capabilities it declares and where it can be reached. The registry is built
//! once at startup and shared read-only by every request afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge_agent::{CapabilityRegistry, RegistryEntry, SpecialistKind, TaskDescriptor};
//!
//! let registry = CapabilityRegistry::new(vec![
//!     RegistryEntry::new("customer_data", "Customer Data Agent", SpecialistKind::CustomerData)
//!         .with_capability("data_retrieval")
//!         .with_task(TaskDescriptor::new("get_customer").with_inputs(&["customer_id"])),
//! ])?;
//!
//! let specialist = registry.resolve("get_customer")?;
//! let card = registry.describe(specialist)?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{DispatchError, DispatchResult};
use crate::types::{SpecialistId, SpecialistKind, TaskDescriptor};

// ============================================================================
// Registry Entry
// ============================================================================

/// One specialist as published on the discovery surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Stable specialist id
    pub id: SpecialistId,
    /// Human-readable name
    pub name: String,
    /// Description of the specialist
    #[serde(default)]
    pub description: String,
    /// Implementation backing this specialist
    pub kind: SpecialistKind,
    /// Capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Tasks offered, in declaration order
    #[serde(default)]
    pub tasks: Vec<TaskDescriptor>,
    /// Network endpoint; empty for in-process specialists
    #[serde(default)]
    pub endpoint: String,
}

impl RegistryEntry {
    /// Create an entry with no capabilities or tasks.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: SpecialistKind) -> Self {
        Self {
            id: SpecialistId::new(id),
            name: name.into(),
            description: String::new(),
            kind,
            capabilities: Vec::new(),
            tasks: Vec::new(),
            endpoint: String::new(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a capability tag.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Add a task.
    pub fn with_task(mut self, task: TaskDescriptor) -> Self {
        self.tasks.push(task);
        self
    }

    /// Set endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Whether the entry declares `task`.
    pub fn declares(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t.name == task)
    }

    /// Whether the entry carries the capability tag.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Descriptor of a declared task.
    pub fn task(&self, task: &str) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.name == task)
    }

    /// Declared tasks the backing implementation does not actually serve.
    pub fn unimplemented_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| !self.kind.implements(name))
            .collect()
    }
}

// ============================================================================
// Capability Registry
// ============================================================================

/// Immutable task and specialist directory.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: Vec<RegistryEntry>,
    by_id: HashMap<SpecialistId, usize>,
    by_task: HashMap<String, SpecialistId>,
}

impl CapabilityRegistry {
    /// Build a registry, validating that ids and task names are unique.
    pub fn new(entries: Vec<RegistryEntry>) -> DispatchResult<Self> {
        let mut by_id = HashMap::new();
        let mut by_task: HashMap<String, SpecialistId> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.id.as_str().trim().is_empty() {
                return Err(DispatchError::InvalidRegistry(
                    "specialist id cannot be empty".to_string(),
                ));
            }
            if entry.id.is_router() {
                return Err(DispatchError::InvalidRegistry(format!(
                    "'{}' is reserved for the coordinator",
                    SpecialistId::ROUTER
                )));
            }
            if by_id.insert(entry.id.clone(), index).is_some() {
                return Err(DispatchError::InvalidRegistry(format!(
                    "duplicate specialist id '{}'",
                    entry.id
                )));
            }
            for task in &entry.tasks {
                if task.name.trim().is_empty() {
                    return Err(DispatchError::InvalidRegistry(format!(
                        "specialist '{}' declares a task with an empty name",
                        entry.id
                    )));
                }
                if let Some(owner) = by_task.get(&task.name) {
                    return Err(DispatchError::InvalidRegistry(format!(
                        "task '{}' is declared by both '{}' and '{}'",
                        task.name, owner, entry.id
                    )));
                }
                by_task.insert(task.name.clone(), entry.id.clone());
            }
        }

        debug!(
            specialists = entries.len(),
            tasks = by_task.len(),
            "Capability registry built"
        );

        Ok(Self {
            entries,
            by_id,
            by_task,
        })
    }

    /// Registry with the two built-in specialists.
    pub fn builtin() -> Self {
        let entries = builtin_entries();
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let by_task = entries
            .iter()
            .flat_map(|e| e.tasks.iter().map(|t| (t.name.clone(), e.id.clone())))
            .collect();
        Self {
            entries,
            by_id,
            by_task,
        }
    }

    /// Specialist serving `task`.
    pub fn resolve(&self, task: &str) -> DispatchResult<&SpecialistId> {
        self.by_task
            .get(task)
            .ok_or_else(|| DispatchError::unknown_task(task))
    }

    /// Registry entry of a specialist.
    pub fn describe(&self, specialist: &SpecialistId) -> DispatchResult<&RegistryEntry> {
        self.by_id
            .get(specialist)
            .map(|&index| &self.entries[index])
            .ok_or_else(|| DispatchError::unknown_specialist(specialist.as_str()))
    }

    /// All entries in declaration order.
    pub fn list(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Entries carrying a capability tag.
    pub fn find_by_capability(&self, capability: &str) -> Vec<&RegistryEntry> {
        self.entries
            .iter()
            .filter(|e| e.has_capability(capability))
            .collect()
    }

    /// Whether the id is registered.
    pub fn contains(&self, specialist: &SpecialistId) -> bool {
        self.by_id.contains_key(specialist)
    }

    /// Number of registered specialists.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no specialist is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that both parties of an envelope are known.
    pub fn check_envelope(&self, envelope: &Envelope) -> DispatchResult<()> {
        for party in [&envelope.sender, &envelope.recipient] {
            if !party.is_router() && !self.contains(party) {
                return Err(DispatchError::unknown_specialist(party.as_str()));
            }
        }
        Ok(())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Discovery cards of the built-in specialists.
pub fn builtin_entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            "customer_data",
            "Customer Data Agent",
            SpecialistKind::CustomerData,
        )
        .with_description("Specialist agent for customer data operations")
        .with_capability("data_retrieval")
        .with_capability("data_update")
        .with_endpoint("http://localhost:8001/specialists/customer_data")
        .with_task(
            TaskDescriptor::new("get_customer")
                .with_inputs(&["customer_id"])
                .with_outputs(&["customer"]),
        )
        .with_task(
            TaskDescriptor::new("list_customers")
                .with_inputs(&["status", "limit"])
                .with_outputs(&["customers", "count"]),
        )
        .with_task(
            TaskDescriptor::new("update_customer")
                .with_inputs(&["customer_id", "data"])
                .with_outputs(&["customer_id", "updated"]),
        )
        .with_task(
            TaskDescriptor::new("get_customer_history")
                .with_inputs(&["customer_id"])
                .with_outputs(&["history", "count"]),
        ),
        RegistryEntry::new("support", "Support Agent", SpecialistKind::Support)
            .with_description("Specialist agent for customer support operations")
            .with_capability("ticket_management")
            .with_capability("support_response")
            .with_endpoint("http://localhost:8002/specialists/support")
            .with_task(
                TaskDescriptor::new("check_can_handle")
                    .with_inputs(&["query"])
                    .with_outputs(&["can_handle", "reason"]),
            )
            .with_task(
                TaskDescriptor::new("handle_support")
                    .with_inputs(&["query", "customer_info"])
                    .with_outputs(&["response", "customer_tier", "actions"]),
            )
            .with_task(
                TaskDescriptor::new("create_ticket")
                    .with_inputs(&["customer_id", "issue", "priority"])
                    .with_outputs(&["ticket"]),
            )
            .with_task(
                TaskDescriptor::new("get_tickets_by_priority")
                    .with_inputs(&["priority", "customer_ids"])
                    .with_outputs(&["tickets", "count"]),
            )
            .with_task(
                TaskDescriptor::new("get_open_tickets_for_customers")
                    .with_inputs(&["customer_ids"])
                    .with_outputs(&["tickets", "count"]),
            ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::CorrelationId;
    use crate::types::{MessageKind, Payload};

    #[test]
    fn test_builtin_resolves_every_task() {
        let registry = CapabilityRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("get_customer").unwrap().as_str(), "customer_data");
        assert_eq!(registry.resolve("check_can_handle").unwrap().as_str(), "support");
        for entry in registry.list() {
            assert!(entry.unimplemented_tasks().is_empty());
        }
    }

    #[test]
    fn test_builtin_matches_validated_construction() {
        let validated = CapabilityRegistry::new(builtin_entries()).unwrap();
        assert_eq!(validated.list(), CapabilityRegistry::builtin().list());
    }

    #[test]
    fn test_unknown_task() {
        let registry = CapabilityRegistry::builtin();
        let err = registry.resolve("teleport").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTask { .. }));
    }

    #[test]
    fn test_unknown_specialist() {
        let registry = CapabilityRegistry::builtin();
        let err = registry.describe(&SpecialistId::new("ghost")).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownSpecialist { .. }));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let entries = vec![
            RegistryEntry::new("a", "A", SpecialistKind::Support)
                .with_task(TaskDescriptor::new("handle_support")),
            RegistryEntry::new("b", "B", SpecialistKind::Support)
                .with_task(TaskDescriptor::new("handle_support")),
        ];
        let err = CapabilityRegistry::new(entries).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRegistry(_)));
    }

    #[test]
    fn test_router_id_reserved() {
        let entries = vec![RegistryEntry::new("router", "Router", SpecialistKind::Support)];
        assert!(CapabilityRegistry::new(entries).is_err());
    }

    #[test]
    fn test_find_by_capability() {
        let registry = CapabilityRegistry::builtin();
        let found = registry.find_by_capability("data_update");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "customer_data");
        assert!(registry.find_by_capability("teleportation").is_empty());
    }

    #[test]
    fn test_check_envelope_parties() {
        let registry = CapabilityRegistry::builtin();
        let known = Envelope::outbound(
            &CorrelationId::generate(),
            &SpecialistId::new("support"),
            MessageKind::Query,
            "check_can_handle",
            Payload::new(),
        )
        .unwrap();
        assert!(registry.check_envelope(&known).is_ok());

        let mut stranger = known.clone();
        stranger.recipient = SpecialistId::new("ghost");
        assert!(registry.check_envelope(&stranger).is_err());
    }

    #[test]
    fn test_entry_card_format() {
        let registry = CapabilityRegistry::builtin();
        let card = serde_json::to_value(&registry.list()[0]).unwrap();
        assert_eq!(card["id"], "customer_data");
        assert!(card["capabilities"].is_array());
        assert_eq!(card["tasks"][0]["name"], "get_customer");
        assert_eq!(card["tasks"][0]["input_fields"][0], "customer_id");
    }
}
