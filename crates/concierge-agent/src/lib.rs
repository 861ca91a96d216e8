//! # Concierge Agent - Specialists and Their Messages
//!
//! This crate holds everything the coordinator needs to talk to specialists:
//!
//! ## Features
//!
//! - **Capability Registry**: Immutable task → specialist directory, also the discovery surface
//! - **Message Envelope**: Correlated request/response units with origination rules
//! - **Coordination Trail**: Append-only per-request envelope log
//! - **Specialist Proxy**: One interface over in-process and HTTP specialists
//! - **Specialists**: The customer data and support implementations
//! - **Tool Backend**: Record and ticket operations, in memory or over HTTP
//!
//! ## Example
//!
//! ```rust,ignore
//! use concierge_agent::{
//!     CapabilityRegistry, CorrelationId, Envelope, InMemoryBackend, MessageKind, Transport,
//!     build_proxies, payload,
//! };
//! use std::sync::Arc;
//!
//! let registry = CapabilityRegistry::builtin();
//! let proxies = build_proxies(
//!     &registry,
//!     Transport::Local,
//!     Arc::new(InMemoryBackend::seeded()),
//!     concierge_agent::DEFAULT_CALL_TIMEOUT,
//! )?;
//!
//! let specialist = registry.resolve("get_customer")?;
//! let request = Envelope::outbound(
//!     &CorrelationId::generate(),
//!     specialist,
//!     MessageKind::Request,
//!     "get_customer",
//!     payload(serde_json::json!({"customer_id": 1})),
//! )?;
//! let reply = proxies[specialist].invoke(&request).await?;
//! ```

pub mod backend;
pub mod envelope;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod specialist;
pub mod specialists;
pub mod trail;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{
    CustomerRecord, CustomerUpdate, HttpToolBackend, InMemoryBackend, Ticket, ToolBackend,
};
pub use envelope::{CorrelationId, Envelope};
pub use error::{BackendError, BackendResult, DispatchError, DispatchResult};
pub use proxy::{
    DEFAULT_CALL_TIMEOUT, LocalProxy, ProxyMap, RemoteProxy, SpecialistProxy, Transport,
    build_proxies,
};
pub use registry::{CapabilityRegistry, RegistryEntry, builtin_entries};
pub use specialist::{Specialist, TaskInput, build_specialist};
pub use specialists::{CustomerDataSpecialist, SupportSpecialist};
pub use trail::CoordinationTrail;
pub use types::{MessageKind, Payload, SpecialistId, SpecialistKind, TaskDescriptor, payload};
