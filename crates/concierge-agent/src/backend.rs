//! Tool/data backend used by the in-process specialists.
//!
//! The backend exposes five named operations over customer records and
//! support tickets. [`InMemoryBackend`] holds a seeded sample data set;
//! [`HttpToolBackend`] forwards every operation to a remote tool server
//! speaking the `{name, arguments}` → `{success, result | error}` contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{BackendError, BackendResult};

/// Default timeout for tool server calls.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Customer statuses accepted by updates and listings.
pub const CUSTOMER_STATUSES: &[&str] = &["active", "disabled"];

/// Ticket priorities.
pub const TICKET_PRIORITIES: &[&str] = &["low", "medium", "high"];

/// A customer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub customer_id: i64,
    pub issue: String,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Tickets nobody has started working on yet.
    pub fn is_open(&self) -> bool {
        self.status == "open"
    }
}

/// Field changes for a customer update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CustomerUpdate {
    /// Whether no recognised field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.status.is_none()
    }
}

/// Named operations offered by the tool/data backend.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Fetch one customer; `None` when absent.
    async fn get_record(&self, customer_id: i64) -> BackendResult<Option<CustomerRecord>>;

    /// List customers with the given status.
    async fn list_records(&self, status: &str, limit: usize) -> BackendResult<Vec<CustomerRecord>>;

    /// Apply an update. Returns whether a record was changed.
    async fn update_record(&self, customer_id: i64, update: &CustomerUpdate) -> BackendResult<bool>;

    /// Open a new ticket.
    async fn create_ticket(
        &self,
        customer_id: i64,
        issue: &str,
        priority: &str,
    ) -> BackendResult<Ticket>;

    /// Ticket history of a customer, newest first.
    async fn get_history(&self, customer_id: i64) -> BackendResult<Vec<Ticket>>;
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Default)]
struct Store {
    customers: BTreeMap<i64, CustomerRecord>,
    tickets: Vec<Ticket>,
    next_ticket_id: i64,
}

/// Backend holding records in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: RwLock<Store>,
}

impl InMemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend preloaded with the sample customers and tickets.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let customers = [
            (1, "Alice Johnson", "alice@example.com", "555-0101"),
            (2, "Bob Smith", "bob@example.com", "555-0102"),
            (3, "Charlie Brown", "charlie@example.com", "555-0103"),
            (4, "Diana Prince", "diana@example.com", "555-0104"),
            (5, "Eve Davis", "eve@example.com", "555-0105"),
            (12345, "Premium Customer", "premium@example.com", "555-9999"),
        ]
        .into_iter()
        .map(|(id, name, email, phone)| {
            (
                id,
                CustomerRecord {
                    id,
                    name: name.to_string(),
                    email: Some(email.to_string()),
                    phone: Some(phone.to_string()),
                    status: "active".to_string(),
                    created_at: now,
                    updated_at: now,
                },
            )
        })
        .collect();

        let tickets: Vec<Ticket> = [
            (1, "Account access issue", "open", "medium"),
            (1, "Password reset", "resolved", "low"),
            (2, "Billing inquiry", "open", "high"),
            (12345, "Premium account upgrade", "in_progress", "high"),
            (3, "Product inquiry", "resolved", "low"),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (customer_id, issue, status, priority))| Ticket {
            id: i as i64 + 1,
            customer_id,
            issue: issue.to_string(),
            status: status.to_string(),
            priority: priority.to_string(),
            created_at: now,
        })
        .collect();

        let next_ticket_id = tickets.len() as i64 + 1;
        Self {
            store: RwLock::new(Store {
                customers,
                tickets,
                next_ticket_id,
            }),
        }
    }

    /// Insert or replace a customer record.
    pub async fn insert_record(&self, record: CustomerRecord) {
        self.store.write().await.customers.insert(record.id, record);
    }
}

#[async_trait]
impl ToolBackend for InMemoryBackend {
    async fn get_record(&self, customer_id: i64) -> BackendResult<Option<CustomerRecord>> {
        Ok(self.store.read().await.customers.get(&customer_id).cloned())
    }

    async fn list_records(&self, status: &str, limit: usize) -> BackendResult<Vec<CustomerRecord>> {
        let store = self.store.read().await;
        Ok(store
            .customers
            .values()
            .filter(|c| c.status == status)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_record(
        &self,
        customer_id: i64,
        update: &CustomerUpdate,
    ) -> BackendResult<bool> {
        if update.is_empty() {
            return Err(BackendError::Rejected("No valid fields to update".to_string()));
        }
        if let Some(status) = &update.status
            && !CUSTOMER_STATUSES.contains(&status.as_str())
        {
            return Err(BackendError::Rejected(format!("Invalid status '{status}'")));
        }

        let mut store = self.store.write().await;
        let Some(record) = store.customers.get_mut(&customer_id) else {
            return Ok(false);
        };
        if let Some(name) = &update.name {
            record.name = name.clone();
        }
        if let Some(email) = &update.email {
            record.email = Some(email.clone());
        }
        if let Some(phone) = &update.phone {
            record.phone = Some(phone.clone());
        }
        if let Some(status) = &update.status {
            record.status = status.clone();
        }
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn create_ticket(
        &self,
        customer_id: i64,
        issue: &str,
        priority: &str,
    ) -> BackendResult<Ticket> {
        if !TICKET_PRIORITIES.contains(&priority) {
            return Err(BackendError::Rejected(format!("Invalid priority '{priority}'")));
        }
        let mut store = self.store.write().await;
        let ticket = Ticket {
            id: store.next_ticket_id,
            customer_id,
            issue: issue.to_string(),
            status: "open".to_string(),
            priority: priority.to_string(),
            created_at: Utc::now(),
        };
        store.next_ticket_id += 1;
        store.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn get_history(&self, customer_id: i64) -> BackendResult<Vec<Ticket>> {
        let store = self.store.read().await;
        let mut history: Vec<Ticket> = store
            .tickets
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

#[derive(Debug, Deserialize)]
struct ToolCallResponse {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Backend reached through a remote tool server.
#[derive(Clone)]
pub struct HttpToolBackend {
    call_url: Url,
    http: Client,
}

impl std::fmt::Debug for HttpToolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToolBackend")
            .field("call_url", &self.call_url.as_str())
            .finish()
    }
}

impl HttpToolBackend {
    /// Create a backend for the tool server at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> BackendResult<Self> {
        Self::with_timeout(base_url, DEFAULT_BACKEND_TIMEOUT)
    }

    /// Create a backend with a custom request timeout.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> BackendResult<Self> {
        let call_url = Url::parse(&format!(
            "{}/tools/call",
            base_url.as_ref().trim_end_matches('/')
        ))
        .map_err(|e| BackendError::Unreachable(format!("Invalid backend URL: {e}")))?;

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("concierge-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Unreachable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { call_url, http })
    }

    /// Tool call endpoint.
    pub fn call_url(&self) -> &Url {
        &self.call_url
    }

    async fn call(&self, name: &str, arguments: Value) -> BackendResult<ToolCallResponse> {
        debug!(tool = name, url = %self.call_url, "Calling tool server");
        let response = self
            .http
            .post(self.call_url.clone())
            .json(&json!({ "name": name, "arguments": arguments }))
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(format!("Failed to call {name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| {
                BackendError::InvalidResponse(format!("Failed to parse {name} response: {e}"))
            })
    }

    async fn call_ok<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        arguments: Value,
    ) -> BackendResult<T> {
        let reply = self.call(name, arguments).await?;
        if !reply.success {
            return Err(BackendError::Rejected(
                reply.error.unwrap_or_else(|| format!("{name} failed")),
            ));
        }
        serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|e| BackendError::InvalidResponse(format!("Unexpected {name} result: {e}")))
    }
}

#[async_trait]
impl ToolBackend for HttpToolBackend {
    async fn get_record(&self, customer_id: i64) -> BackendResult<Option<CustomerRecord>> {
        let reply = self
            .call("get_customer", json!({ "customer_id": customer_id }))
            .await?;
        if !reply.success {
            // The tool server reports a missing customer as a failure.
            return match reply.error {
                Some(error) if error.contains("not found") => Ok(None),
                error => Err(BackendError::Rejected(
                    error.unwrap_or_else(|| "get_customer failed".to_string()),
                )),
            };
        }
        serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|e| {
                BackendError::InvalidResponse(format!("Unexpected get_customer result: {e}"))
            })
    }

    async fn list_records(&self, status: &str, limit: usize) -> BackendResult<Vec<CustomerRecord>> {
        self.call_ok("list_customers", json!({ "status": status, "limit": limit }))
            .await
    }

    async fn update_record(
        &self,
        customer_id: i64,
        update: &CustomerUpdate,
    ) -> BackendResult<bool> {
        let _: Value = self
            .call_ok(
                "update_customer",
                json!({ "customer_id": customer_id, "data": update }),
            )
            .await?;
        Ok(true)
    }

    async fn create_ticket(
        &self,
        customer_id: i64,
        issue: &str,
        priority: &str,
    ) -> BackendResult<Ticket> {
        #[derive(Deserialize)]
        struct Created {
            ticket_id: i64,
            customer_id: i64,
            issue: String,
            status: String,
            priority: String,
        }

        let created: Created = self
            .call_ok(
                "create_ticket",
                json!({ "customer_id": customer_id, "issue": issue, "priority": priority }),
            )
            .await?;
        Ok(Ticket {
            id: created.ticket_id,
            customer_id: created.customer_id,
            issue: created.issue,
            status: created.status,
            priority: created.priority,
            created_at: Utc::now(),
        })
    }

    async fn get_history(&self, customer_id: i64) -> BackendResult<Vec<Ticket>> {
        self.call_ok("get_customer_history", json!({ "customer_id": customer_id }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_seeded_backend() {
        let backend = InMemoryBackend::seeded();
        let alice = backend.get_record(1).await.unwrap().unwrap();
        assert_eq!(alice.name, "Alice Johnson");
        assert!(backend.get_record(999).await.unwrap().is_none());

        let active = backend.list_records("active", 100).await.unwrap();
        assert_eq!(active.len(), 6);
        assert_eq!(backend.list_records("active", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_for_customer() {
        let backend = InMemoryBackend::seeded();
        let history = backend.get_history(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|t| t.customer_id == 1));
    }

    #[tokio::test]
    async fn test_update_record() {
        let backend = InMemoryBackend::seeded();
        let update = CustomerUpdate {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        assert!(backend.update_record(2, &update).await.unwrap());
        let bob = backend.get_record(2).await.unwrap().unwrap();
        assert_eq!(bob.email.as_deref(), Some("new@example.com"));

        assert!(!backend.update_record(999, &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let backend = InMemoryBackend::seeded();
        let err = backend
            .update_record(1, &CustomerUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_create_ticket() {
        let backend = InMemoryBackend::seeded();
        let ticket = backend.create_ticket(4, "Cannot log in", "high").await.unwrap();
        assert_eq!(ticket.id, 6);
        assert_eq!(ticket.status, "open");
        assert!(backend.create_ticket(4, "x", "urgent").await.is_err());
    }

    #[tokio::test]
    async fn test_http_backend_get_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/call"))
            .and(body_partial_json(json!({"name": "get_customer"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {
                    "id": 1,
                    "name": "Alice Johnson",
                    "email": "alice@example.com",
                    "phone": "555-0101",
                    "status": "active",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let backend = HttpToolBackend::new(server.uri()).unwrap();
        let record = backend.get_record(1).await.unwrap().unwrap();
        assert_eq!(record.name, "Alice Johnson");
    }

    #[tokio::test]
    async fn test_http_backend_missing_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/call"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Customer 42 not found"
            })))
            .mount(&server)
            .await;

        let backend = HttpToolBackend::new(server.uri()).unwrap();
        assert!(backend.get_record(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/call"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "No valid fields to update"
            })))
            .mount(&server)
            .await;

        let backend = HttpToolBackend::new(server.uri()).unwrap();
        let err = backend
            .update_record(1, &CustomerUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No valid fields to update");
    }

    #[test]
    fn test_http_backend_url() {
        let backend = HttpToolBackend::new("http://localhost:8000/").unwrap();
        assert_eq!(backend.call_url().as_str(), "http://localhost:8000/tools/call");
        assert!(HttpToolBackend::new("not a url").is_err());
    }
}
