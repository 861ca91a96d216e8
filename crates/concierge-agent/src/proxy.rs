//! Specialist Proxy
//!
//! One interface for invoking a task on a specialist, whether the specialist
//! runs in this process ([`LocalProxy`]) or behind its declared endpoint
//! ([`RemoteProxy`]). Callers never branch on which variant they hold.
//!
//! # Remote wire contract
//!
//! | Outcome | Error |
//! |---------|-------|
//! | 2xx with a reply envelope | none |
//! | 404 / 422 | `TaskRejected` |
//! | other 4xx / 5xx | `SpecialistError` |
//! | connect failure, timeout | `SpecialistUnavailable` |

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::backend::ToolBackend;
use crate::envelope::Envelope;
use crate::error::{DispatchError, DispatchResult};
use crate::registry::CapabilityRegistry;
use crate::specialist::{Specialist, build_specialist};
use crate::types::SpecialistId;

/// Default bound on one specialist call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// How specialists are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Direct in-process call
    #[default]
    Local,
    /// HTTP request to the specialist's endpoint
    Remote,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Local => f.write_str("local"),
            Transport::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Transport::Local),
            "remote" => Ok(Transport::Remote),
            other => Err(format!("unknown transport '{other}', expected local or remote")),
        }
    }
}

/// Uniform handle for invoking tasks on one specialist.
#[async_trait]
pub trait SpecialistProxy: Send + Sync {
    /// Specialist behind this proxy.
    fn specialist(&self) -> &SpecialistId;

    /// Transport used.
    fn transport(&self) -> Transport;

    /// Deliver an outbound envelope and return the specialist's reply.
    async fn invoke(&self, request: &Envelope) -> DispatchResult<Envelope>;
}

// ============================================================================
// Local proxy
// ============================================================================

/// Calls an in-process specialist directly.
pub struct LocalProxy {
    specialist: Arc<dyn Specialist>,
}

impl LocalProxy {
    pub fn new(specialist: Arc<dyn Specialist>) -> Self {
        Self { specialist }
    }
}

#[async_trait]
impl SpecialistProxy for LocalProxy {
    fn specialist(&self) -> &SpecialistId {
        self.specialist.id()
    }

    fn transport(&self) -> Transport {
        Transport::Local
    }

    async fn invoke(&self, request: &Envelope) -> DispatchResult<Envelope> {
        if &request.recipient != self.specialist.id() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "envelope for {} delivered to {}",
                request.recipient,
                self.specialist.id()
            )));
        }
        if !request.kind.is_outbound() {
            return Err(DispatchError::InvalidEnvelope(format!(
                "a {} envelope cannot be delivered to a specialist",
                request.kind
            )));
        }
        let result = self
            .specialist
            .handle(request.task_name(), &request.content)
            .await?;
        Envelope::answer(request, result)
    }
}

// ============================================================================
// Remote proxy
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Calls a specialist over HTTP at its declared endpoint.
#[derive(Clone)]
pub struct RemoteProxy {
    specialist: SpecialistId,
    process_url: Url,
    http: Client,
}

impl fmt::Debug for RemoteProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProxy")
            .field("specialist", &self.specialist)
            .field("process_url", &self.process_url.as_str())
            .finish()
    }
}

impl RemoteProxy {
    /// Create a proxy posting to `{endpoint}/process`.
    pub fn new(
        specialist: SpecialistId,
        endpoint: impl AsRef<str>,
        timeout: Duration,
    ) -> DispatchResult<Self> {
        let process_url = Url::parse(&format!(
            "{}/process",
            endpoint.as_ref().trim_end_matches('/')
        ))
        .map_err(|e| {
            DispatchError::InvalidRegistry(format!(
                "invalid endpoint for specialist '{specialist}': {e}"
            ))
        })?;

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("concierge-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DispatchError::unavailable(
                    &specialist,
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            specialist,
            process_url,
            http,
        })
    }

    /// URL envelopes are posted to.
    pub fn process_url(&self) -> &Url {
        &self.process_url
    }

    fn transport_error(&self, err: reqwest::Error) -> DispatchError {
        let reason = if err.is_timeout() {
            format!("timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        DispatchError::unavailable(&self.specialist, reason)
    }

    async fn error_response(
        &self,
        request: &Envelope,
        status: StatusCode,
        response: reqwest::Response,
    ) -> DispatchError {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("HTTP {status}: {text}"));

        match status {
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                DispatchError::rejected(&self.specialist, request.task_name(), message)
            }
            _ => DispatchError::specialist(&self.specialist, message),
        }
    }
}

#[async_trait]
impl SpecialistProxy for RemoteProxy {
    fn specialist(&self) -> &SpecialistId {
        &self.specialist
    }

    fn transport(&self) -> Transport {
        Transport::Remote
    }

    async fn invoke(&self, request: &Envelope) -> DispatchResult<Envelope> {
        debug!(
            specialist = %self.specialist,
            task = request.task_name(),
            url = %self.process_url,
            "Posting envelope"
        );

        let response = self
            .http
            .post(self.process_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_response(request, status, response).await);
        }

        let reply: Envelope = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                DispatchError::specialist(&self.specialist, format!("Invalid reply envelope: {e}"))
            }
        })?;
        reply.validate_reply(request)?;
        Ok(reply)
    }
}

// ============================================================================
// Construction
// ============================================================================

/// Proxies keyed by specialist id.
pub type ProxyMap = HashMap<SpecialistId, Arc<dyn SpecialistProxy>>;

/// Build one proxy per registered specialist using the chosen transport.
///
/// Remote transport requires every entry to declare an endpoint.
pub fn build_proxies(
    registry: &CapabilityRegistry,
    transport: Transport,
    backend: Arc<dyn ToolBackend>,
    timeout: Duration,
) -> DispatchResult<ProxyMap> {
    let mut proxies: ProxyMap = HashMap::new();
    for entry in registry.list() {
        let proxy: Arc<dyn SpecialistProxy> = match transport {
            Transport::Local => Arc::new(LocalProxy::new(build_specialist(entry, backend.clone()))),
            Transport::Remote => {
                if entry.endpoint.is_empty() {
                    return Err(DispatchError::InvalidRegistry(format!(
                        "specialist '{}' has no endpoint for remote transport",
                        entry.id
                    )));
                }
                Arc::new(RemoteProxy::new(entry.id.clone(), &entry.endpoint, timeout)?)
            }
        };
        proxies.insert(entry.id.clone(), proxy);
    }
    Ok(proxies)
}
