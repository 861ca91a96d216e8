//! Shared state handed to request handlers.

use std::{sync::Arc, time::Instant};

use concierge_agent::{
    CapabilityRegistry, DEFAULT_CALL_TIMEOUT, DispatchError, DispatchResult, ProxyMap,
    SpecialistId, SpecialistProxy, ToolBackend, Transport, build_proxies,
};
use concierge_coordinator::{Coordinator, CoordinatorConfig, CoordinatorResult};

/// State of the coordinator service.
#[derive(Clone, Debug)]
pub struct AppState {
    pub coordinator: Coordinator,
    started_at: Instant,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// In-process specialists served over HTTP so remote proxies can reach them.
#[derive(Clone)]
pub struct SpecialistHost {
    proxies: Arc<ProxyMap>,
}

impl std::fmt::Debug for SpecialistHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistHost")
            .field("specialists", &self.ids())
            .finish()
    }
}

impl SpecialistHost {
    /// Host every registered specialist on top of `backend`.
    pub fn new(
        registry: &CapabilityRegistry,
        backend: Arc<dyn ToolBackend>,
    ) -> DispatchResult<Self> {
        let proxies = build_proxies(registry, Transport::Local, backend, DEFAULT_CALL_TIMEOUT)?;
        Ok(Self {
            proxies: Arc::new(proxies),
        })
    }

    /// Host the registry and backend the coordinator configuration describes.
    pub fn from_config(config: &CoordinatorConfig) -> CoordinatorResult<Self> {
        Self::with_backend(config, config.tool_backend()?)
    }

    /// Host the configured registry over a backend shared with the coordinator.
    pub fn with_backend(
        config: &CoordinatorConfig,
        backend: Arc<dyn ToolBackend>,
    ) -> CoordinatorResult<Self> {
        let registry = config.load_static()?.registry()?;
        Ok(Self::new(&registry, backend)?)
    }

    /// Narrow the host down to a single specialist.
    pub fn only(&self, id: &SpecialistId) -> DispatchResult<Self> {
        let proxy = self
            .proxies
            .get(id)
            .ok_or_else(|| DispatchError::unknown_specialist(id.as_str()))?;
        let mut proxies = ProxyMap::new();
        proxies.insert(id.clone(), proxy.clone());
        Ok(Self {
            proxies: Arc::new(proxies),
        })
    }

    pub fn get(&self, id: &SpecialistId) -> Option<&Arc<dyn SpecialistProxy>> {
        self.proxies.get(id)
    }

    /// Hosted ids, sorted.
    pub fn ids(&self) -> Vec<&SpecialistId> {
        let mut ids: Vec<_> = self.proxies.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
