//! Subcommand implementations.

use concierge_agent::{DispatchError, SpecialistId};
use concierge_coordinator::{
    ConfigError, CoordinationOutcome, Coordinator, CoordinatorConfig, CoordinatorConfigBuilder,
    CoordinatorError,
};
use concierge_http::{
    AppState, HttpConfigBuilder, ServeError, SpecialistHost, coordinator_router, serve,
    specialist_router,
};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Request only partially completed ({0})")]
    Incomplete(String),
}

impl CliError {
    pub fn code(&self) -> &str {
        match self {
            CliError::Config(_) => "CONFIG_ERROR",
            CliError::Coordinator(e) => e.error_code(),
            CliError::Dispatch(e) => e.error_code(),
            CliError::Serve(_) => "SERVE_FAILED",
            CliError::Output(_) => "OUTPUT_ERROR",
            CliError::Address(_) => "INVALID_ADDRESS",
            CliError::Incomplete(code) => code,
        }
    }

    /// 2 for configuration and startup problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Coordinator(_) | CliError::Address(_) => 2,
            CliError::Dispatch(
                DispatchError::InvalidRegistry(_) | DispatchError::UnknownSpecialist { .. },
            ) => 2,
            _ => 1,
        }
    }
}

fn coordinator_config() -> Result<CoordinatorConfig, CliError> {
    Ok(CoordinatorConfigBuilder::from_env()?.build()?)
}

fn parse_addr(addr: &str) -> Result<SocketAddr, CliError> {
    addr.trim()
        .parse()
        .map_err(|e| CliError::Address(format!("'{addr}': {e}")))
}

// ============================================================================
// serve
// ============================================================================

pub async fn run_serve(bind: Option<String>, host_specialists: bool) -> Result<(), CliError> {
    let config = coordinator_config()?;
    let mut http = HttpConfigBuilder::from_env()?;
    if let Some(bind) = bind {
        http = http.bind_addr(bind);
    }
    let http = http.build()?;

    let backend = config.tool_backend()?;
    let coordinator = Coordinator::with_backend(&config, backend.clone())?;
    let host = if host_specialists {
        Some(SpecialistHost::with_backend(&config, backend)?)
    } else {
        None
    };

    info!(
        addr = %http.bind_addr,
        transport = %config.transport,
        hosted_specialists = host.as_ref().map_or(0, SpecialistHost::len),
        "Starting coordinator service"
    );
    let router = coordinator_router(AppState::new(coordinator), host, &http);
    serve(http.bind_addr, router).await?;
    Ok(())
}

// ============================================================================
// specialist
// ============================================================================

pub async fn run_specialist(id: &str, bind: Option<String>) -> Result<(), CliError> {
    let config = coordinator_config()?;
    let id = SpecialistId::new(id);
    let registry = config.load_static()?.registry()?;
    let entry = registry.describe(&id)?;

    let addr = match bind {
        Some(bind) => parse_addr(&bind)?,
        None => endpoint_addr(&entry.endpoint)?,
    };
    let http = HttpConfigBuilder::from_env()?.build()?;
    let host = SpecialistHost::new(&registry, config.tool_backend()?)?.only(&id)?;

    info!(
        specialist = %id,
        kind = %entry.kind,
        addr = %addr,
        "Starting specialist service"
    );
    serve(addr, specialist_router(host, &http)).await?;
    Ok(())
}

/// Listen on every interface at the port of a registered endpoint.
fn endpoint_addr(endpoint: &str) -> Result<SocketAddr, CliError> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| CliError::Address(format!("endpoint '{endpoint}': {e}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| CliError::Address(format!("endpoint '{endpoint}' has no port")))?;
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

// ============================================================================
// query
// ============================================================================

pub async fn run_query(text: &str, json: bool, show_trail: bool) -> Result<(), CliError> {
    let config = coordinator_config()?;
    let coordinator = Coordinator::from_config(&config)?;

    let cancelled = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = coordinator.handle_with_cancel(text, cancelled).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.answer);
        if show_trail {
            print_trail(&outcome);
        }
    }

    match &outcome.failure {
        Some(failure) => Err(CliError::Incomplete(failure.code.clone())),
        None => Ok(()),
    }
}

fn print_trail(outcome: &CoordinationOutcome) {
    println!();
    println!(
        "Coordination trail ({}, {} pattern):",
        outcome.correlation_id, outcome.pattern
    );
    for (index, envelope) in outcome.trail.iter().enumerate() {
        println!(
            "  {:>2}. {:<10} {} -> {} [{}]",
            index + 1,
            envelope.kind.to_string(),
            envelope.sender,
            envelope.recipient,
            envelope.task_name()
        );
    }
}

// ============================================================================
// agents
// ============================================================================

pub fn run_agents(json: bool) -> Result<(), CliError> {
    let config = coordinator_config()?;
    let registry = config.load_static()?.registry()?;

    if json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
        return Ok(());
    }

    for entry in registry.list() {
        println!("{} ({}) - {}", entry.id, entry.kind, entry.name);
        if !entry.description.is_empty() {
            println!("  {}", entry.description);
        }
        if !entry.endpoint.is_empty() {
            println!("  endpoint: {}", entry.endpoint);
        }
        for task in &entry.tasks {
            println!("  - {}", task.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_addr_uses_endpoint_port() {
        let addr = endpoint_addr("http://localhost:8002/specialists/support").unwrap();
        assert_eq!(addr.port(), 8002);
        assert_eq!(
            endpoint_addr("http://example.com/specialists/x").unwrap().port(),
            80
        );
        assert!(endpoint_addr("not a url").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Address("x".into()).exit_code(), 2);
        assert_eq!(
            CliError::Dispatch(DispatchError::InvalidRegistry("duplicate id".into())).exit_code(),
            2
        );
        assert_eq!(
            CliError::Dispatch(DispatchError::unknown_specialist("billing")).exit_code(),
            2
        );
        assert_eq!(
            CliError::Dispatch(DispatchError::unavailable(
                &SpecialistId::new("support"),
                "connection refused"
            ))
            .exit_code(),
            1
        );
        assert_eq!(CliError::Incomplete("SPECIALIST_ERROR".into()).exit_code(), 1);
        assert_eq!(CliError::Incomplete("SPECIALIST_ERROR".into()).code(), "SPECIALIST_ERROR");
    }
}
