//! Error types for specialist dispatch.

use thiserror::Error;

use crate::types::SpecialistId;

/// Errors that can occur while resolving or invoking a specialist.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registry entry declares the task.
    #[error("Unknown task: {task}")]
    UnknownTask { task: String },

    /// The specialist id does not resolve in the registry.
    #[error("Unknown specialist: {specialist}")]
    UnknownSpecialist { specialist: String },

    /// The specialist could not be reached within the call timeout.
    #[error("Specialist {specialist} unavailable: {reason}")]
    SpecialistUnavailable {
        specialist: SpecialistId,
        reason: String,
    },

    /// The specialist answered but reported an application-level failure.
    #[error("Specialist {specialist} failed: {message}")]
    SpecialistError {
        specialist: SpecialistId,
        message: String,
    },

    /// The specialist does not implement the task or the payload does not fit its schema.
    #[error("Task {task} rejected by {specialist}: {reason}")]
    TaskRejected {
        specialist: SpecialistId,
        task: String,
        reason: String,
    },

    /// The registry configuration is inconsistent.
    #[error("Invalid registry: {0}")]
    InvalidRegistry(String),

    /// An envelope violates the origination rules for its message kind.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DispatchError {
    /// Create an unknown task error.
    pub fn unknown_task(task: impl Into<String>) -> Self {
        Self::UnknownTask { task: task.into() }
    }

    /// Create an unknown specialist error.
    pub fn unknown_specialist(specialist: impl Into<String>) -> Self {
        Self::UnknownSpecialist {
            specialist: specialist.into(),
        }
    }

    /// Create a specialist unavailable error.
    pub fn unavailable(specialist: &SpecialistId, reason: impl Into<String>) -> Self {
        Self::SpecialistUnavailable {
            specialist: specialist.clone(),
            reason: reason.into(),
        }
    }

    /// Create a specialist application error.
    pub fn specialist(specialist: &SpecialistId, message: impl Into<String>) -> Self {
        Self::SpecialistError {
            specialist: specialist.clone(),
            message: message.into(),
        }
    }

    /// Create a task rejected error.
    pub fn rejected(
        specialist: &SpecialistId,
        task: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TaskRejected {
            specialist: specialist.clone(),
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Only transient transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::SpecialistUnavailable { .. })
    }

    /// Configuration bugs that should have been caught at startup.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownTask { .. }
                | DispatchError::UnknownSpecialist { .. }
                | DispatchError::TaskRejected { .. }
                | DispatchError::InvalidRegistry(_)
        )
    }

    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            DispatchError::UnknownTask { .. } => "UNKNOWN_TASK",
            DispatchError::UnknownSpecialist { .. } => "UNKNOWN_SPECIALIST",
            DispatchError::SpecialistUnavailable { .. } => "SPECIALIST_UNAVAILABLE",
            DispatchError::SpecialistError { .. } => "SPECIALIST_ERROR",
            DispatchError::TaskRejected { .. } => "TASK_REJECTED",
            DispatchError::InvalidRegistry(_) => "INVALID_REGISTRY",
            DispatchError::InvalidEnvelope(_) => "INVALID_ENVELOPE",
            DispatchError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

/// Errors reported by the tool/data backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the operation.
    #[error("{0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with something we could not decode.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// A backend failure is an application-level failure of the specialist using it.
    pub fn into_dispatch(self, specialist: &SpecialistId) -> DispatchError {
        DispatchError::specialist(specialist, self.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
