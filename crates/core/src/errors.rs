use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("cannot {operation} {entity} in state `{state}`")]
    InvalidState { entity: &'static str, state: String, operation: String },
    #[error("{0} has expired")]
    Expired(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<FlowTransitionError> for DomainError {
    fn from(value: FlowTransitionError) -> Self {
        match value {
            FlowTransitionError::InvalidTransition { state, event } => Self::InvalidState {
                entity: "offer",
                state: state.as_str().to_owned(),
                operation: event.operation().to_owned(),
            },
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` was modified by a concurrent request")]
    ConcurrentModification { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Validation { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::InvalidState { correlation_id: id, .. }
            | InterfaceError::Expired { correlation_id: id, .. }
            | InterfaceError::ConcurrentModification { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("validation failed: {message}")]
    Validation { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("invalid state: {message}")]
    InvalidState { message: String, correlation_id: String },
    #[error("expired: {message}")]
    Expired { message: String, correlation_id: String },
    #[error("concurrent modification: {message}")]
    ConcurrentModification { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation { .. } => {
                "The request is invalid. Check dates, guest counts, and amounts and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action on this record.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::InvalidState { .. } => {
                "This action is not available in the record's current state. Refresh and review it."
            }
            Self::Expired { .. } => "The quote or offer has expired. Request a new quote.",
            Self::ConcurrentModification { .. } => {
                "The record was changed by someone else while you were working. Reload and retry."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::InvalidState { message, .. }
            | Self::Expired { message, .. }
            | Self::ConcurrentModification { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Validation { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::InvalidState { correlation_id, .. }
            | Self::Expired { correlation_id, .. }
            | Self::ConcurrentModification { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            ApplicationError::Domain(DomainError::Validation(_)) => {
                Self::Validation { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Forbidden(_)) => {
                Self::Forbidden { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvalidState { .. }) => {
                Self::InvalidState { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Expired(_)) => {
                Self::Expired { message, correlation_id }
            }
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::ConcurrentModification { .. } => {
                Self::ConcurrentModification { message, correlation_id }
            }
            ApplicationError::Persistence(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}
