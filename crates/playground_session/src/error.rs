//! Error type surfaced by the registration session.

use playground_common::{
    conflict, external_service_error, internal_error, validation_error, PlaygroundError,
};
use thiserror::Error;

use crate::state::SessionStatus;

/// Failures surfaced to the caller of a session operation.
///
/// None of these are fatal: after any of them the session sits in a stable
/// state (`Unregistered`, `Registered` or `Unconfirmed`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Rejected locally before any collaborator was contacted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation is not permitted in the current status
    #[error("Cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// A register/unregister exchange is still waiting for the app server
    #[error("Another registration transition is in flight ({correlation_id})")]
    Busy { correlation_id: String },

    /// The push SDK could not produce a token
    #[error("Token issuance failed: {0}")]
    TokenIssuanceFailed(String),

    /// Token is valid at the SDK but the app server did not confirm it
    #[error("Registration with app server failed: {0}")]
    AppServerRegistrationFailed(String),

    /// Token is gone at the SDK but the app server may still list it
    #[error("App server may still hold the registration: {0}")]
    AppServerUnregistrationFailed(String),

    /// The push SDK refused to invalidate the token
    #[error("Unregistration failed: {0}")]
    UnregistrationFailed(String),

    #[error("Invalid topic name: {0}")]
    InvalidTopicName(String),

    #[error("Topic subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Malformed upstream payload: {0}")]
    MalformedUpstreamPayload(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Session actor is not running")]
    ActorClosed,
}

impl SessionError {
    /// True for the failures that leave the local session in a usable state
    /// but need the operator's attention.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SessionError::AppServerRegistrationFailed(_)
                | SessionError::AppServerUnregistrationFailed(_)
        )
    }
}

impl From<SessionError> for PlaygroundError {
    fn from(err: SessionError) -> Self {
        match &err {
            SessionError::InvalidInput(_)
            | SessionError::InvalidTopicName(_)
            | SessionError::MalformedUpstreamPayload(_) => validation_error(err),
            SessionError::InvalidState { .. } | SessionError::Busy { .. } => conflict(err),
            SessionError::TokenIssuanceFailed(_)
            | SessionError::UnregistrationFailed(_)
            | SessionError::SubscriptionFailed(_) => external_service_error("push-sdk", err),
            SessionError::AppServerRegistrationFailed(_)
            | SessionError::AppServerUnregistrationFailed(_) => {
                external_service_error("app-server", err)
            }
            SessionError::Storage(_) | SessionError::ActorClosed => internal_error(err),
        }
    }
}
