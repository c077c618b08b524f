use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

use crate::models::{AppServerReply, ClientRequest, DownstreamMessage};

/// Where the session is in the registration lifecycle.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unregistered,
    Registering,
    Registered,
    Unregistering,
    /// Token issued by the SDK but the app server never confirmed it
    Unconfirmed,
}

impl SessionStatus {
    pub fn can_register(&self) -> bool {
        matches!(self, SessionStatus::Unregistered | SessionStatus::Unconfirmed)
    }

    pub fn can_unregister(&self) -> bool {
        matches!(self, SessionStatus::Registered | SessionStatus::Unconfirmed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionStatus::Unregistered => "unregistered",
            SessionStatus::Registering => "registering",
            SessionStatus::Registered => "registered",
            SessionStatus::Unregistering => "unregistering",
            SessionStatus::Unconfirmed => "unconfirmed",
        };
        f.write_str(text)
    }
}

/// An app-server exchange waiting for its acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request: ClientRequest,
    pub deadline: Instant,
}

impl PendingRequest {
    pub fn correlation_id(&self) -> &str {
        &self.request.correlation_id
    }

    /// A reply belongs to this request when it echoes the correlation id, or,
    /// for servers that do not echo it, names the same action and token.
    pub fn matches(&self, reply: &AppServerReply) -> bool {
        if reply.action != self.request.action {
            return false;
        }
        match (&reply.correlation_id, &reply.registration_token) {
            (Some(id), _) => *id == self.request.correlation_id,
            (None, Some(token)) => *token == self.request.registration_token,
            (None, None) => false,
        }
    }
}

/// Everything the session knows about this device's registration.
///
/// Outside a transition `token` is set exactly when the status is
/// `Registered` or `Unconfirmed`; during one the token under negotiation
/// lives in `pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    pub status: SessionStatus,
    pub token: Option<String>,
    pub pending: Option<PendingRequest>,
    pub client_label: Option<String>,
    pub sender_id: Option<String>,
    pub last_downstream: Option<DownstreamMessage>,
}

impl RegistrationState {
    pub fn pending_correlation_id(&self) -> Option<&str> {
        self.pending.as_ref().map(PendingRequest::correlation_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            token: self.token.clone(),
            pending_correlation_id: self.pending_correlation_id().map(str::to_string),
            pending_token: self
                .pending
                .as_ref()
                .map(|p| p.request.registration_token.clone()),
            client_label: self.client_label.clone(),
            sender_id: self.sender_id.clone(),
            last_downstream: self.last_downstream.clone(),
        }
    }
}

/// Read-only view of the session for display.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub token: Option<String>,
    pub pending_correlation_id: Option<String>,
    pub pending_token: Option<String>,
    pub client_label: Option<String>,
    pub sender_id: Option<String>,
    pub last_downstream: Option<DownstreamMessage>,
}
