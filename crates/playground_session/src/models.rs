//! Wire and storage models for the registration handshake
//!
//! These are the payloads exchanged with the app server (directly over HTTP
//! or tunnelled through the push transport), the upstream/downstream message
//! envelopes, and the key-value record kept in local storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Action asking the app server to remember a token
pub const REGISTER_NEW_CLIENT: &str = "register_new_client";
/// Action asking the app server to forget a token
pub const UNREGISTER_CLIENT: &str = "unregister_client";
/// Reply status acknowledging `register_new_client`
pub const STATUS_REGISTERED: &str = "registered";
/// Reply status acknowledging `unregister_client`
pub const STATUS_UNREGISTERED: &str = "unregistered";
/// Upstream messages are addressed to `{sender_id}@gcm.googleapis.com`
pub const GCM_ADDRESS_SUFFIX: &str = "@gcm.googleapis.com";

/// Action carried by an app-server request.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAction {
    RegisterNewClient,
    UnregisterClient,
}

impl ClientAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientAction::RegisterNewClient => REGISTER_NEW_CLIENT,
            ClientAction::UnregisterClient => UNREGISTER_CLIENT,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            REGISTER_NEW_CLIENT => Some(ClientAction::RegisterNewClient),
            UNREGISTER_CLIENT => Some(ClientAction::UnregisterClient),
            _ => None,
        }
    }

    /// The reply status that means the app server did what was asked.
    pub fn success_status(&self) -> &'static str {
        match self {
            ClientAction::RegisterNewClient => STATUS_REGISTERED,
            ClientAction::UnregisterClient => STATUS_UNREGISTERED,
        }
    }
}

/// One request to the app server, tagged with the correlation id that the
/// matching reply has to carry back (or be matched by token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub correlation_id: String,
    pub action: ClientAction,
    pub registration_token: String,
    /// Human-readable device label, only sent on registration
    pub string_identifier: Option<String>,
    /// Sender the token was issued for; addresses tunnelled requests
    pub sender_id: Option<String>,
}

impl ClientRequest {
    pub fn register(
        registration_token: String,
        sender_id: Option<String>,
        string_identifier: Option<String>,
    ) -> Self {
        Self {
            correlation_id: new_message_id(),
            action: ClientAction::RegisterNewClient,
            registration_token,
            string_identifier,
            sender_id,
        }
    }

    pub fn unregister(registration_token: String, sender_id: Option<String>) -> Self {
        Self {
            correlation_id: new_message_id(),
            action: ClientAction::UnregisterClient,
            registration_token,
            string_identifier: None,
            sender_id,
        }
    }

    /// The `data` map used when the request travels as an upstream message.
    pub fn upstream_data(&self) -> HashMap<String, String> {
        let mut data = HashMap::new();
        data.insert("action".to_string(), self.action.as_str().to_string());
        data.insert(
            "registration_token".to_string(),
            self.registration_token.clone(),
        );
        if let Some(label) = &self.string_identifier {
            data.insert("stringIdentifier".to_string(), label.clone());
        }
        data
    }
}

/// Fresh identifier for upstream messages and app-server correlation.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Address of the app server behind a sender id.
pub fn upstream_destination(sender_id: &str) -> String {
    format!("{}{}", sender_id, GCM_ADDRESS_SUFFIX)
}

/// Client-to-server message handed to the push transport.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamMessage {
    pub message_id: String,
    pub destination_id: String,
    pub data: HashMap<String, String>,
    /// Seconds the transport may hold the message; transport default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
}

/// Server-to-client message delivered by the push transport.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub collapse_key: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// App-server answer to a [`ClientRequest`], as received downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppServerReply {
    /// Correlation id echoed by the server, if it echoes one
    pub correlation_id: Option<String>,
    pub action: ClientAction,
    pub status: String,
    pub registration_token: Option<String>,
}

impl AppServerReply {
    /// Recognises a downstream message as an app-server reply.
    ///
    /// Requires a known `action` and a `status`; `registration_token` and
    /// `message_id` are optional.
    pub fn from_downstream(message: &DownstreamMessage) -> Option<Self> {
        let action = ClientAction::parse(message.data.get("action")?)?;
        let status = message.data.get("status")?.clone();
        Some(Self {
            correlation_id: message.data.get("message_id").cloned(),
            action,
            status,
            registration_token: message.data.get("registration_token").cloned(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == self.action.success_status()
    }
}

/// Key-value record kept in local storage between runs.
///
/// `registered` and `regToken` are the keys the restored session relies on;
/// the rest lets a restored session address upstream messages again.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    pub fn registered(
        reg_token: String,
        sender_id: Option<String>,
        string_identifier: Option<String>,
    ) -> Self {
        Self {
            registered: true,
            reg_token: Some(reg_token),
            sender_id,
            string_identifier,
            registered_at: Some(Utc::now()),
        }
    }

    /// The token to restore, if the record describes a completed registration.
    pub fn restorable_token(&self) -> Option<&str> {
        if !self.registered {
            return None;
        }
        self.reg_token.as_deref().filter(|token| !token.is_empty())
    }
}
