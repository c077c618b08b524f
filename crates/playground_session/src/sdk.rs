//! Push messaging SDK seam
//!
//! The vendor SDK issues tokens, moves messages and manages topic
//! subscriptions. The session only talks to it through [`PushSdk`], and
//! receives its asynchronous callbacks as [`SdkEvent`]s.

use playground_common::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DownstreamMessage, UpstreamMessage};

/// SDK error code for "already subscribed to this topic".
pub const ALREADY_SUBSCRIBED: i64 = 3001;

/// Error reported by the push SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SdkError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn is_already_subscribed(&self) -> bool {
        self.code == Some(ALREADY_SUBSCRIBED)
    }
}

/// Operations consumed from the push SDK.
///
/// Implementations copy what they need out of borrowed arguments before
/// returning the future; the future only borrows `self`.
pub trait PushSdk: Send + Sync {
    /// Requests a registration token authorising `sender_ids` to message this device.
    fn register_for_token(&self, sender_ids: &[String]) -> BoxFuture<'_, String, SdkError>;

    /// Invalidates the current token.
    fn unregister_token(&self) -> BoxFuture<'_, (), SdkError>;

    /// Hands an upstream message to the transport.
    fn send(&self, message: UpstreamMessage) -> BoxFuture<'_, (), SdkError>;

    fn subscribe(&self, token: &str, topic: &str) -> BoxFuture<'_, (), SdkError>;

    fn unsubscribe(&self, token: &str, topic: &str) -> BoxFuture<'_, (), SdkError>;
}

/// Asynchronous callbacks from the push SDK.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SdkEvent {
    /// A server-to-client message arrived
    Downstream { message: DownstreamMessage },
    /// The SDK rotated the token; the app server must learn the new one
    TokenRefreshed { token: String },
    /// The token is no longer valid, authoritative
    TokenInvalidated,
    /// An upstream message could not be delivered
    SendError { message_id: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event: SdkEvent = serde_json::from_str(
            r#"{"type":"downstream","message":{"from":"12345","data":{"message":"hi"}}}"#,
        )
        .unwrap();
        match event {
            SdkEvent::Downstream { message } => {
                assert_eq!(message.data.get("message").map(String::as_str), Some("hi"))
            }
            other => panic!("unexpected event {:?}", other),
        }

        let event: SdkEvent = serde_json::from_str(r#"{"type":"token_invalidated"}"#).unwrap();
        assert_eq!(event, SdkEvent::TokenInvalidated);
    }

    #[test]
    fn test_already_subscribed_code() {
        assert!(SdkError::with_code(3001, "TOPIC_ALREADY_SUBSCRIBED").is_already_subscribed());
        assert!(!SdkError::with_code(3002, "other").is_already_subscribed());
        assert!(!SdkError::new("no code").is_already_subscribed());
    }
}
