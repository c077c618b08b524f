//! Push gateway client
//!
//! The vendor push SDK only runs on devices, so the backend reaches it through
//! a small gateway process that exposes the SDK over HTTP/JSON:
//!
//! - `POST {gateway}/tokens` with `{"sender_ids": [..]}` answers `{"token"}`
//! - `DELETE {gateway}/tokens`
//! - `POST {gateway}/messages` with an upstream message
//! - `POST|DELETE {gateway}/topics` with `{"token", "topic"}`
//!
//! Failures come back as `{"code"?, "message"}`. Callbacks travel the other
//! way, into `POST /api/session/events`.

use playground_common::{base_url, create_client, BoxFuture};
use playground_session::{PushSdk, SdkError, UpstreamMessage};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct TokenRequest {
    sender_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct TopicRequest {
    token: String,
    topic: String,
}

/// [`PushSdk`] backed by the push gateway.
pub struct GatewayPushSdk {
    client: Client,
    base_url: String,
}

impl GatewayPushSdk {
    pub fn new(gateway_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: create_client(timeout)?,
            base_url: base_url(gateway_url),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn topic_call(&self, method: Method, token: String, topic: String) -> Result<(), SdkError> {
        let url = self.url("topics");
        debug!("Making {} request: {} ({})", method, url, topic);
        let response = self
            .client
            .request(method, &url)
            .json(&TopicRequest { token, topic })
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await.map(|_| ())
    }
}

fn transport_error(err: reqwest::Error) -> SdkError {
    SdkError::new(format!("push gateway unreachable: {}", err))
}

/// Passes 2xx responses through and turns anything else into an [`SdkError`].
async fn check(response: Response) -> Result<Response, SdkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(serde_json::from_str::<SdkError>(&body)
        .unwrap_or_else(|_| SdkError::new(format!("push gateway answered HTTP {}: {}", status, body))))
}

impl PushSdk for GatewayPushSdk {
    fn register_for_token(&self, sender_ids: &[String]) -> BoxFuture<'_, String, SdkError> {
        let request = TokenRequest {
            sender_ids: sender_ids.to_vec(),
        };

        Box::pin(async move {
            let url = self.url("tokens");
            debug!("Making POST request: {}", url);
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(transport_error)?;
            let body: TokenResponse = check(response)
                .await?
                .json()
                .await
                .map_err(|e| SdkError::new(format!("invalid token response: {}", e)))?;
            Ok(body.token)
        })
    }

    fn unregister_token(&self) -> BoxFuture<'_, (), SdkError> {
        Box::pin(async move {
            let url = self.url("tokens");
            debug!("Making DELETE request: {}", url);
            let response = self
                .client
                .delete(&url)
                .send()
                .await
                .map_err(transport_error)?;
            check(response).await.map(|_| ())
        })
    }

    fn send(&self, message: UpstreamMessage) -> BoxFuture<'_, (), SdkError> {
        Box::pin(async move {
            let url = self.url("messages");
            debug!("Making POST request: {} ({})", url, message.message_id);
            let response = self
                .client
                .post(&url)
                .json(&message)
                .send()
                .await
                .map_err(transport_error)?;
            check(response).await.map(|_| ())
        })
    }

    fn subscribe(&self, token: &str, topic: &str) -> BoxFuture<'_, (), SdkError> {
        Box::pin(self.topic_call(Method::POST, token.to_string(), topic.to_string()))
    }

    fn unsubscribe(&self, token: &str, topic: &str) -> BoxFuture<'_, (), SdkError> {
        Box::pin(self.topic_call(Method::DELETE, token.to_string(), topic.to_string()))
    }
}
