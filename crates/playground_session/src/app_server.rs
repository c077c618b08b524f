//! App server client module
//!
//! The app server associates registration tokens with application-level
//! clients. Two transports are supported:
//!
//! - [`HttpAppServer`] talks HTTP/JSON: `POST {host}/clients` answered with
//!   201 and `DELETE {host}/clients/{token}` answered with 204. The outcome is
//!   known as soon as the call returns.
//! - [`UpstreamAppServer`] tunnels the same actions as upstream messages
//!   through the push SDK. The app server answers later with a downstream
//!   message, which the session matches by correlation id or token.

use playground_common::{base_url, create_client, BoxFuture};
use playground_config::{AppServerConfig, AppServerTransport};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{upstream_destination, ClientRequest, UpstreamMessage};
use crate::sdk::{PushSdk, SdkError};

/// Errors that can occur when talking to the app server
#[derive(Error, Debug)]
pub enum AppServerError {
    /// Error during the HTTP request itself
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// The server answered, but not with the expected status
    #[error("App server answered HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// No answer within the configured bound
    #[error("No answer from app server within {0:?}")]
    Timeout(Duration),

    /// The push transport refused a tunnelled request
    #[error("Push transport error: {0}")]
    TransportError(#[from] SdkError),

    /// Missing or invalid configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),
}

/// How a request was taken by the app server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The app server acknowledged the request
    Confirmed,
    /// The request left; the acknowledgement arrives as a downstream reply
    AwaitingReply,
}

/// Operations consumed from the app server.
pub trait AppServer: Send + Sync {
    fn register_client(&self, request: &ClientRequest) -> BoxFuture<'_, Delivery, AppServerError>;

    fn unregister_client(&self, request: &ClientRequest)
        -> BoxFuture<'_, Delivery, AppServerError>;
}

/// Body of `POST {host}/clients`.
#[derive(Debug, Serialize)]
struct RegisterClientBody<'a> {
    registration_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_identifier: Option<&'a str>,
}

/// HTTP/JSON app server client
pub struct HttpAppServer {
    client: Client,
    base_url: String,
}

impl HttpAppServer {
    /// Creates a client for `host` (`"192.168.59.103:4260"` or a full URL)
    /// whose requests give up after `timeout`.
    pub fn new(host: &str, timeout: Duration) -> Result<Self, AppServerError> {
        if host.trim().is_empty() {
            return Err(AppServerError::ConfigError(
                "app server host cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            client: create_client(timeout)?,
            base_url: base_url(host),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn clients_url(&self) -> String {
        format!("{}/clients", self.base_url)
    }

    fn client_url(&self, token: &str) -> Result<Url, AppServerError> {
        let mut url = Url::parse(&self.clients_url())
            .map_err(|e| AppServerError::ConfigError(format!("invalid app server host: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppServerError::ConfigError("app server host cannot be a base".into()))?
            .push(token);
        Ok(url)
    }
}

async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<Delivery, AppServerError> {
    let status = response.status();
    if status == expected {
        return Ok(Delivery::Confirmed);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppServerError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

impl AppServer for HttpAppServer {
    fn register_client(&self, request: &ClientRequest) -> BoxFuture<'_, Delivery, AppServerError> {
        let url = self.clients_url();
        let token = request.registration_token.clone();
        let label = request.string_identifier.clone();

        Box::pin(async move {
            debug!("Making POST request: {}", url);
            let body = RegisterClientBody {
                registration_token: &token,
                string_identifier: label.as_deref(),
            };
            let response = self.client.post(&url).json(&body).send().await?;
            expect_status(response, StatusCode::CREATED).await
        })
    }

    fn unregister_client(
        &self,
        request: &ClientRequest,
    ) -> BoxFuture<'_, Delivery, AppServerError> {
        let url = self.client_url(&request.registration_token);

        Box::pin(async move {
            let url = url?;
            debug!("Making DELETE request: {}", url);
            let response = self.client.delete(url).send().await?;
            expect_status(response, StatusCode::NO_CONTENT).await
        })
    }
}

/// App server reached through upstream messages on the push transport
pub struct UpstreamAppServer {
    sdk: Arc<dyn PushSdk>,
    time_to_live: Option<u32>,
}

impl UpstreamAppServer {
    pub fn new(sdk: Arc<dyn PushSdk>, time_to_live: Option<u32>) -> Self {
        Self { sdk, time_to_live }
    }

    fn tunnel(&self, request: &ClientRequest) -> BoxFuture<'_, Delivery, AppServerError> {
        let message = request.sender_id.as_deref().map(|sender_id| UpstreamMessage {
            // The correlation id doubles as the message id so servers that
            // echo `message_id` get matched exactly.
            message_id: request.correlation_id.clone(),
            destination_id: upstream_destination(sender_id),
            data: request.upstream_data(),
            time_to_live: self.time_to_live,
        });

        Box::pin(async move {
            let message = message.ok_or_else(|| {
                AppServerError::ConfigError("no sender id to address the app server".to_string())
            })?;
            debug!(
                "Tunnelling {} to {}",
                message.message_id, message.destination_id
            );
            self.sdk.send(message).await?;
            Ok(Delivery::AwaitingReply)
        })
    }
}

impl AppServer for UpstreamAppServer {
    fn register_client(&self, request: &ClientRequest) -> BoxFuture<'_, Delivery, AppServerError> {
        self.tunnel(request)
    }

    fn unregister_client(
        &self,
        request: &ClientRequest,
    ) -> BoxFuture<'_, Delivery, AppServerError> {
        self.tunnel(request)
    }
}

/// Builds the app server client selected by `[app_server] transport`.
pub fn app_server_from_config(
    config: &AppServerConfig,
    sdk: Arc<dyn PushSdk>,
    time_to_live: Option<u32>,
) -> Result<Arc<dyn AppServer>, AppServerError> {
    match config.transport {
        AppServerTransport::Http => {
            let host = config.host.as_deref().ok_or_else(|| {
                AppServerError::ConfigError("app_server.host is required for http".to_string())
            })?;
            let server = HttpAppServer::new(host, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(server))
        }
        AppServerTransport::Upstream => {
            if config.host.is_some() {
                warn!("app_server.host is ignored by the upstream transport");
            }
            Ok(Arc::new(UpstreamAppServer::new(sdk, time_to_live)))
        }
    }
}
