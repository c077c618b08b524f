//! Registration session
//!
//! [`RegistrationSession`] owns the [`RegistrationState`] of one device and
//! is the only thing that mutates it. Every user action and every callback
//! from the push SDK or the app server goes through one of its methods, so
//! the state machine below is enforced in a single place:
//!
//! ```text
//! Unregistered --register()--> Registering
//! Unconfirmed  --register()--> Registering
//! Registering  --SDK token + app server ack--> Registered
//! Registering  --SDK failure--> Unregistered
//! Registering  --app server failure/timeout--> Unconfirmed (token kept)
//! Registered|Unconfirmed --unregister()--> Unregistering
//! Unregistering --SDK ack--> Unregistered (app server failure only warns)
//! Unregistering --SDK failure--> previous status
//! ```
//!
//! The session is not `Sync`-shared; run it inside one task (see
//! [`crate::actor`]) so that actions and callbacks are applied in order.

use playground_common::log_error;
use playground_config::AppConfig;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::app_server::{AppServer, Delivery};
use crate::error::SessionError;
use crate::models::{
    new_message_id, upstream_destination, AppServerReply, ClientAction, ClientRequest,
    DownstreamMessage, PersistedState, UpstreamMessage,
};
use crate::sdk::{PushSdk, SdkEvent};
use crate::state::{PendingRequest, RegistrationState, SessionSnapshot, SessionStatus};
use crate::store::StateStore;
use crate::topic::validate_topic;

/// Tunables taken from the configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub topic_prefix: String,
    /// Bound on one app-server round trip, including tunnelled replies
    pub app_server_timeout: Duration,
    pub time_to_live: Option<u32>,
    /// Sender used to address upstream messages when the session has none
    pub default_sender_id: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            topic_prefix: "/topics/".to_string(),
            app_server_timeout: Duration::from_secs(30),
            time_to_live: None,
            default_sender_id: None,
        }
    }
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            topic_prefix: config.push.topic_prefix.clone(),
            app_server_timeout: Duration::from_secs(config.app_server.timeout_secs),
            time_to_live: config.push.time_to_live,
            default_sender_id: config.push.sender_id.clone(),
        }
    }
}

/// Result of a topic subscription that did not fail.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionOutcome {
    Subscribed,
    AlreadySubscribed,
}

/// What an asynchronous event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A pending registration was confirmed
    Registered,
    /// The session returned to `Unregistered`
    Unregistered,
    /// A refreshed token started a new registration exchange
    RegistrationStarted,
    /// An ordinary downstream message for display
    Downstream(DownstreamMessage),
    /// A reply that matched no pending request; nothing changed
    Discarded,
    /// Nothing to do in the current state
    Ignored,
}

/// Client-side registration lifecycle for one device.
pub struct RegistrationSession {
    state: RegistrationState,
    sdk: Arc<dyn PushSdk>,
    app_server: Arc<dyn AppServer>,
    store: Arc<dyn StateStore>,
    settings: SessionSettings,
}

impl RegistrationSession {
    /// Creates an unregistered session without looking at the store.
    pub fn new(
        sdk: Arc<dyn PushSdk>,
        app_server: Arc<dyn AppServer>,
        store: Arc<dyn StateStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            state: RegistrationState::default(),
            sdk,
            app_server,
            store,
            settings,
        }
    }

    /// Creates a session, restoring a completed registration from the store.
    pub fn restore(
        sdk: Arc<dyn PushSdk>,
        app_server: Arc<dyn AppServer>,
        store: Arc<dyn StateStore>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let persisted = store
            .load()
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let mut session = Self::new(sdk, app_server, store, settings);

        if let Some(token) = persisted.restorable_token() {
            info!("Already registered, restoring token from local storage");
            session.state.status = SessionStatus::Registered;
            session.state.token = Some(token.to_string());
            session.state.sender_id = persisted.sender_id.clone();
            session.state.client_label = persisted.string_identifier.clone();
        }
        Ok(session)
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// When the in-flight app-server exchange gives up, if there is one.
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.state.pending.as_ref().map(|p| p.deadline)
    }

    /// Registers with the push SDK for `sender_id`, then tells the app server.
    ///
    /// Returns `Registered` when the app server confirmed synchronously, or
    /// `Registering` when its reply will arrive as a downstream message.
    pub async fn register(
        &mut self,
        sender_id: &str,
        client_label: Option<&str>,
    ) -> Result<SessionStatus, SessionError> {
        let sender_id = sender_id.trim();
        if sender_id.is_empty() {
            return Err(SessionError::InvalidInput(
                "Sender ID cannot be empty".to_string(),
            ));
        }
        self.ensure_idle()?;
        if !self.state.status.can_register() {
            return Err(SessionError::InvalidState {
                operation: "register",
                status: self.state.status,
            });
        }

        self.state.status = SessionStatus::Registering;
        self.state.token = None;
        self.state.sender_id = Some(sender_id.to_string());
        self.state.client_label = client_label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);
        info!("Registering with sender {}", sender_id);

        let sdk = Arc::clone(&self.sdk);
        let token = match sdk.register_for_token(&[sender_id.to_string()]).await {
            Ok(token) => token,
            Err(err) => {
                warn!("Registration to push SDK failed: {}", err);
                self.state.status = SessionStatus::Unregistered;
                return Err(SessionError::TokenIssuanceFailed(err.message));
            }
        };
        debug!("Registration token issued");

        self.start_registration_exchange(token).await
    }

    /// Invalidates the token at the SDK, then tells the app server.
    ///
    /// Returns `Unregistered` when done, or `Unregistering` while a tunnelled
    /// reply is outstanding.
    pub async fn unregister(&mut self) -> Result<SessionStatus, SessionError> {
        self.ensure_idle()?;
        let previous = self.state.status;
        let token = match (&self.state.token, previous.can_unregister()) {
            (Some(token), true) => token.clone(),
            _ => {
                return Err(SessionError::InvalidState {
                    operation: "unregister",
                    status: previous,
                })
            }
        };

        self.state.status = SessionStatus::Unregistering;
        info!("Unregistering");

        let sdk = Arc::clone(&self.sdk);
        if let Err(err) = sdk.unregister_token().await {
            warn!("Unregistration from push SDK failed: {}", err);
            self.state.status = previous;
            return Err(SessionError::UnregistrationFailed(err.message));
        }

        // The token is dead at the SDK from here on, whatever the app server says.
        self.state.token = None;
        let request = ClientRequest::unregister(token, self.state.sender_id.clone());
        self.state.pending = Some(self.pending_for(request.clone()));

        let app_server = Arc::clone(&self.app_server);
        let delivery = timeout(
            self.settings.app_server_timeout,
            app_server.unregister_client(&request),
        )
        .await;

        match delivery {
            Ok(Ok(Delivery::Confirmed)) => self.complete_unregistration(),
            Ok(Ok(Delivery::AwaitingReply)) => Ok(SessionStatus::Unregistering),
            Ok(Err(err)) => Err(self.fail_unregistration(err.to_string())),
            Err(_) => Err(self.fail_unregistration(self.timeout_reason())),
        }
    }

    /// Sends `payload` (a JSON object) upstream; returns the message id.
    ///
    /// Delivery is fire-and-forget: the SDK result is logged and never
    /// changes the session.
    pub async fn send_upstream(&mut self, payload: Value) -> Result<String, SessionError> {
        self.require_registered("send upstream")?;
        let data = flatten_payload(payload)?;

        let sender_id = self
            .state
            .sender_id
            .clone()
            .or_else(|| self.settings.default_sender_id.clone())
            .ok_or_else(|| {
                SessionError::InvalidInput("no sender id to address upstream message".to_string())
            })?;

        let message = UpstreamMessage {
            message_id: new_message_id(),
            destination_id: upstream_destination(&sender_id),
            data,
            time_to_live: self.settings.time_to_live,
        };
        let message_id = message.message_id.clone();

        match self.sdk.send(message).await {
            Ok(()) => info!("Upstream message {} sent", message_id),
            Err(err) => warn!("Upstream message {} failed: {}", message_id, err),
        }
        Ok(message_id)
    }

    /// Same as [`send_upstream`](Self::send_upstream) for raw JSON text.
    pub async fn send_upstream_raw(&mut self, payload: &str) -> Result<String, SessionError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| SessionError::MalformedUpstreamPayload(e.to_string()))?;
        self.send_upstream(value).await
    }

    /// Subscribes the current token to `topic`; subscribing twice is fine.
    pub async fn subscribe_topic(
        &mut self,
        topic: &str,
    ) -> Result<SubscriptionOutcome, SessionError> {
        validate_topic(&self.settings.topic_prefix, topic)?;
        let token = self.require_registered("subscribe")?;

        match self.sdk.subscribe(&token, topic).await {
            Ok(()) => {
                info!("Subscribed to {}", topic);
                Ok(SubscriptionOutcome::Subscribed)
            }
            Err(err) if err.is_already_subscribed() => {
                debug!("Already subscribed to {}", topic);
                Ok(SubscriptionOutcome::AlreadySubscribed)
            }
            Err(err) => {
                warn!("Subscription to {} failed: {}", topic, err);
                Err(SessionError::SubscriptionFailed(err.message))
            }
        }
    }

    pub async fn unsubscribe_topic(&mut self, topic: &str) -> Result<(), SessionError> {
        validate_topic(&self.settings.topic_prefix, topic)?;
        let token = self.require_registered("unsubscribe")?;

        self.sdk.unsubscribe(&token, topic).await.map_err(|err| {
            warn!("Unsubscribing from {} failed: {}", topic, err);
            SessionError::SubscriptionFailed(err.message)
        })?;
        info!("Unsubscribed from {}", topic);
        Ok(())
    }

    /// Applies an asynchronous callback from the push SDK.
    pub async fn handle_event(&mut self, event: SdkEvent) -> Result<EventOutcome, SessionError> {
        match event {
            SdkEvent::Downstream { message } => match AppServerReply::from_downstream(&message) {
                Some(reply) => self.handle_reply(reply),
                None => {
                    debug!("Downstream message from {:?}", message.from);
                    self.state.last_downstream = Some(message.clone());
                    Ok(EventOutcome::Downstream(message))
                }
            },
            SdkEvent::TokenRefreshed { token } => self.handle_token_refresh(token).await,
            SdkEvent::TokenInvalidated => {
                if self.state.status == SessionStatus::Unregistered
                    && self.state.token.is_none()
                    && self.state.pending.is_none()
                {
                    return Ok(EventOutcome::Ignored);
                }
                warn!("Push SDK invalidated the registration token");
                self.reset();
                Ok(EventOutcome::Unregistered)
            }
            SdkEvent::SendError { message_id, error } => {
                warn!("Upstream message {} was not delivered: {}", message_id, error);
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Applies an app-server reply; replies for anything but the pending
    /// request are dropped without touching the state.
    pub fn handle_reply(&mut self, reply: AppServerReply) -> Result<EventOutcome, SessionError> {
        let matched = self
            .state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.matches(&reply));
        if !matched {
            debug!(
                "Discarding stale {} reply (pending: {:?})",
                reply.action.as_str(),
                self.state.pending_correlation_id()
            );
            return Ok(EventOutcome::Discarded);
        }

        match (reply.action, reply.is_success()) {
            (ClientAction::RegisterNewClient, true) => {
                self.complete_registration().map(|_| EventOutcome::Registered)
            }
            (ClientAction::RegisterNewClient, false) => Err(self.fail_registration(format!(
                "app server replied with status {:?}",
                reply.status
            ))),
            (ClientAction::UnregisterClient, true) => {
                self.complete_unregistration().map(|_| EventOutcome::Unregistered)
            }
            (ClientAction::UnregisterClient, false) => Err(self.fail_unregistration(format!(
                "app server replied with status {:?}",
                reply.status
            ))),
        }
    }

    /// Fails the pending exchange if its deadline has passed.
    ///
    /// Returns the failure that was applied, if any.
    pub fn expire_pending(&mut self, now: Instant) -> Option<SessionError> {
        let action = match &self.state.pending {
            Some(pending) if pending.deadline <= now => pending.request.action,
            _ => return None,
        };
        let reason = self.timeout_reason();
        Some(match action {
            ClientAction::RegisterNewClient => self.fail_registration(reason),
            ClientAction::UnregisterClient => self.fail_unregistration(reason),
        })
    }

    async fn handle_token_refresh(&mut self, token: String) -> Result<EventOutcome, SessionError> {
        let status = self.state.status;
        if self.state.pending.is_some() || !status.can_unregister() {
            info!("Ignoring token refresh while {}", status);
            return Ok(EventOutcome::Ignored);
        }
        if self.state.token.as_deref() == Some(token.as_str()) && status == SessionStatus::Registered
        {
            return Ok(EventOutcome::Ignored);
        }

        info!("Registration token rotated, re-registering with app server");
        self.state.token = None;
        // The stored token is no longer valid at the SDK.
        if let Err(e) = self.store.clear() {
            log_error(e, "Could not clear persisted registration");
        }
        match self.start_registration_exchange(token).await? {
            SessionStatus::Registered => Ok(EventOutcome::Registered),
            _ => Ok(EventOutcome::RegistrationStarted),
        }
    }

    async fn start_registration_exchange(
        &mut self,
        token: String,
    ) -> Result<SessionStatus, SessionError> {
        let request = ClientRequest::register(
            token,
            self.state.sender_id.clone(),
            self.state.client_label.clone(),
        );
        self.state.status = SessionStatus::Registering;
        self.state.pending = Some(self.pending_for(request.clone()));

        let app_server = Arc::clone(&self.app_server);
        let delivery = timeout(
            self.settings.app_server_timeout,
            app_server.register_client(&request),
        )
        .await;

        match delivery {
            Ok(Ok(Delivery::Confirmed)) => self.complete_registration(),
            Ok(Ok(Delivery::AwaitingReply)) => {
                debug!("Waiting for app server reply to {}", request.correlation_id);
                Ok(SessionStatus::Registering)
            }
            Ok(Err(err)) => Err(self.fail_registration(err.to_string())),
            Err(_) => Err(self.fail_registration(self.timeout_reason())),
        }
    }

    fn complete_registration(&mut self) -> Result<SessionStatus, SessionError> {
        let Some(pending) = self.state.pending.take() else {
            return Ok(self.state.status);
        };
        let token = pending.request.registration_token;

        self.state.status = SessionStatus::Registered;
        self.state.token = Some(token.clone());
        info!("Registration with app server COMPLETED");

        let record = PersistedState::registered(
            token,
            self.state.sender_id.clone(),
            self.state.client_label.clone(),
        );
        self.store.save(&record).map_err(|e| {
            error!("Registered, but could not persist the token: {}", e);
            SessionError::Storage(e.to_string())
        })?;
        Ok(SessionStatus::Registered)
    }

    fn fail_registration(&mut self, reason: String) -> SessionError {
        if let Some(pending) = self.state.pending.take() {
            self.state.token = Some(pending.request.registration_token);
        }
        self.state.status = SessionStatus::Unconfirmed;
        warn!("Registration with app server FAILED: {}", reason);
        SessionError::AppServerRegistrationFailed(reason)
    }

    fn complete_unregistration(&mut self) -> Result<SessionStatus, SessionError> {
        info!("Unregistration SUCCESSFUL");
        self.reset();
        Ok(SessionStatus::Unregistered)
    }

    fn fail_unregistration(&mut self, reason: String) -> SessionError {
        warn!(
            "Unregistered locally, but the app server may keep a stale record: {}",
            reason
        );
        self.reset();
        SessionError::AppServerUnregistrationFailed(reason)
    }

    /// Back to a blank `Unregistered` state with nothing persisted.
    fn reset(&mut self) {
        self.state = RegistrationState::default();
        if let Err(e) = self.store.clear() {
            log_error(e, "Could not clear persisted registration");
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.state.pending_correlation_id() {
            Some(id) => Err(SessionError::Busy {
                correlation_id: id.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn require_registered(&self, operation: &'static str) -> Result<String, SessionError> {
        match (&self.state.token, self.state.status) {
            (Some(token), SessionStatus::Registered) => Ok(token.clone()),
            _ => Err(SessionError::InvalidState {
                operation,
                status: self.state.status,
            }),
        }
    }

    fn pending_for(&self, request: ClientRequest) -> PendingRequest {
        PendingRequest {
            request,
            deadline: Instant::now() + self.settings.app_server_timeout,
        }
    }

    fn timeout_reason(&self) -> String {
        format!(
            "no answer from app server within {:?}",
            self.settings.app_server_timeout
        )
    }
}

/// Turns a JSON object into the string map the transport carries.
///
/// Strings are kept verbatim; any other value is sent as its JSON text.
fn flatten_payload(payload: Value) -> Result<HashMap<String, String>, SessionError> {
    let object: Map<String, Value> = match payload {
        Value::Object(object) => object,
        other => {
            return Err(SessionError::MalformedUpstreamPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
