//! HTTP handlers for the registration session
//!
//! Thin adapters from JSON requests to [`SessionHandle`] calls. Failures are
//! rendered by [`PlaygroundError`]; the two app-server failures that leave a
//! usable local state are reported as a `warning` next to the resulting
//! status instead.
//!
//! [`SessionHandle`]: playground_session::SessionHandle

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use playground_common::{map_json_error, validation_error, PlaygroundError};
use playground_session::{
    EventOutcome, SdkEvent, SessionError, SessionSnapshot, SessionStatus, SubscriptionOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterRequest {
    /// Sender id to register for; `push.sender_id` from the config when omitted
    #[serde(default)]
    pub sender_id: Option<String>,
    /// Label the app server shows for this device
    #[serde(default)]
    pub string_identifier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub status: SessionStatus,
    /// Set when the app server did not confirm, but the local state is usable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpstreamResponse {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TopicRequest {
    /// Full topic name including the prefix, e.g. `/topics/news`
    pub topic: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubscriptionResponse {
    pub topic: String,
    pub outcome: SubscriptionOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventResponse {
    /// What the event did: `registered`, `unregistered`, `registration_started`,
    /// `downstream`, `discarded`, `ignored` or `warning`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn outcome_label(outcome: &EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Registered => "registered",
        EventOutcome::Unregistered => "unregistered",
        EventOutcome::RegistrationStarted => "registration_started",
        EventOutcome::Downstream(_) => "downstream",
        EventOutcome::Discarded => "discarded",
        EventOutcome::Ignored => "ignored",
    }
}

/// Turns a register/unregister result into a response, downgrading warnings.
async fn settle(
    state: &AppState,
    result: Result<SessionStatus, SessionError>,
) -> Result<Json<StatusResponse>, PlaygroundError> {
    match result {
        Ok(status) => Ok(Json(StatusResponse {
            status,
            warning: None,
        })),
        Err(err) if err.is_warning() => {
            warn!("{}", err);
            let snapshot = state.session.snapshot().await?;
            Ok(Json(StatusResponse {
                status: snapshot.status,
                warning: Some(err.to_string()),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current registration state", body = SessionSnapshot)
    ),
    tag = "Session"
))]
pub async fn get_session_handler(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, Response> {
    map_json_error(state.session.snapshot().await, PlaygroundError::from)
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/session/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered, registering, or unconfirmed with a warning", body = StatusResponse),
        (status = 400, description = "Missing sender id"),
        (status = 409, description = "Not allowed in the current state"),
        (status = 502, description = "Push SDK refused to issue a token")
    ),
    tag = "Session"
))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<StatusResponse>, PlaygroundError> {
    let sender_id = payload
        .sender_id
        .or_else(|| state.config.push.sender_id.clone())
        .ok_or_else(|| validation_error("sender_id is required"))?;
    debug!("Register requested for sender {}", sender_id);

    let result = state
        .session
        .register(sender_id, payload.string_identifier)
        .await;
    settle(&state, result).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/session/unregister",
    responses(
        (status = 200, description = "Unregistered, possibly with a warning", body = StatusResponse),
        (status = 409, description = "Not registered"),
        (status = 502, description = "Push SDK refused to invalidate the token")
    ),
    tag = "Session"
))]
pub async fn unregister_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, PlaygroundError> {
    let result = state.session.unregister().await;
    settle(&state, result).await
}

/// Takes the upstream payload as raw JSON text, as typed by the user.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/session/upstream",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Handed to the push transport", body = UpstreamResponse),
        (status = 400, description = "Payload is not a JSON object"),
        (status = 409, description = "Not registered")
    ),
    tag = "Session"
))]
pub async fn upstream_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<UpstreamResponse>, PlaygroundError> {
    let message_id = state.session.send_upstream_raw(body).await?;
    info!("Upstream message {} queued", message_id);
    Ok(Json(UpstreamResponse { message_id }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/session/topics",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Subscribed", body = SubscriptionResponse),
        (status = 400, description = "Invalid topic name"),
        (status = 409, description = "Not registered"),
        (status = 502, description = "Subscription failed")
    ),
    tag = "Session"
))]
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Json(payload): Json<TopicRequest>,
) -> Result<Json<SubscriptionResponse>, PlaygroundError> {
    let outcome = state.session.subscribe_topic(payload.topic.clone()).await?;
    Ok(Json(SubscriptionResponse {
        topic: payload.topic,
        outcome,
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/session/topics",
    request_body = TopicRequest,
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Invalid topic name"),
        (status = 409, description = "Not registered")
    ),
    tag = "Session"
))]
pub async fn unsubscribe_handler(
    State(state): State<AppState>,
    Json(payload): Json<TopicRequest>,
) -> Result<StatusCode, PlaygroundError> {
    state.session.unsubscribe_topic(payload.topic).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Webhook for callbacks from the push gateway.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/session/events",
    request_body = SdkEvent,
    responses(
        (status = 200, description = "Event applied", body = EventResponse)
    ),
    tag = "Session"
))]
pub async fn event_handler(
    State(state): State<AppState>,
    Json(event): Json<SdkEvent>,
) -> Result<Json<EventResponse>, PlaygroundError> {
    match state.session.deliver_event(event).await {
        Ok(outcome) => Ok(Json(EventResponse {
            outcome: outcome_label(&outcome).to_string(),
            warning: None,
        })),
        Err(err) if err.is_warning() => Ok(Json(EventResponse {
            outcome: "warning".to_string(),
            warning: Some(err.to_string()),
        })),
        Err(err) => Err(err.into()),
    }
}
