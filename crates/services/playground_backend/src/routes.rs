use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::app_state::AppState;
use crate::handlers::{
    event_handler, get_session_handler, register_handler, subscribe_handler,
    unregister_handler, unsubscribe_handler, upstream_handler,
};

/// Session routes, meant to be nested under `/api`.
pub fn routes(state: AppState) -> Router {
    info!("Session routes initialized");

    Router::new()
        .route("/", get(|| async { "GCM playground API" }))
        .route("/session", get(get_session_handler))
        .route("/session/register", post(register_handler))
        .route("/session/unregister", post(unregister_handler))
        .route("/session/upstream", post(upstream_handler))
        .route(
            "/session/topics",
            post(subscribe_handler).delete(unsubscribe_handler),
        )
        .route("/session/events", post(event_handler))
        .with_state(state)
}
