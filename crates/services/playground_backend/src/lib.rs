//! HTTP control surface for the GCM playground.
//!
//! Exposes the registration session under `/api/session` and bridges the
//! push SDK through an HTTP gateway.

pub mod app_state;
pub mod gateway;
pub mod handlers;
pub mod routes;
pub mod service_factory;

#[cfg(feature = "openapi")]
pub mod doc;

pub use app_state::AppState;
pub use gateway::GatewayPushSdk;
pub use routes::routes;
pub use service_factory::PlaygroundServiceFactory;
