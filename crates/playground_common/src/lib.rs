// --- File: crates/playground_common/src/lib.rs ---

pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod services; // Async trait plumbing

pub use error::{
    config_error, conflict, external_service_error, internal_error, validation_error, Context,
    HttpStatusCode, PlaygroundError,
};

pub use http::{
    client::{base_url, create_client},
    map_json_error, IntoHttpResponse,
};

pub use logging::{init_from_config, init_with_level, log_error, log_result};

pub use services::BoxFuture;
