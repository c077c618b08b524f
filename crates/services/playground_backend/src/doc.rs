use utoipa::OpenApi;

use crate::handlers::{
    EventResponse, RegisterRequest, StatusResponse, SubscriptionResponse, TopicRequest,
    UpstreamResponse,
};
use playground_session::{
    DownstreamMessage, SdkEvent, SessionSnapshot, SessionStatus, SubscriptionOutcome,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GCM Playground API",
        version = "0.1.0",
        description = "Drives the push registration session of this device",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    paths(
        crate::handlers::get_session_handler,
        crate::handlers::register_handler,
        crate::handlers::unregister_handler,
        crate::handlers::upstream_handler,
        crate::handlers::subscribe_handler,
        crate::handlers::unsubscribe_handler,
        crate::handlers::event_handler,
    ),
    components(
        schemas(
            RegisterRequest,
            StatusResponse,
            UpstreamResponse,
            TopicRequest,
            SubscriptionResponse,
            EventResponse,
            SessionSnapshot,
            SessionStatus,
            SubscriptionOutcome,
            DownstreamMessage,
            SdkEvent,
        )
    ),
    tags(
        (name = "Session", description = "Registration, upstream messages and topics")
    ),
    servers(
        (url = "/api", description = "Main API Prefix")
    )
)]
pub struct PlaygroundApiDoc;
