// File: services/playground_backend/src/main.rs
use axum::Router;
use playground_backend::{routes, AppState, PlaygroundServiceFactory};
use playground_common::{init_from_config, log_result};
use playground_config::load_config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(load_config()?);
    // Held until exit so the file appender flushes.
    let _log_guard = init_from_config(&config.logging);

    let factory = PlaygroundServiceFactory::new(config.clone())?;
    let (state, _session_task) = log_result(
        AppState::new(&factory),
        "Session actor started",
        "Failed to start the session",
    )?;

    #[allow(unused_mut)] // only mutated with the openapi feature
    let mut app = Router::new().nest("/api", routes(state));

    #[cfg(feature = "openapi")]
    {
        use playground_backend::doc::PlaygroundApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        info!("Adding Swagger UI at /api/docs");
        let swagger_ui =
            SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", PlaygroundApiDoc::openapi());
        app = app.merge(swagger_ui);
    }

    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
