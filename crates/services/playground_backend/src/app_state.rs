use playground_common::PlaygroundError;
use playground_config::AppConfig;
use playground_session::{SessionActor, SessionHandle};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::service_factory::PlaygroundServiceFactory;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Front end of the session actor; cheap to clone
    pub session: SessionHandle,
}

impl AppState {
    /// Restores the session through `factory` and starts its actor.
    ///
    /// The returned task ends once every clone of the state is dropped.
    pub fn new(factory: &PlaygroundServiceFactory) -> Result<(Self, JoinHandle<()>), PlaygroundError> {
        let (session, task) = SessionActor::spawn(factory.session()?);
        Ok((
            Self {
                config: factory.config().clone(),
                session,
            },
            task,
        ))
    }
}
