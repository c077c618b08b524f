//! Service factory implementation.
//!
//! Builds the collaborators of the registration session from the
//! configuration: the push SDK bridge, the app server client and the state
//! store.
use playground_common::{config_error, Context, PlaygroundError};
use playground_config::AppConfig;
use playground_session::{
    app_server_from_config, AppServer, JsonFileStore, MemoryStore, PushSdk, RegistrationSession,
    SessionSettings, StateStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::gateway::GatewayPushSdk;

pub struct PlaygroundServiceFactory {
    config: Arc<AppConfig>,
    sdk: Arc<dyn PushSdk>,
    app_server: Arc<dyn AppServer>,
    store: Arc<dyn StateStore>,
}

impl PlaygroundServiceFactory {
    /// Create the factory from `config`.
    ///
    /// Fails when the push gateway or the selected app server transport is
    /// not configured.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, PlaygroundError> {
        let gateway_url = config
            .push
            .gateway_url
            .as_deref()
            .ok_or_else(|| config_error("push.gateway_url is required"))?;
        let timeout = Duration::from_secs(config.app_server.timeout_secs);

        info!("Using push gateway at {}", gateway_url);
        let sdk: Arc<dyn PushSdk> = Arc::new(
            GatewayPushSdk::new(gateway_url, timeout).context("Failed to build gateway client")?,
        );

        Self::with_sdk(config, sdk)
    }

    /// Same as [`new`](Self::new) with a caller-provided push SDK.
    pub fn with_sdk(config: Arc<AppConfig>, sdk: Arc<dyn PushSdk>) -> Result<Self, PlaygroundError> {
        let app_server =
            app_server_from_config(&config.app_server, sdk.clone(), config.push.time_to_live)
                .map_err(config_error)?;
        info!(
            "App server transport: {:?} ({})",
            config.app_server.transport,
            config.app_server.host.as_deref().unwrap_or("via push transport")
        );

        let store: Arc<dyn StateStore> = match &config.storage.path {
            Some(path) => {
                info!("Persisting registration to {}", path.display());
                Arc::new(JsonFileStore::new(path.clone()))
            }
            None => {
                warn!("storage.path not set, registration will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self {
            config,
            sdk,
            app_server,
            store,
        })
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn push_sdk(&self) -> Arc<dyn PushSdk> {
        self.sdk.clone()
    }

    pub fn app_server(&self) -> Arc<dyn AppServer> {
        self.app_server.clone()
    }

    pub fn state_store(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// A session restored from the state store.
    pub fn session(&self) -> Result<RegistrationSession, PlaygroundError> {
        let session = RegistrationSession::restore(
            self.push_sdk(),
            self.app_server(),
            self.state_store(),
            SessionSettings::from(self.config.as_ref()),
        )?;
        info!("Session ready ({})", session.status());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playground_common::HttpStatusCode;

    #[test]
    fn test_gateway_url_is_required() {
        let err = PlaygroundServiceFactory::new(Arc::new(AppConfig::default()))
            .err()
            .unwrap();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("push.gateway_url"));
    }

    #[test]
    fn test_http_transport_needs_host() {
        let mut config = AppConfig::default();
        config.push.gateway_url = Some("127.0.0.1:4270".to_string());

        let err = PlaygroundServiceFactory::new(Arc::new(config)).err().unwrap();
        assert!(err.to_string().contains("app_server.host"));
    }

    #[test]
    fn test_session_starts_unregistered_without_storage() {
        let mut config = AppConfig::default();
        config.push.gateway_url = Some("127.0.0.1:4270".to_string());
        config.app_server.host = Some("127.0.0.1:4260".to_string());

        let factory = PlaygroundServiceFactory::new(Arc::new(config)).unwrap();
        let session = factory.session().unwrap();
        assert_eq!(
            session.status(),
            playground_session::SessionStatus::Unregistered
        );
    }
}
