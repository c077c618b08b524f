//! Push registration session for the GCM playground
//!
//! This crate implements the client side of the registration handshake
//! between a device, the push messaging SDK and an application server:
//!
//! - obtain a registration token from the SDK for a sender id
//! - announce it to the app server (`register_new_client`) and wait for the
//!   acknowledgement, matched by correlation id
//! - persist the completed registration so a restart restores it
//! - unregister, send upstream messages and manage topic subscriptions
//!
//! The app server is reached either over HTTP ([`HttpAppServer`]) or through
//! upstream messages on the push transport ([`UpstreamAppServer`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use playground_session::{
//!     app_server_from_config, MemoryStore, PushSdk, RegistrationSession, SessionActor,
//!     SessionSettings,
//! };
//! use playground_config::AppConfig;
//! use std::sync::Arc;
//!
//! async fn start(config: &AppConfig, sdk: Arc<dyn PushSdk>) {
//!     let app_server = app_server_from_config(&config.app_server, sdk.clone(), None).unwrap();
//!     let session = RegistrationSession::restore(
//!         sdk,
//!         app_server,
//!         Arc::new(MemoryStore::new()),
//!         SessionSettings::from(config),
//!     )
//!     .unwrap();
//!     let (handle, _task) = SessionActor::spawn(session);
//!     handle.register("436520785863", Some("deviceA".into())).await.unwrap();
//! }
//! ```

pub mod actor;
pub mod app_server;
pub mod error;
pub mod models;
pub mod sdk;
pub mod session;
pub mod state;
pub mod store;
pub mod topic;

pub use actor::{SessionActor, SessionCommand, SessionHandle, SessionNotice};
pub use app_server::{
    app_server_from_config, AppServer, AppServerError, Delivery, HttpAppServer, UpstreamAppServer,
};
pub use error::SessionError;
pub use models::{
    AppServerReply, ClientAction, ClientRequest, DownstreamMessage, PersistedState,
    UpstreamMessage,
};
pub use sdk::{PushSdk, SdkError, SdkEvent};
pub use session::{EventOutcome, RegistrationSession, SessionSettings, SubscriptionOutcome};
pub use state::{RegistrationState, SessionSnapshot, SessionStatus};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};
pub use topic::validate_topic;
