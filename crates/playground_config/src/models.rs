// --- File: crates/playground_config/src/models.rs ---

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8086
}

// --- Push SDK Config ---
// The gateway fronts the vendor SDK; without it the backend cannot issue tokens.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    /// Default sender id used when a register request omits one.
    #[serde(default)]
    pub sender_id: Option<String>,
    /// Prefix every topic name must carry, e.g. "/topics/".
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Base URL of the push gateway, e.g. "http://127.0.0.1:4260".
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Time to live (seconds) attached to upstream messages.
    #[serde(default)]
    pub time_to_live: Option<u32>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            sender_id: None,
            topic_prefix: default_topic_prefix(),
            gateway_url: None,
            time_to_live: None,
        }
    }
}

fn default_topic_prefix() -> String {
    "/topics/".to_string()
}

// --- App Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppServerTransport {
    /// Plain HTTP/JSON calls against `{host}/clients`.
    #[default]
    Http,
    /// Actions tunnelled as upstream messages through the push SDK.
    Upstream,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppServerConfig {
    #[serde(default)]
    pub transport: AppServerTransport,
    /// Host with optional port and scheme, e.g. "192.168.59.103:4260".
    #[serde(default)]
    pub host: Option<String>,
    /// Upper bound on one app-server round trip.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AppServerConfig {
    fn default() -> Self {
        Self {
            transport: AppServerTransport::default(),
            host: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

// --- Local Storage Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageConfig {
    /// JSON file holding the persisted registration. In-memory when unset.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// --- Logging Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Directory for daily rolling log files; stdout only when unset.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub app_server: AppServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
