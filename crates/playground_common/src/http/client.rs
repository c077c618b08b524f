// --- File: crates/playground_common/src/http/client.rs ---
use reqwest::{Client, Error as ReqwestError};
use std::time::Duration;

/// Creates a new HTTP client whose requests are bounded by `timeout`.
pub fn create_client(timeout: Duration) -> Result<Client, ReqwestError> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Prefixes `http://` when `host` carries no scheme and drops a trailing slash.
///
/// App-server hosts are typed by hand as `192.168.59.103:4260`, so both forms
/// have to work.
pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
