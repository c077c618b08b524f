use std::fmt;
use thiserror::Error;

/// The base error type shared by the playground crates.
///
/// Crate-specific errors convert into this via `From` so that the HTTP layer
/// can render any of them the same way.
#[derive(Error, Debug)]
pub enum PlaygroundError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation not permitted in the current state
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error reported by an external collaborator (push SDK, app server)
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for PlaygroundError {
    fn status_code(&self) -> u16 {
        match self {
            PlaygroundError::HttpError(_) => 500,
            PlaygroundError::ParseError(_) => 400,
            PlaygroundError::ConfigError(_) => 500,
            PlaygroundError::ValidationError(_) => 400,
            PlaygroundError::ConflictError(_) => 409,
            PlaygroundError::ExternalServiceError { .. } => 502,
            PlaygroundError::TimeoutError(_) => 504,
            PlaygroundError::InternalError(_) => 500,
        }
    }
}

/// Adds a context message to an error while converting it.
pub trait Context<T, E> {
    fn context<C>(self, context: C) -> Result<T, PlaygroundError>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E: std::error::Error + Send + Sync + 'static> Context<T, E> for Result<T, E> {
    fn context<C>(self, context: C) -> Result<T, PlaygroundError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|error| PlaygroundError::InternalError(format!("{}: {}", context, error)))
    }
}

impl From<reqwest::Error> for PlaygroundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlaygroundError::TimeoutError(err.to_string())
        } else {
            PlaygroundError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PlaygroundError {
    fn from(err: serde_json::Error) -> Self {
        PlaygroundError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for PlaygroundError {
    fn from(err: std::io::Error) -> Self {
        PlaygroundError::InternalError(err.to_string())
    }
}

pub fn config_error<T: fmt::Display>(message: T) -> PlaygroundError {
    PlaygroundError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> PlaygroundError {
    PlaygroundError::ValidationError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> PlaygroundError {
    PlaygroundError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> PlaygroundError {
    PlaygroundError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> PlaygroundError {
    PlaygroundError::InternalError(message.to_string())
}
