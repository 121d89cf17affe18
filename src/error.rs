//! Error types for the Avalab CLI

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::upload::Phase;

/// Result type alias for Avalab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Avatar(#[from] AvatarError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure inside the upload sequence, tagged with the phase it happened in
    #[error("Upload failed while {}: {source}", .phase.label())]
    Upload { phase: Phase, source: Box<Error> },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Coarse classification of every error the CLI can surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotAuthenticated,
    AuthExpiredRefreshFailed,
    RequestFailed,
    DecodeFailed,
    BuildFailed,
    ValidationFailed,
    Cancelled,
    Config,
    Storage,
    Other,
}

impl Error {
    /// Classify this error. Upload failures report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Api(ApiError::RequestFailed(_)) => ErrorKind::RequestFailed,
            Error::Api(ApiError::DecodeFailed { .. }) => ErrorKind::DecodeFailed,
            Error::Auth(AuthError::NotAuthenticated) => ErrorKind::NotAuthenticated,
            Error::Auth(AuthError::RefreshFailed(_)) => ErrorKind::AuthExpiredRefreshFailed,
            Error::Auth(_) => ErrorKind::Other,
            Error::Avatar(AvatarError::BuildFailed(_)) => ErrorKind::BuildFailed,
            Error::Avatar(AvatarError::ValidationFailed(_)) => ErrorKind::ValidationFailed,
            Error::Config(_) => ErrorKind::Config,
            Error::Store(_) => ErrorKind::Storage,
            Error::Upload { source, .. } => source.kind(),
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) | Error::Dialoguer(_) | Error::Json(_) | Error::Other(_) => {
                ErrorKind::Other
            }
        }
    }

    /// The server-side failure details behind this error, if any
    pub fn request_failure(&self) -> Option<&RequestFailure> {
        match self {
            Error::Api(ApiError::RequestFailed(failure)) => Some(failure),
            Error::Auth(AuthError::RefreshFailed(api)) => match api.as_ref() {
                ApiError::RequestFailed(failure) => Some(failure),
                ApiError::DecodeFailed { .. } => None,
            },
            Error::Upload { source, .. } => source.request_failure(),
            _ => None,
        }
    }
}

/// Raw server body on its own line, if there is one
fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{}", body)
    }
}

/// Raw details of a failed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    /// HTTP status, absent for transport errors
    pub status: Option<u16>,
    /// Transport or protocol error text
    pub error: String,
    /// Raw response body
    pub body: String,
    /// Value of the `X-Avalab-Request-ID` response header
    pub request_id: Option<String>,
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.error, body_suffix(&self.body))?;
        if let Some(request_id) = &self.request_id {
            write!(f, "\n(request id: {})", request_id)?;
        }
        Ok(())
    }
}

/// API-related errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    RequestFailed(RequestFailure),

    #[error("Invalid API response: {message}{}", body_suffix(.body))]
    DecodeFailed { message: String, body: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let error = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            format!("Failed to connect to API: {}", err)
        } else {
            err.to_string()
        };
        ApiError::RequestFailed(RequestFailure {
            status: err.status().map(|s| s.as_u16()),
            error,
            body: String::new(),
            request_id: None,
        })
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not signed in to Avalab. Run `avalab login` to authenticate.")]
    NotAuthenticated,

    #[error("Access token expired and could not be refreshed (run `avalab login` again): {0}")]
    RefreshFailed(Box<ApiError>),

    #[error(
        "Port {port} is already in use, so the login redirect cannot be received. Free it or set `redirect_port` in the config."
    )]
    PortInUse { port: u16 },

    #[error("Redirect listener error: {0}")]
    Listener(String),

    #[error("No authorization code received within {0:?}")]
    LoginTimedOut(Duration),
}

/// Avatar packaging and validation errors
#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Avatar build failed: {0}")]
    BuildFailed(String),

    #[error("Avatar validation failed:\n  - {}", .0.join("\n  - "))]
    ValidationFailed(Vec<String>),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("API key not configured. Set `api_key` in the config file or AVALAB_API_KEY.")]
    MissingApiKey,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Local preference storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine home directory")]
    NoHome,

    #[error("Preference store I/O error: {0}")]
    Io(String),

    #[error("Preference store database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Preference store lock poisoned")]
    Poisoned,
}
