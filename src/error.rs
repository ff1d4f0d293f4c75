use thiserror::Error;

/// Failures raised by the derived-metric classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

impl ClassifyError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(std::path::PathBuf),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Failures raised while talking to the analytics backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Required input was missing or malformed; nothing was sent.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend rejected the bearer token and the session was cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// The backend refused the email and password at login.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The envelope came back with `success: false`.
    #[error("backend error: {0}")]
    Api(String),

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session storage error: {0}")]
    Session(#[from] std::io::Error),
}

impl ClientError {
    /// Stable label for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::SessionExpired => "session_expired",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Api(_) => "api",
            Self::Decode(_) => "decode",
            Self::Session(_) => "session",
        }
    }
}
