//! Error types for bill-parser.

use crate::pipeline::types::Disposition;

/// Top-level error type for a parser run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Message source error: {0}")]
    Source(#[from] SourceError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// OAuth token errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token file {path} not readable: {reason}")]
    TokenFile { path: String, reason: String },

    #[error("Client secret file {path} not readable: {reason}")]
    CredentialsFile { path: String, reason: String },

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Access token expired and no refresh is possible: {0}")]
    Expired(String),

    #[error("Authorization failed: {0}")]
    Consent(String),
}

/// Transport decoding failure for a single body part.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid url-safe base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Amount extraction failure.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to find dollar amounts in email text")]
    NoAmountFound,
}

/// Record construction failure.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("internal date {0} ms is out of range")]
    InvalidTimestamp(i64),
}

/// Why a single message did not become a record.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no decodable text part")]
    NoText,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("failed to create record; {0}")]
    Build(#[from] BuildError),
}

impl ProcessError {
    /// Terminal state of the skipped message.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::NoText => Disposition::SkippedNoText,
            Self::Extract(_) => Disposition::SkippedNoAmount,
            Self::Build(_) => Disposition::SkippedBuildError,
        }
    }
}

/// Mail provider errors (fetch, list, acknowledge).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Label {0:?} not found in mailbox")]
    LabelNotFound(String),

    #[error("Malformed message {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("Refusing to acknowledge an empty message id list")]
    EmptyAcknowledgment,

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Time-series store errors, counted per record by the writer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("write returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("record has an empty category and cannot be written as a measurement")]
    EmptyMeasurement,
}

/// Result type alias for parser runs.
pub type Result<T> = std::result::Result<T, Error>;
