use thiserror::Error;

/// Failures of the hosted conversation store
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend is not configured: {0} is not set")]
    NotConfigured(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("The backend rejected the session credentials")]
    Unauthorized,

    #[error("Request to the backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Could not decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Could not encode query filter: {0}")]
    Filter(#[from] serde_urlencoded::ser::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A chat request body that does not match any supported shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request format")]
    InvalidFormat,

    #[error("Messages must not be empty")]
    EmptyMessages,
}

/// Failures of the hosted auth API
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Backend is not configured: {0} is not set")]
    NotConfigured(&'static str),

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Session expired, sign in again")]
    SessionExpired,

    #[error("Request to the auth service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth service returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Failures while preparing or sending documents
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No files left to upload after filtering")]
    NothingToUpload,

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload service returned {status}: {message}")]
    Api { status: u16, message: String },
}
