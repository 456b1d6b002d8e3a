//! Application-level error types shared by the storage, fetch, and refresh
//! paths. Kept separate from [`super::pipeline::PipelineError`] so that a
//! single enum doesn't have to carry both "what went wrong internally" and
//! "what rcode does the client see".

/// Result alias using the crate's [`AppError`] as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced while talking to the external profile storage
/// collaborator.
#[derive(Debug)]
pub enum StorageError {
    /// Credentials were rejected. Surfaced as-is, never retried.
    Authentication(String),
    /// The request was malformed. Surfaced as-is, never retried.
    BadRequest(String),
    /// The caller is being throttled; `retry_after` is the hint supplied
    /// by the storage backend, if any.
    RateLimited { retry_after: Option<std::time::Duration> },
    /// A quota was exceeded. Surfaced up, but never reported to an error
    /// collector.
    QuotaExceeded(String),
    /// Any other transport-level failure (network, deserialization).
    Transport(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication(msg) => write!(f, "storage authentication failed: {msg}"),
            Self::BadRequest(msg) => write!(f, "storage rejected request: {msg}"),
            Self::RateLimited { retry_after } => {
                write!(f, "storage rate-limited request")?;
                if let Some(d) = retry_after {
                    write!(f, " (retry after {:.1}s)", d.as_secs_f64())?;
                }
                Ok(())
            }
            Self::QuotaExceeded(msg) => write!(f, "storage quota exceeded: {msg}"),
            Self::Transport(msg) => write!(f, "storage transport error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Unified error type for decode, parse, I/O, and storage failures that
/// occur outside the hot request path (filter-list fetch, allowlist
/// refresh, profile-DB refresh, filesystem-cache read/write).
#[derive(Debug)]
pub enum AppError {
    /// A downloaded or on-disk artifact failed a structural check (too
    /// small, wrong magic, version mismatch).
    Malformed(String),
    /// Decoding (hex/base64/utf8) of a parsed value failed.
    Decode(String),
    /// An I/O failure (file read/write, HTTP transport).
    Io(String),
    /// The external profile store reported a failure.
    Storage(StorageError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed input: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Io(msg) => write!(f, "i/o error: {msg}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(value: bincode::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::Io(value.to_string())
    }
}
