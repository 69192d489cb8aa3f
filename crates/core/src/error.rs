use thiserror::Error;

/// Error taxonomy shared by every component in this crate. `sfuctl-api` maps
/// each variant onto an HTTP status code; the administrator socket maps it
/// onto `{error: string}`.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous room")]
    Ambiguous(Vec<String>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("transient: {0}")]
    Transient(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
