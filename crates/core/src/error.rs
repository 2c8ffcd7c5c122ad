use thiserror::Error;

/// Failures surfaced by an `IssueService` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed seed data: {0}")]
    Seed(String),
}

pub type ServiceResult<T> = std::result::Result<T, IssueServiceError>;
