use axum::http::StatusCode;

use super::repository::RepositoryError;

/// Error raised by the drive engine.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// Malformed input or a violated sequencing/date invariant.
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PlacementError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PlacementError::Validation(_) => StatusCode::BAD_REQUEST,
            PlacementError::NotFound(_) | PlacementError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            PlacementError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            PlacementError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
