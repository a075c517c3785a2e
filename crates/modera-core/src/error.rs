use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Error taxonomy for the moderation pipeline.
///
/// Storage and infrastructure errors wrap their underlying cause once here
/// and propagate to the service boundary unchanged; nothing re-classifies
/// an error further up the call chain.
#[derive(Debug, thiserror::Error)]
pub enum ModeraError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("seller {0} not found")]
    SellerNotFound(i64),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error("bus unavailable: {0}")]
    BusUnavailable(#[source] anyhow::Error),

    #[error("scorer not loaded: {0}")]
    ScorerNotLoaded(String),

    #[error("scorer failed: {0}")]
    ScorerFailed(#[source] anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ModeraError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::SellerNotFound(_) => StatusCode::NOT_FOUND,
            Self::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BusUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ScorerNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ScorerFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::SellerNotFound(_) => "SellerNotFound",
            Self::StorageUnavailable(_) => "StorageUnavailable",
            Self::BusUnavailable(_) => "BusUnavailable",
            Self::ScorerNotLoaded(_) => "ScorerNotLoaded",
            Self::ScorerFailed(_) => "ScorerFailed",
            Self::InvalidInput(_) => "InvalidInput",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    r#type: &'static str,
    message: String,
}

impl IntoResponse for ModeraError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorBody {
            r#type: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ModeraError>;

/// Classifies a raw `sqlx::Error` into the taxonomy above: unique-violation
/// and foreign-key violation get a domain-specific variant, everything
/// else is an infrastructure failure.
pub(crate) trait DbErrorExt {
    fn into_modera_error(self, message: impl Into<String>) -> ModeraError;
}

impl DbErrorExt for sqlx::Error {
    fn into_modera_error(self, message: impl Into<String>) -> ModeraError {
        if let sqlx::Error::Database(ref db) = self {
            if db.is_unique_violation() {
                return ModeraError::AlreadyExists(message.into());
            }
        }
        ModeraError::StorageUnavailable(anyhow::Error::new(self).context(message.into()))
    }
}
