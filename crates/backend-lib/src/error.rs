// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Everything that can go wrong while running a contest session.
///
/// All variants are local to the originating connection: they surface as
/// an `error` event (or an HTTP status on the auth routes) and never tear
/// down the connection or the process.
#[derive(Error, Debug)]
pub enum ContestError {
    #[error("connection is not authenticated")]
    Unauthenticated,

    #[error("you have already submitted a track this session")]
    DuplicateSubmission,

    #[error("could not look up track: {0}")]
    TrackLookupFailed(String),

    #[error("could not store track audio: {0}")]
    AssetPersistFailed(String),

    #[error("no votes remaining")]
    InsufficientVotes,

    #[error("no submission at index {0}")]
    NoSuchSubmission(usize),

    #[error("event is not valid in the current phase")]
    PhaseViolation,

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ContestError {
    /// Get the HTTP status code for this error (auth and asset routes).
    pub fn status_code(&self) -> StatusCode {
        match self {
            ContestError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ContestError::DuplicateSubmission
            | ContestError::InsufficientVotes
            | ContestError::PhaseViolation => StatusCode::CONFLICT,
            ContestError::NoSuchSubmission(_) => StatusCode::NOT_FOUND,
            ContestError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            ContestError::TrackLookupFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Dropped with a log line instead of an `error` event.
    ///
    /// Phase-gated and unparseable events are intentionally silent so a
    /// stale client can never spam every participant with error toasts.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            ContestError::PhaseViolation | ContestError::MalformedEvent(_)
        )
    }

    /// Message carried by the outbound `error` event.
    pub fn client_message(&self) -> String {
        match self {
            ContestError::Io(_) | ContestError::Json(_) | ContestError::Internal(_) => {
                "internal server error".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ContestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": { "message": self.client_message() }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ContestError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ContestError::Internal("contest actor is gone".to_string())
    }
}
