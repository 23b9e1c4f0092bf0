use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::approval::ApprovalStatus;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval {0} already exists")]
    AlreadyExists(String),

    #[error("approval {0} not found")]
    NotFound(String),

    #[error("approval {identifier} is already {status}")]
    AlreadyFinalized {
        identifier: String,
        status: ApprovalStatus,
    },

    #[error("{voter} has already voted on {identifier}")]
    AlreadyVoted { identifier: String, voter: String },

    #[error("invalid approval: {0}")]
    Invalid(String),

    #[error("store error: {0}")]
    Store(anyhow::Error),

    #[error("codec error: {0}")]
    Codec(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApprovalError>;

/// Outbound chat delivery failures. Logged by the dispatcher, never allowed
/// to undo the state change that caused the post.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat api error: {0}")]
    Api(String),

    #[error("chat post timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("chat post cancelled")]
    Cancelled,
}

impl IntoResponse for ApprovalError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            ApprovalError::AlreadyExists(_) => {
                (StatusCode::CONFLICT, "already_exists", self.to_string())
            }
            ApprovalError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            ApprovalError::AlreadyFinalized { .. } => {
                (StatusCode::CONFLICT, "already_finalized", self.to_string())
            }
            ApprovalError::AlreadyVoted { .. } => {
                (StatusCode::CONFLICT, "already_voted", self.to_string())
            }
            ApprovalError::Invalid(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request", self.to_string())
            }
            ApprovalError::Store(e) | ApprovalError::Codec(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApprovalError::AlreadyExists("p/r:1".into()), StatusCode::CONFLICT),
            (ApprovalError::NotFound("p/r:1".into()), StatusCode::NOT_FOUND),
            (ApprovalError::Invalid("votes".into()), StatusCode::BAD_REQUEST),
            (
                ApprovalError::Store(anyhow::anyhow!("redis down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_finalized_message_names_status() {
        let err = ApprovalError::AlreadyFinalized {
            identifier: "p/r:1".into(),
            status: ApprovalStatus::Rejected,
        };
        assert_eq!(err.to_string(), "approval p/r:1 is already rejected");
    }
}
