//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_sync::{SyncError, SyncStage};
use serde_json::json;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `POST /_api/sync` while sync is switched off.
    #[error("Sync is not enabled")]
    SyncDisabled,

    /// A previous sync of this root stopped midway and left its marker.
    #[error("Previous sync of {} stopped during {stage}", root.display())]
    SyncInterrupted { root: PathBuf, stage: SyncStage },

    /// Sync failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::SyncDisabled => (StatusCode::NOT_FOUND, json!({"error": "not found"})),
            Self::SyncInterrupted { root, stage } => (
                StatusCode::CONFLICT,
                json!({
                    "error": self.to_string(),
                    "root": root.display().to_string(),
                    "stage": stage,
                }),
            ),
            Self::Sync(e @ (SyncError::Configuration { .. } | SyncError::InvalidRoot(_))) => {
                (StatusCode::BAD_REQUEST, json!({"error": e.to_string()}))
            }
            Self::Sync(e @ SyncError::Stage { stage, .. }) => {
                tracing::error!(stage = %stage, error = %e, "Sync failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": e.to_string(), "stage": stage}),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
