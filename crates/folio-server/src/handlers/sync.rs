//! Content sync endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use folio_sync::SyncEngine;
use serde::Serialize;

use crate::error::ServerError;
use crate::middleware::context::RequestContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct SyncResponse {
    content_root: PathBuf,
    backup_path: PathBuf,
    repository: String,
    branch: String,
    /// Cache entries dropped for the root.
    flushed: usize,
}

/// Handle POST /_api/sync.
///
/// Syncs of one root run one at a time. A root with a leftover marker from
/// an interrupted sync is refused until the marker is cleared by hand.
pub(crate) async fn sync_content(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<SyncResponse>, ServerError> {
    let sync = state.sync.as_ref().ok_or(ServerError::SyncDisabled)?;
    let root = ctx.content_root;

    let lock = sync.lock_for(&root);
    let _guard = lock.lock().await;

    if let Some(marker) = <SyncEngine>::interrupted(&root).await {
        return Err(ServerError::SyncInterrupted {
            root,
            stage: marker.stage,
        });
    }

    let result = sync.engine.run(&root).await;
    // Any stage past the backup may have changed the tree under the caches.
    let flushed = state.resolver.flush_root(&root);
    let report = result?;

    Ok(Json(SyncResponse {
        content_root: report.content_root,
        backup_path: report.backup_path,
        repository: report.source.url,
        branch: report.source.branch,
        flushed,
    }))
}
