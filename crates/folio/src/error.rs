//! CLI error types.

use std::path::PathBuf;

use folio_config::ConfigError;
use folio_sync::{SyncError, SyncStage};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error(
        "a previous sync of {} stopped during {stage}; inspect {} and rerun with --force",
        root.display(),
        marker.display()
    )]
    Interrupted {
        root: PathBuf,
        stage: SyncStage,
        marker: PathBuf,
    },

    #[error("{0}")]
    Server(String),
}
