use std::path::PathBuf;

use crate::cloner::CloneError;
use crate::source::GitSourceError;
use crate::stage::SyncStage;

/// Error returned by [`SyncEngine::run`](crate::SyncEngine::run).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The content root has no usable `.config/git.yml`. Nothing was changed.
    #[error("sync not configured for {}: {source}", root.display())]
    Configuration {
        root: PathBuf,
        #[source]
        source: GitSourceError,
    },
    /// The content root path has no final component to back up.
    #[error("invalid content root: {}", .0.display())]
    InvalidRoot(PathBuf),
    /// A step failed. Earlier steps are not rolled back.
    #[error("sync failed during {stage}: {source}")]
    Stage {
        stage: SyncStage,
        #[source]
        source: StageError,
    },
}

impl SyncError {
    pub(crate) fn at(stage: SyncStage, source: impl Into<StageError>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }

    /// The stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Configuration { .. } => Some(SyncStage::LoadSourceConfig),
            Self::InvalidRoot(_) => None,
        }
    }
}

/// Cause of a failed sync step.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Clone(#[from] CloneError),
    #[error("failed to encode sync marker: {0}")]
    Marker(#[from] serde_json::Error),
}
