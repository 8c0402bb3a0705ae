//! Sync stages and the on-disk progress marker.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Steps of a sync, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    LoadSourceConfig,
    Clone,
    StripProtectedFile,
    BackupLive,
    InstallNew,
    RestoreProtectedConfig,
    Cleanup,
    Done,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadSourceConfig => "load_source_config",
            Self::Clone => "clone",
            Self::StripProtectedFile => "strip_protected_file",
            Self::BackupLive => "backup_live",
            Self::InstallNew => "install_new",
            Self::RestoreProtectedConfig => "restore_protected_config",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress record written next to the content root while a sync changes it.
///
/// A marker that is still present after the process exits shows the stage
/// at which a sync stopped, and where the backup and checkout are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub stage: SyncStage,
    pub content_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl SyncMarker {
    /// Marker location for `root`: `<parent>/.<name>.sync.json`.
    ///
    /// `None` when `root` has no final component.
    pub fn path_for(root: &Path) -> Option<PathBuf> {
        let name = root.file_name()?.to_string_lossy();
        let parent = root.parent().unwrap_or_else(|| Path::new(""));
        Some(parent.join(format!(".{name}.sync.json")))
    }

    pub(crate) async fn write(&self, path: &Path) -> Result<(), crate::StageError> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Read the marker for `root`, if one exists.
    pub(crate) async fn read(root: &Path) -> Option<Self> {
        let path = Self::path_for(root)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read sync marker");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse sync marker");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_path() {
        assert_eq!(
            SyncMarker::path_for(Path::new("/srv/sites/example")),
            Some(PathBuf::from("/srv/sites/.example.sync.json"))
        );
        assert_eq!(
            SyncMarker::path_for(Path::new("site")),
            Some(PathBuf::from(".site.sync.json"))
        );
        assert_eq!(SyncMarker::path_for(Path::new("/")), None);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncStage::RestoreProtectedConfig).unwrap(),
            "\"restore_protected_config\""
        );
        assert_eq!(SyncStage::BackupLive.to_string(), "backup_live");
    }
}
