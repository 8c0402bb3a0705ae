//! The sync procedure.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;

use crate::cloner::{Cloner, GitCloner};
use crate::error::SyncError;
use crate::fsops;
use crate::source::GitSource;
use crate::stage::{SyncMarker, SyncStage};
use crate::{CONFIG_DIR, GIT_CONFIG_FILE};

/// Format of the timestamp appended to backup directories.
const BACKUP_SUFFIX_FORMAT: &str = "%Y%m%d%H%M%S";

/// Directory name of the checkout inside the scratch directory.
const CHECKOUT_DIR: &str = "checkout";

/// Result of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub content_root: PathBuf,
    /// Where the previous content now lives.
    pub backup_path: PathBuf,
    pub source: GitSource,
}

/// Replaces content roots with fresh checkouts of their configured repository.
///
/// The engine does not lock the root and does not touch any cache; callers
/// serialize syncs per root and flush caches afterwards.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine<C = GitCloner> {
    cloner: C,
    scratch_dir: Option<PathBuf>,
}

impl SyncEngine<GitCloner> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Cloner> SyncEngine<C> {
    pub fn with_cloner(cloner: C) -> Self {
        Self {
            cloner,
            scratch_dir: None,
        }
    }

    /// Create checkouts under `dir` instead of the system temp directory.
    ///
    /// Choosing a directory on the same filesystem as the content roots lets
    /// the install step rename instead of copy.
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// The marker left by a sync of `root` that did not finish.
    pub async fn interrupted(root: &Path) -> Option<SyncMarker> {
        SyncMarker::read(&normalize(root)).await
    }

    /// Replace the content root at `root` with its repository checkout.
    ///
    /// On success the previous content is kept at `<root>_<YYYYMMDDHHMMSS>`
    /// and `.config/git.yml` is carried over from it.
    pub async fn run(&self, root: &Path) -> Result<SyncReport, SyncError> {
        let root = normalize(root);
        let marker_path =
            SyncMarker::path_for(&root).ok_or_else(|| SyncError::InvalidRoot(root.clone()))?;

        let source = GitSource::load(&root)
            .await
            .map_err(|source| SyncError::Configuration {
                root: root.clone(),
                source,
            })?;
        tracing::info!(root = %root.display(), url = %source.url, branch = %source.branch, "Starting content sync");

        let scratch = self.make_scratch().map_err(|e| SyncError::at(SyncStage::Clone, e))?;
        let checkout = scratch.path().join(CHECKOUT_DIR);
        self.cloner
            .clone_repo(&source.url, &source.branch, &checkout)
            .await
            .map_err(|e| SyncError::at(SyncStage::Clone, e))?;

        let new_root = match &source.folder {
            Some(folder) => checkout.join(folder),
            None => checkout,
        };
        if !tokio::fs::metadata(&new_root)
            .await
            .map_err(|e| SyncError::at(SyncStage::Clone, e))?
            .is_dir()
        {
            return Err(SyncError::at(SyncStage::Clone, std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", new_root.display()),
            )));
        }

        let new_git_config = new_root.join(CONFIG_DIR).join(GIT_CONFIG_FILE);
        log_step(SyncStage::StripProtectedFile, &new_git_config, None);
        fsops::remove_file_if_exists(&new_git_config)
            .await
            .map_err(|e| SyncError::at(SyncStage::StripProtectedFile, e))?;

        let backup_path = backup_path_for(&root)?;
        if tokio::fs::try_exists(&backup_path).await.unwrap_or(false) {
            return Err(SyncError::at(SyncStage::BackupLive, std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("backup {} already exists", backup_path.display()),
            )));
        }
        let mut marker = SyncMarker {
            stage: SyncStage::BackupLive,
            content_root: root.clone(),
            backup_path: Some(backup_path.clone()),
            scratch_path: Some(scratch.path().to_path_buf()),
            started_at: Utc::now(),
        };

        enter(&mut marker, SyncStage::BackupLive, &marker_path).await?;
        log_step(SyncStage::BackupLive, &root, Some(&backup_path));
        if let Err(e) = tokio::fs::rename(&root, &backup_path).await {
            // The live root was not moved, so there is nothing to recover.
            if let Err(cleanup) = fsops::remove_file_if_exists(&marker_path).await {
                tracing::warn!(path = %marker_path.display(), error = %cleanup, "Failed to remove sync marker");
            }
            return Err(SyncError::at(SyncStage::BackupLive, e));
        }
        // From here on the marker refers to the scratch directory, so it must
        // outlive a failed step.
        let scratch_path = scratch.keep();

        enter(&mut marker, SyncStage::InstallNew, &marker_path).await?;
        log_step(SyncStage::InstallNew, &new_root, Some(&root));
        fsops::move_dir(&new_root, &root)
            .await
            .map_err(|e| SyncError::at(SyncStage::InstallNew, e))?;

        enter(&mut marker, SyncStage::RestoreProtectedConfig, &marker_path)
            .await?;
        let live_config_dir = root.join(CONFIG_DIR);
        let live_git_config = live_config_dir.join(GIT_CONFIG_FILE);
        let backup_git_config = backup_path.join(CONFIG_DIR).join(GIT_CONFIG_FILE);
        log_step(
            SyncStage::RestoreProtectedConfig,
            &backup_git_config,
            Some(&live_git_config),
        );
        tokio::fs::create_dir_all(&live_config_dir)
            .await
            .map_err(|e| SyncError::at(SyncStage::RestoreProtectedConfig, e))?;
        tokio::fs::copy(&backup_git_config, &live_git_config)
            .await
            .map_err(|e| SyncError::at(SyncStage::RestoreProtectedConfig, e))?;

        log_step(SyncStage::Cleanup, &scratch_path, None);
        tokio::fs::remove_dir_all(&scratch_path)
            .await
            .map_err(|e| SyncError::at(SyncStage::Cleanup, e))?;
        fsops::remove_file_if_exists(&marker_path)
            .await
            .map_err(|e| SyncError::at(SyncStage::Cleanup, e))?;

        tracing::info!(
            root = %root.display(),
            backup = %backup_path.display(),
            stage = %SyncStage::Done,
            "Content sync complete"
        );
        Ok(SyncReport {
            content_root: root,
            backup_path,
            source,
        })
    }

    fn make_scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("folio-sync-");
        match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }
}

/// Record `stage` in the marker before running it.
async fn enter(
    marker: &mut SyncMarker,
    stage: SyncStage,
    marker_path: &Path,
) -> Result<(), SyncError> {
    marker.stage = stage;
    marker
        .write(marker_path)
        .await
        .map_err(|source| SyncError::Stage { stage, source })
}

/// Drop trailing separators and `.` components so the root has a usable
/// final component.
fn normalize(root: &Path) -> PathBuf {
    root.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn backup_path_for(root: &Path) -> Result<PathBuf, SyncError> {
    let name = root
        .file_name()
        .ok_or_else(|| SyncError::InvalidRoot(root.to_path_buf()))?
        .to_string_lossy();
    let suffix = Utc::now().format(BACKUP_SUFFIX_FORMAT);
    Ok(root.with_file_name(format!("{name}_{suffix}")))
}

fn log_step(stage: SyncStage, from: &Path, to: Option<&Path>) {
    match to {
        Some(to) => {
            tracing::info!(stage = %stage, from = %from.display(), to = %to.display(), "Sync step");
        }
        None => tracing::info!(stage = %stage, path = %from.display(), "Sync step"),
    }
}
