//! `folio sync` command implementation.

use std::path::PathBuf;

use clap::Args;
use folio_sync::{SyncEngine, SyncMarker};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the sync command.
#[derive(Args)]
pub(crate) struct SyncArgs {
    /// Content root to replace.
    content_root: PathBuf,

    /// Directory for the temporary checkout (default: system temp dir).
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Run even if a previous sync of this root did not finish.
    #[arg(long)]
    force: bool,

    /// Log at INFO level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl SyncArgs {
    /// Execute the sync command.
    ///
    /// # Errors
    ///
    /// Returns an error if a previous sync was interrupted (without `--force`)
    /// or if any sync step fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let root = self.content_root;

        if let Some(marker) = <SyncEngine>::interrupted(&root).await {
            let marker_path = SyncMarker::path_for(&root).unwrap_or_default();
            if !self.force {
                return Err(CliError::Interrupted {
                    root,
                    stage: marker.stage,
                    marker: marker_path,
                });
            }
            output.warning(&format!(
                "Ignoring interrupted sync from {} (stopped during {})",
                marker.started_at, marker.stage
            ));
            if let Some(backup) = &marker.backup_path {
                output.warning(&format!("Its backup may be at {}", backup.display()));
            }
        }

        let mut engine = SyncEngine::new();
        if let Some(dir) = self.scratch_dir {
            engine = engine.scratch_dir(dir);
        }

        output.info(&format!("Syncing {}", root.display()));
        let report = engine.run(&root).await?;

        output.success(&format!(
            "Synced {} from {} ({})",
            report.content_root.display(),
            report.source.url,
            report.source.branch
        ));
        output.info(&format!("Previous content: {}", report.backup_path.display()));
        Ok(())
    }
}
