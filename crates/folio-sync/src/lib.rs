//! Git-based replacement of a Folio content root.
//!
//! [`SyncEngine::run`] reads `.config/git.yml` from a content root, clones the
//! configured repository into a scratch directory, and swaps the checkout in
//! for the live tree:
//!
//! 1. load the repository settings ([`SyncStage::LoadSourceConfig`])
//! 2. clone ([`SyncStage::Clone`])
//! 3. delete `.config/git.yml` from the checkout ([`SyncStage::StripProtectedFile`])
//! 4. rename the live root to `<root>_<YYYYMMDDHHMMSS>` ([`SyncStage::BackupLive`])
//! 5. move the checkout into place ([`SyncStage::InstallNew`])
//! 6. copy `.config/git.yml` back from the backup ([`SyncStage::RestoreProtectedConfig`])
//! 7. remove the scratch directory ([`SyncStage::Cleanup`])
//!
//! The swap is not atomic. Before steps 4 to 6 a [`SyncMarker`] naming the
//! step is written to `<parent>/.<root-name>.sync.json`; it is removed once
//! the sync completes, so a marker found later means a sync stopped midway.

mod cloner;
mod engine;
mod error;
mod fsops;
mod source;
mod stage;

pub use cloner::{CloneError, Cloner, GitCloner};
pub use engine::{SyncEngine, SyncReport};
pub use error::{StageError, SyncError};
pub use source::{DEFAULT_BRANCH, GitSource, GitSourceError};
pub use stage::{SyncMarker, SyncStage};

/// Directory inside a content root holding site configuration.
const CONFIG_DIR: &str = ".config";

/// Repository settings file inside [`CONFIG_DIR`]. Never taken from the
/// repository itself.
const GIT_CONFIG_FILE: &str = "git.yml";
