//! Error types for reading and decoding resources.
//!
//! Lookups never surface these to callers: a failed read is logged and the
//! resource is treated as absent.

use std::path::PathBuf;

use crate::frontmatter::FrontmatterError;

/// Failure while reading or decoding a single resource.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Filesystem error other than "not found".
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Frontmatter could not be split or parsed.
    #[error("failed to parse {path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },
    /// A `structure` body is not valid JSON or YAML.
    #[error("failed to parse structure body of {path}: {message}")]
    Structure { path: String, message: String },
}
