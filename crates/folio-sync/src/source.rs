//! Repository settings from `.config/git.yml`.
//!
//! ```yaml
//! repository:
//!   url: https://git.example.com/site-content.git
//!   branch: main        # default: master
//!   folder: public      # default: repository root
//! ```

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::{CONFIG_DIR, GIT_CONFIG_FILE};

/// Branch cloned when `repository.branch` is not set.
pub const DEFAULT_BRANCH: &str = "master";

/// Why `.config/git.yml` does not describe a usable repository.
#[derive(Debug, thiserror::Error)]
pub enum GitSourceError {
    #[error("{} does not exist", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no repository url configured")]
    NoUrl,
    #[error("repository folder must be a relative path inside the repository: {0}")]
    InvalidFolder(String),
}

#[derive(Debug, Default, Deserialize)]
struct GitFile {
    #[serde(default)]
    repository: Option<RepositoryEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    folder: Option<String>,
}

/// Where a content root is synced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub branch: String,
    /// Subdirectory of the repository that becomes the content root.
    pub folder: Option<PathBuf>,
}

impl GitSource {
    /// Read `.config/git.yml` from the content root at `root`.
    pub async fn load(root: &Path) -> Result<Self, GitSourceError> {
        let path = root.join(CONFIG_DIR).join(GIT_CONFIG_FILE);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GitSourceError::Missing { path });
            }
            Err(source) => return Err(GitSourceError::Unreadable { path, source }),
        };
        Self::parse(&text).map_err(|e| match e {
            ParseFailure::Yaml(source) => GitSourceError::Malformed { path, source },
            ParseFailure::Invalid(e) => e,
        })
    }

    fn parse(text: &str) -> Result<Self, ParseFailure> {
        let file: Option<GitFile> = if text.trim().is_empty() {
            None
        } else {
            serde_yaml::from_str(text).map_err(ParseFailure::Yaml)?
        };
        let repository = file.and_then(|f| f.repository).unwrap_or_default();

        let url = repository
            .url
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .ok_or(ParseFailure::Invalid(GitSourceError::NoUrl))?;

        let branch = repository
            .branch
            .map(|branch| branch.trim().to_owned())
            .filter(|branch| !branch.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_owned());

        let folder = match repository.folder.as_deref().map(str::trim) {
            None | Some("" | "/" | ".") => None,
            Some(folder) => Some(checked_folder(folder)?),
        };

        Ok(Self {
            url,
            branch,
            folder,
        })
    }
}

enum ParseFailure {
    Yaml(serde_yaml::Error),
    Invalid(GitSourceError),
}

/// The folder must stay inside the checkout.
fn checked_folder(folder: &str) -> Result<PathBuf, ParseFailure> {
    let path = Path::new(folder.trim_end_matches('/'));
    let inside = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(path.to_path_buf())
    } else {
        Err(ParseFailure::Invalid(GitSourceError::InvalidFolder(
            folder.to_owned(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(text: &str) -> Result<GitSource, GitSourceError> {
        GitSource::parse(text).map_err(|e| match e {
            ParseFailure::Yaml(source) => GitSourceError::Malformed {
                path: PathBuf::from("git.yml"),
                source,
            },
            ParseFailure::Invalid(e) => e,
        })
    }

    #[test]
    fn test_parse_full() {
        let source = parse(
            "repository:\n  url: https://example.com/site.git\n  branch: main\n  folder: public/\n",
        )
        .unwrap();
        assert_eq!(
            source,
            GitSource {
                url: "https://example.com/site.git".to_owned(),
                branch: "main".to_owned(),
                folder: Some(PathBuf::from("public")),
            }
        );
    }

    #[test]
    fn test_parse_defaults() {
        let source = parse("repository:\n  url: git@example.com:site.git\n").unwrap();
        assert_eq!(source.branch, DEFAULT_BRANCH);
        assert_eq!(source.folder, None);
    }

    #[test]
    fn test_parse_without_url() {
        assert!(matches!(parse("repository:\n  branch: main\n"), Err(GitSourceError::NoUrl)));
        assert!(matches!(parse("other: 1\n"), Err(GitSourceError::NoUrl)));
        assert!(matches!(parse(""), Err(GitSourceError::NoUrl)));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse("repository: [oops"),
            Err(GitSourceError::Malformed { .. })
        ));
    }

    #[test]
    fn test_folder_cannot_escape_checkout() {
        let err = parse("repository:\n  url: u\n  folder: ../elsewhere\n").unwrap_err();
        assert!(matches!(err, GitSourceError::InvalidFolder(_)));
        let err = parse("repository:\n  url: u\n  folder: /etc\n").unwrap_err();
        assert!(matches!(err, GitSourceError::InvalidFolder(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitSource::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, GitSourceError::Missing { .. }));
    }
}
