//! A content root seen through one access token.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ContentError;
use crate::policy::{self, Policy};
use crate::resource::Resource;

/// Target for access audit events.
const AUDIT_TARGET: &str = "folio::audit";

/// Queryable namespace of resources under a content root.
///
/// The policy for the access token is loaded once in [`ResourceCollection::open`]
/// and fixed for the collection's lifetime.
#[derive(Debug, Clone)]
pub struct ResourceCollection {
    root: PathBuf,
    access_token: String,
    default_extension: String,
    policy: Policy,
}

/// Why a lookup produced no resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Miss {
    Rejected,
    Missing,
    Unreadable,
    Forbidden,
}

impl Miss {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Missing => "missing",
            Self::Unreadable => "unreadable",
            Self::Forbidden => "forbidden",
        }
    }
}

impl ResourceCollection {
    /// Open the collection for `access_token`, loading its policy.
    pub async fn open(
        root: impl Into<PathBuf>,
        access_token: impl Into<String>,
        default_extension: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let access_token = access_token.into();
        let policy = policy::load_policy(&root, &access_token)
            .await
            .into_policy();
        Self::with_policy(root, access_token, default_extension, policy)
    }

    /// Collection with an explicit policy, bypassing `.config/policies.yml`.
    pub fn with_policy(
        root: impl Into<PathBuf>,
        access_token: impl Into<String>,
        default_extension: impl Into<String>,
        policy: Policy,
    ) -> Self {
        Self {
            root: root.into(),
            access_token: access_token.into(),
            default_extension: default_extension.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn default_extension(&self) -> &str {
        &self.default_extension
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Approximate heap footprint, used as cache weight.
    pub fn weight(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.root.as_os_str().len()
            + self.access_token.len()
            + self.default_extension.len()
            + self.policy.name.len()
    }

    /// Map a logical path to the root-relative file path it names.
    ///
    /// A final segment without `.` gets the default extension. Returns `None`
    /// when any segment starts with `.`, which also rules out `..`.
    pub fn resolve_path(&self, logical_path: &str) -> Option<String> {
        let segments: Vec<&str> = logical_path.split(['/', '\\']).collect();
        if segments.iter().any(|segment| segment.starts_with('.')) {
            return None;
        }

        let mut path = logical_path.to_owned();
        if let Some(last) = segments.last()
            && !last.is_empty()
            && !last.contains('.')
        {
            path.push('.');
            path.push_str(&self.default_extension);
        }
        Some(path)
    }

    /// Read the resource at `logical_path`, if it exists and the policy allows
    /// it. Forbidden and missing resources are indistinguishable to callers.
    pub async fn get(&self, logical_path: &str) -> Option<Resource> {
        match self.lookup(logical_path).await {
            Ok(resource) => Some(resource),
            Err(miss) => {
                tracing::debug!(
                    target: AUDIT_TARGET,
                    root = %self.root.display(),
                    path = logical_path,
                    outcome = miss.as_str(),
                    "Resource not served"
                );
                None
            }
        }
    }

    async fn lookup(&self, logical_path: &str) -> Result<Resource, Miss> {
        let path = self.resolve_path(logical_path).ok_or(Miss::Rejected)?;

        let resource = match self.read(&path).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return Err(Miss::Missing),
            Err(e) => {
                tracing::error!(error = %e, "Error reading resource");
                return Err(Miss::Unreadable);
            }
        };

        if policy::can_access(&self.policy, &resource, Utc::now()) {
            Ok(resource)
        } else {
            Err(Miss::Forbidden)
        }
    }

    /// Read and parse the file at the root-relative `path`.
    ///
    /// `Ok(None)` when the file does not exist.
    async fn read(&self, path: &str) -> Result<Option<Resource>, ContentError> {
        let file = self.file_path(path);
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                return Ok(None);
            }
            Err(source) => return Err(ContentError::Io { path: file, source }),
        };

        Resource::parse(path, &text)
            .map(Some)
            .map_err(|source| ContentError::Frontmatter {
                path: path.to_owned(),
                source,
            })
    }

    /// Filesystem location of a root-relative path.
    ///
    /// Empty segments are skipped so a leading separator cannot make the path
    /// absolute.
    pub(crate) fn file_path(&self, path: &str) -> PathBuf {
        let mut file = self.root.clone();
        for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
            file.push(segment);
        }
        file
    }
}
