//! Access policies.
//!
//! A content root may carry `.config/policies.yml`, a mapping from access
//! token to policy:
//!
//! ```yaml
//! default:
//!   name: public
//!   scope: published
//! editor-token:
//!   name: editors
//!   scope: all
//! ```
//!
//! Requests without a token use the `default` entry. When the file or the
//! entry is absent the built-in [`Policy::default`] applies.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::resource::{Resource, Timestamp};
use crate::{CONFIG_DIR, POLICIES_FILE};

/// Key used when the caller has no access token.
const DEFAULT_TOKEN: &str = "default";

/// Which resources a policy exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Nothing is visible.
    None,
    /// Everything is visible.
    All,
    /// Only resources with a `published` date in the past.
    #[default]
    Published,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::Published => "published",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "all" => Some(Self::All),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// A named access scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub scope: Scope,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            name: "published".to_owned(),
            scope: Scope::Published,
        }
    }
}

/// Outcome of reading the policy file for one token.
///
/// Every variant except [`PolicyLoad::Loaded`] falls back to
/// [`Policy::default`], but callers can still tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyLoad {
    /// `.config/policies.yml` does not exist.
    Missing,
    /// The file exists but could not be read.
    Unreadable,
    /// The file is not a valid token-to-policy mapping.
    Malformed(String),
    /// The file has no entry for the token.
    NoEntry,
    Loaded(Policy),
}

impl PolicyLoad {
    /// The effective policy.
    pub fn into_policy(self) -> Policy {
        match self {
            Self::Loaded(policy) => policy,
            Self::Missing | Self::Unreadable | Self::Malformed(_) | Self::NoEntry => {
                Policy::default()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Read the policy for `token` from the content root at `root`.
pub async fn load_policy(root: &Path, token: &str) -> PolicyLoad {
    let path = root.join(CONFIG_DIR).join(POLICIES_FILE);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PolicyLoad::Missing,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read policy file");
            return PolicyLoad::Unreadable;
        }
    };

    let load = parse_policies(&text, token);
    match &load {
        PolicyLoad::Malformed(message) => {
            tracing::error!(path = %path.display(), error = %message, "Failed to parse policy file");
        }
        PolicyLoad::Loaded(policy) => {
            tracing::info!(
                root = %root.display(),
                policy = %policy.name,
                scope = policy.scope.as_str(),
                "Using policy"
            );
        }
        PolicyLoad::Missing | PolicyLoad::Unreadable | PolicyLoad::NoEntry => {}
    }
    load
}

/// Select the entry for `token` from the text of a policy file.
fn parse_policies(text: &str, token: &str) -> PolicyLoad {
    if text.trim().is_empty() {
        return PolicyLoad::NoEntry;
    }

    let entries: Option<BTreeMap<String, PolicyEntry>> = match serde_yaml::from_str(text) {
        Ok(entries) => entries,
        Err(e) => return PolicyLoad::Malformed(e.to_string()),
    };

    let key = if token.is_empty() { DEFAULT_TOKEN } else { token };
    let Some(entry) = entries.and_then(|mut entries| entries.remove(key)) else {
        return PolicyLoad::NoEntry;
    };

    let scope = match entry.scope.as_deref() {
        Some(name) => Scope::from_name(name).unwrap_or_else(|| {
            tracing::warn!(token = key, scope = name, "Unknown policy scope, denying access");
            Scope::None
        }),
        None => Scope::None,
    };

    PolicyLoad::Loaded(Policy {
        name: entry.name.unwrap_or_default(),
        scope,
    })
}

/// Whether `policy` lets a caller see `resource` at time `now`.
pub fn can_access(policy: &Policy, resource: &Resource, now: DateTime<Utc>) -> bool {
    match policy.scope {
        Scope::None => false,
        Scope::All => true,
        Scope::Published => match &resource.published {
            Some(Timestamp::Date(at)) => *at < now,
            Some(Timestamp::Invalid(raw)) => {
                tracing::warn!(path = %resource.path, value = %raw, "Resource contains invalid published date");
                false
            }
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn resource(published: Option<Timestamp>) -> Resource {
        let mut resource = Resource::parse("page.md", "body").unwrap();
        resource.published = published;
        resource
    }

    fn policy(scope: Scope) -> Policy {
        Policy {
            name: "test".to_owned(),
            scope,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn samples() -> Vec<Option<Timestamp>> {
        vec![
            None,
            Some(Timestamp::Invalid("tomorrow".to_owned())),
            Some(Timestamp::Date(now() - Duration::days(1))),
            Some(Timestamp::Date(now())),
            Some(Timestamp::Date(now() + Duration::days(1))),
        ]
    }

    // ── can_access ───────────────────────────────────────────────────

    #[test]
    fn test_scope_all_sees_everything() {
        for published in samples() {
            assert!(can_access(&policy(Scope::All), &resource(published), now()));
        }
    }

    #[test]
    fn test_scope_none_sees_nothing() {
        for published in samples() {
            assert!(!can_access(&policy(Scope::None), &resource(published), now()));
        }
    }

    #[test]
    fn test_scope_published_requires_past_date() {
        let visible: Vec<bool> = samples()
            .into_iter()
            .map(|published| can_access(&policy(Scope::Published), &resource(published), now()))
            .collect();
        // absent, invalid, past, exactly now, future
        assert_eq!(visible, vec![false, false, true, false, false]);
    }

    // ── parse_policies ───────────────────────────────────────────────

    const POLICIES: &str = "\
default:
  name: public
  scope: published
editor:
  name: editors
  scope: all
locked:
  name: locked
  scope: none
odd:
  name: odd
  scope: sometimes
";

    #[test]
    fn test_empty_token_uses_default_entry() {
        assert_eq!(
            parse_policies(POLICIES, ""),
            PolicyLoad::Loaded(Policy {
                name: "public".to_owned(),
                scope: Scope::Published,
            })
        );
    }

    #[test]
    fn test_token_entry() {
        assert_eq!(parse_policies(POLICIES, "editor").into_policy().scope, Scope::All);
        assert_eq!(parse_policies(POLICIES, "locked").into_policy().scope, Scope::None);
    }

    #[test]
    fn test_unknown_scope_denies() {
        assert_eq!(parse_policies(POLICIES, "odd").into_policy().scope, Scope::None);
    }

    #[test]
    fn test_missing_entry() {
        let load = parse_policies(POLICIES, "stranger");
        assert_eq!(load, PolicyLoad::NoEntry);
        assert_eq!(load.into_policy(), Policy::default());
    }

    #[test]
    fn test_empty_file_has_no_entry() {
        assert_eq!(parse_policies("", "x"), PolicyLoad::NoEntry);
        assert_eq!(parse_policies("~\n", "x"), PolicyLoad::NoEntry);
    }

    #[test]
    fn test_malformed_file() {
        let load = parse_policies("default: [unclosed", "");
        assert!(matches!(load, PolicyLoad::Malformed(_)));
        assert_eq!(load.into_policy(), Policy::default());
    }

    // ── load_policy ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_policy_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_policy(dir.path(), "").await, PolicyLoad::Missing);
    }

    #[tokio::test]
    async fn test_load_policy_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".config")).unwrap();
        std::fs::write(dir.path().join(".config/policies.yml"), POLICIES).unwrap();

        let load = load_policy(dir.path(), "editor").await;
        assert_eq!(
            load,
            PolicyLoad::Loaded(Policy {
                name: "editors".to_owned(),
                scope: Scope::All,
            })
        );
    }
}
