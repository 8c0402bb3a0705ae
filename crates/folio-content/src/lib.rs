//! Content resources for Folio.
//!
//! A content root is a directory of frontmatter-tagged files. This crate
//! resolves logical paths in a root to [`Resource`]s, applies the access
//! [`Policy`] selected by the caller's token, searches subtrees, renders
//! bodies, and memoizes all of it through [`ContentResolver`].
//!
//! ```text
//! sitedata/
//! ├── .config/
//! │   ├── policies.yml     # token -> {name, scope}
//! │   └── git.yml          # sync source (see folio-sync)
//! ├── home.md              # logical path "home"
//! └── blog/
//!     └── first-post.md    # logical path "blog/first-post"
//! ```
//!
//! Lookups never fail loudly: missing, hidden, unparsable and forbidden
//! resources are all absent to the caller, and the reason is logged.

mod body;
mod collection;
mod error;
mod frontmatter;
mod policy;
mod resolver;
mod resource;
mod search;

pub use body::{ParsedBody, parsed_body, render_markdown};
pub use collection::ResourceCollection;
pub use error::ContentError;
pub use frontmatter::FrontmatterError;
pub use policy::{Policy, PolicyLoad, Scope, can_access, load_policy};
pub use resolver::{ContentResolver, ResolverSettings, SearchResults};
pub use resource::{Resource, ResourceFormat, ResourceType, Timestamp};
pub use search::{DEFAULT_SEARCH_DEPTH, SearchOptions};

/// Directory inside a content root holding site configuration.
pub const CONFIG_DIR: &str = ".config";

/// Policy file name inside [`CONFIG_DIR`].
pub const POLICIES_FILE: &str = "policies.yml";
