//! Depth-bounded subtree search.

use std::collections::BTreeSet;

use crate::collection::ResourceCollection;
use crate::resource::Resource;

/// Search depth used when [`SearchOptions::path_depth`] is zero.
pub const DEFAULT_SEARCH_DEPTH: usize = 5;

/// Filters for [`ResourceCollection::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Every tag must be present on a result.
    pub tags: BTreeSet<String>,
    /// When non-empty, a result's type must be one of these names.
    pub types: BTreeSet<String>,
    /// Number of directory levels to descend below the search root. Files
    /// directly in the root are always searched. Zero means
    /// [`DEFAULT_SEARCH_DEPTH`].
    pub path_depth: usize,
}

impl SearchOptions {
    fn effective_depth(&self) -> usize {
        if self.path_depth == 0 {
            DEFAULT_SEARCH_DEPTH
        } else {
            self.path_depth
        }
    }

    fn matches(&self, resource: &Resource) -> bool {
        resource.has_tags(&self.tags)
            && (self.types.is_empty() || self.types.contains(resource.resource_type.as_str()))
    }
}

/// Pending work in the depth-first walk.
enum Step {
    Dir { path: String, depth: usize },
    File(String),
}

impl ResourceCollection {
    /// Find accessible resources under `search_path` that match `options`.
    ///
    /// Results are in depth-first order with directory entries visited by
    /// name. Unreadable directories and entries are skipped.
    pub async fn search(&self, search_path: &str, options: &SearchOptions) -> Vec<Resource> {
        let start = search_path.trim_matches('/');
        if start.split('/').any(|segment| segment.starts_with('.')) {
            return Vec::new();
        }

        let max_depth = options.effective_depth();
        let mut found = Vec::new();
        let mut stack = vec![Step::Dir {
            path: start.to_owned(),
            depth: 0,
        }];

        while let Some(step) = stack.pop() {
            match step {
                Step::File(path) => {
                    if let Some(resource) = self.get(&path).await
                        && options.matches(&resource)
                    {
                        found.push(resource);
                    }
                }
                Step::Dir { path, depth } => {
                    let children = self.children(&path, depth, max_depth).await;
                    // Reverse so the first entry by name is popped first.
                    stack.extend(children.into_iter().rev());
                }
            }
        }

        found
    }

    /// Sorted, non-hidden entries of the directory at `path`.
    async fn children(&self, path: &str, depth: usize, max_depth: usize) -> Vec<Step> {
        let dir = self.file_path(path);
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return Vec::new();
        };

        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();

        let mut steps = Vec::with_capacity(names.len());
        for name in names {
            let child = if path.is_empty() {
                name
            } else {
                format!("{path}/{name}")
            };
            // Follows symlinks, like reading the file would.
            let Ok(metadata) = tokio::fs::metadata(self.file_path(&child)).await else {
                continue;
            };
            if metadata.is_dir() {
                if depth < max_depth {
                    steps.push(Step::Dir {
                        path: child,
                        depth: depth + 1,
                    });
                }
            } else {
                steps.push(Step::File(child));
            }
        }
        steps
    }
}
