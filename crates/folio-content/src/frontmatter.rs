//! Frontmatter splitting.
//!
//! A resource file optionally starts with a YAML block delimited by `---`
//! lines:
//!
//! ```text
//! ---
//! title: Home
//! published: 2000-01-01
//! ---
//! Welcome to the *home* page.
//! ```
//!
//! Files that do not start with a `---` line, or whose opening `---` is never
//! closed, have no frontmatter and the whole text is the body.

/// Error raised when the frontmatter YAML of a resource file cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    /// The YAML between the delimiters is malformed or has unexpected types.
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A resource file split into its YAML block and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Document<'a> {
    /// Raw YAML between the delimiters, without the delimiter lines.
    pub yaml: &'a str,
    /// Everything after the closing delimiter line.
    pub body: &'a str,
}

impl Document<'_> {
    /// Length of the raw frontmatter block plus the body.
    pub(crate) fn size(&self) -> usize {
        self.yaml.len() + self.body.len()
    }
}

/// Split `text` into frontmatter and body.
pub(crate) fn split(text: &str) -> Document<'_> {
    let no_frontmatter = Document {
        yaml: "",
        body: text,
    };

    let Some(rest) = text.strip_prefix("---") else {
        return no_frontmatter;
    };
    let Some(rest) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        // `----`, `--- title` and similar are body text.
        return no_frontmatter;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Document {
                yaml: &rest[..offset],
                body: &rest[offset + line.len()..],
            };
        }
        offset += line.len();
    }

    // A lone opening line is a horizontal rule.
    no_frontmatter
}
