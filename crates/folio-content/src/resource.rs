//! Resource model and construction from frontmatter files.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::frontmatter::{self, FrontmatterError};

/// Schema of a resource body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Text for display (HTML, Markdown, plain text).
    #[default]
    Content,
    /// Structured data (JSON or YAML).
    Structure,
}

impl ResourceType {
    /// Name used in frontmatter and search filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Structure => "structure",
        }
    }

    /// Parse a frontmatter `type` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "content" => Some(Self::Content),
            "structure" => Some(Self::Structure),
            _ => None,
        }
    }
}

/// Encoding of a resource body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceFormat {
    #[default]
    Html,
    Markdown,
    Plain,
    Json,
    Yaml,
}

impl ResourceFormat {
    /// Name used in frontmatter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Plain => "plain",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Parse a frontmatter `format` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "html" => Some(Self::Html),
            "markdown" => Some(Self::Markdown),
            "plain" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A frontmatter date field.
///
/// Values that do not parse as a date are kept verbatim so access checks can
/// report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    Date(DateTime<Utc>),
    Invalid(String),
}

impl Timestamp {
    /// The parsed date, if valid.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(at) => Some(*at),
            Self::Invalid(_) => None,
        }
    }

    /// Interpret a YAML value. `null` means the field is absent.
    ///
    /// Only a plain scalar can be a date. A quoted `"2000-01-01"` is a string
    /// and stays invalid.
    fn from_yaml(value: &Value, plain: bool) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(raw) => Some(
                parse_timestamp(raw)
                    .filter(|_| plain)
                    .map_or_else(|| Self::Invalid(raw.clone()), Self::Date),
            ),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value, plain),
            other => Some(Self::Invalid(
                scalar_text(other).unwrap_or_else(|| "<non-scalar>".to_owned()),
            )),
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.f]` (UTC) and bare dates
/// (midnight UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// A single content item read from disk.
///
/// Constructed fresh on every read and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Root-relative path including the file extension.
    pub path: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub format: ResourceFormat,
    pub created: Option<Timestamp>,
    pub published: Option<Timestamp>,
    /// Presence-only tag keys.
    pub tags: BTreeSet<String>,
    pub title: String,
    pub snippet: String,
    pub inject_header: String,
    pub inject_footer: String,
    /// Raw body text after the frontmatter block.
    pub body: String,
    /// Raw frontmatter length plus body length. Used as cache weight.
    #[serde(skip)]
    pub size: usize,
}

/// Frontmatter fields, read loosely: unknown keys are ignored and scalar
/// fields accept any scalar type.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Attributes {
    #[serde(rename = "type")]
    resource_type: Value,
    format: Value,
    created: Value,
    published: Value,
    tags: Value,
    title: Value,
    snippet: Value,
    inject_header: Value,
    inject_footer: Value,
}

impl Resource {
    /// Build a resource from the full text of a file.
    pub fn parse(path: impl Into<String>, text: &str) -> Result<Self, FrontmatterError> {
        let path = path.into();
        let document = frontmatter::split(text);
        let attributes = parse_attributes(document.yaml)?;
        let string_keys = string_styled_keys(document.yaml);
        let plain = |key: &str| !string_keys.contains(key);

        let resource_type = match scalar_text(&attributes.resource_type) {
            None => ResourceType::default(),
            Some(name) => ResourceType::from_name(&name).unwrap_or_else(|| {
                tracing::debug!(path = %path, value = %name, "Unknown resource type, using content");
                ResourceType::default()
            }),
        };
        let format = match scalar_text(&attributes.format) {
            None => ResourceFormat::default(),
            Some(name) => ResourceFormat::from_name(&name).unwrap_or_else(|| {
                tracing::debug!(path = %path, value = %name, "Unknown resource format, using html");
                ResourceFormat::default()
            }),
        };

        Ok(Self {
            resource_type,
            format,
            created: Timestamp::from_yaml(&attributes.created, plain("created")),
            published: Timestamp::from_yaml(&attributes.published, plain("published")),
            tags: tag_set(&attributes.tags),
            title: scalar_text(&attributes.title).unwrap_or_default(),
            snippet: scalar_text(&attributes.snippet).unwrap_or_default(),
            inject_header: scalar_text(&attributes.inject_header).unwrap_or_default(),
            inject_footer: scalar_text(&attributes.inject_footer).unwrap_or_default(),
            body: document.body.to_owned(),
            size: document.size(),
            path,
        })
    }

    /// Whether every tag in `tags` is present on this resource.
    pub fn has_tags(&self, tags: &BTreeSet<String>) -> bool {
        tags.is_subset(&self.tags)
    }
}

fn parse_attributes(yaml: &str) -> Result<Attributes, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Attributes::default());
    }
    let value: Value = serde_yaml::from_str(yaml)?;
    if value.is_null() {
        return Ok(Attributes::default());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Top-level keys whose value YAML can only read as a string, such as a quoted
/// scalar.
///
/// The parsed [`Value`] no longer records scalar style.
fn string_styled_keys(yaml: &str) -> BTreeSet<&str> {
    yaml.lines()
        .filter(|line| !line.starts_with([' ', '\t', '#']))
        .filter_map(|line| line.split_once(':'))
        .filter(|(_, value)| {
            let value = value.trim_start();
            value.starts_with(['"', '\'', '|', '>']) || value.starts_with("!!str")
        })
        .map(|(key, _)| key.trim().trim_matches(['"', '\'']))
        .collect()
}

/// Text of a scalar YAML value. `None` for null, sequences and mappings.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Tags come as a mapping (`{a: true}`), a sequence (`[a, b]`) or a
/// comma-separated string.
fn tag_set(value: &Value) -> BTreeSet<String> {
    let names: Vec<String> = match value {
        Value::Mapping(map) => map.iter().filter_map(|(key, _)| scalar_text(key)).collect(),
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(list) => list.split(',').map(|t| t.trim().to_owned()).collect(),
        other => scalar_text(other).into_iter().collect(),
    };
    names.into_iter().filter(|t| !t.is_empty()).collect()
}
