//! Rendering resource bodies for output.

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use serde::Serialize;

use crate::error::ContentError;
use crate::resource::{Resource, ResourceFormat, ResourceType};

/// Bare URLs in Markdown text that become links.
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).unwrap());

/// A resource body ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedBody {
    /// HTML or plain text.
    Text(String),
    /// Decoded `structure` body.
    Structure(serde_json::Value),
    /// A `structure` body that failed to parse.
    Null,
}

/// Decode or render the body of `resource` according to its type and format.
///
/// - `structure` bodies are parsed as JSON (`format: json`) or YAML.
/// - `markdown` content is rendered to HTML.
/// - Other content is returned verbatim.
pub fn parsed_body(resource: &Resource) -> ParsedBody {
    match resource.resource_type {
        ResourceType::Structure => match parse_structure(resource) {
            Ok(value) => ParsedBody::Structure(value),
            Err(e) => {
                tracing::error!(error = %e, "Error reading resource as structure");
                ParsedBody::Null
            }
        },
        ResourceType::Content => match resource.format {
            ResourceFormat::Markdown => ParsedBody::Text(render_markdown(&resource.body)),
            _ => ParsedBody::Text(resource.body.clone()),
        },
    }
}

fn parse_structure(resource: &Resource) -> Result<serde_json::Value, ContentError> {
    let parsed = if resource.format == ResourceFormat::Json {
        serde_json::from_str(&resource.body).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&resource.body).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| ContentError::Structure {
        path: resource.path.clone(),
        message,
    })
}

/// Render Markdown to HTML.
///
/// Raw HTML passes through, bare URLs become links and quotes, dashes and
/// ellipses are replaced by their typographic forms.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_SMART_PUNCTUATION;
    let parser = TextMergeStream::new(Parser::new_ext(markdown, options));

    let mut events = Vec::new();
    let mut link_depth = 0usize;
    let mut in_code_block = false;
    for event in parser {
        match &event {
            Event::Start(Tag::Link { .. }) => link_depth += 1,
            Event::End(TagEnd::Link) => link_depth = link_depth.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            _ => {}
        }
        match event {
            Event::Text(text) if link_depth == 0 && !in_code_block => linkify(text, &mut events),
            other => events.push(other),
        }
    }

    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

/// Split `text` around bare URLs, wrapping each URL in a link.
fn linkify<'a>(text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
    let mut last = 0;
    for found in URL_PATTERN.find_iter(&text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if url.is_empty() {
            continue;
        }
        let start = found.start();
        if start > last {
            events.push(Event::Text(CowStr::from(text[last..start].to_owned())));
        }
        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_owned()
        };
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(href),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        events.push(Event::Text(CowStr::from(url.to_owned())));
        events.push(Event::End(TagEnd::Link));
        last = start + url.len();
    }

    if last == 0 {
        events.push(Event::Text(text));
    } else if last < text.len() {
        events.push(Event::Text(CowStr::from(text[last..].to_owned())));
    }
}
