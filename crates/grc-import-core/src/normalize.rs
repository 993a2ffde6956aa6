//! Canonicalization of raw source content.
//!
//! Tabular rows are mapped onto [`RequirementCandidate`]s through a fixed set
//! of column aliases. Text and HTML collapse to a single plain-text block in
//! which newlines mark the boundaries the segmenter relies on.

use scraper::{ElementRef, Html, Node};
use uuid::Uuid;

use crate::{
    domain::RequirementCandidate,
    source::{RawRow, SourceContent},
};

/// Canonical form handed to the next stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Discrete candidates, one per source row.
    Rows(Vec<RequirementCandidate>),
    /// One plain-text block to be segmented.
    Text {
        /// The text.
        text: String,
        /// Best-effort title of the source.
        title: Option<String>,
    },
}

const CODE: &[&str] = &["requirement_code", "code", "req_code"];
const TITLE: &[&str] = &["title"];
const TEXT: &[&str] = &["text", "requirement_text"];
const SECTION: &[&str] = &["section_code", "sectionCode"];
const GUIDANCE: &[&str] = &["guidance"];
const PRIORITY: &[&str] = &["priority"];
const ACTIVE: &[&str] = &["is_active"];
const FRAMEWORK_CODE: &[&str] = &["framework_code"];
const FRAMEWORK_ID: &[&str] = &["framework_id"];

/// Normalizes reader output.
#[must_use]
pub fn normalize(content: SourceContent) -> Canonical {
    match content {
        SourceContent::Rows(rows) => Canonical::Rows(candidates_from_rows(&rows)),
        SourceContent::Text { text, title } => Canonical::Text {
            text: collapse_whitespace(&text),
            title,
        },
        SourceContent::Html { html, title } => Canonical::Text {
            text: html_to_text(&html),
            title,
        },
    }
}

/// Maps tabular rows onto candidates.
#[must_use]
pub fn candidates_from_rows(rows: &[RawRow]) -> Vec<RequirementCandidate> {
    rows.iter().map(candidate_from_row).collect()
}

/// Maps one row onto a candidate.
///
/// For each field the first alias holding a non-blank value wins. An
/// unparseable `framework_id` is dropped so that `framework_code` can still
/// resolve the framework.
#[must_use]
pub fn candidate_from_row(row: &RawRow) -> RequirementCandidate {
    let framework_id = lookup(row, FRAMEWORK_ID).and_then(|raw| match raw.parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(error) => {
            tracing::warn!(framework_id = raw, %error, "ignoring malformed framework id");
            None
        }
    });

    RequirementCandidate {
        requirement_code: lookup(row, CODE).unwrap_or_default().to_string(),
        title: lookup(row, TITLE).unwrap_or_default().to_string(),
        text: lookup(row, TEXT).unwrap_or_default().to_string(),
        guidance: lookup(row, GUIDANCE).map(ToString::to_string),
        priority: lookup(row, PRIORITY).map(ToString::to_string),
        is_active: lookup(row, ACTIVE).map(ToString::to_string),
        section_code: lookup(row, SECTION).map(ToString::to_string),
        framework_code: lookup(row, FRAMEWORK_CODE).map(ToString::to_string),
        framework_id,
        ..RequirementCandidate::default()
    }
}

fn lookup<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// Collapses runs of spaces and tabs to single spaces, line by line.
///
/// Newlines survive; blank lines are dropped and non-breaking spaces count as
/// whitespace.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

const BLOCKS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

const SKIPPED: &[&str] = &["head", "noscript", "script", "style", "template"];

/// Flattens HTML to plain text.
///
/// Block-level elements and `<br>` start new lines; line breaks inside the
/// markup's own text are just whitespace. Script and style content is
/// dropped.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    flatten(document.root_element(), &mut text);
    collapse_whitespace(&text)
}

fn flatten(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }

            let is_block = BLOCKS.contains(&name);
            if is_block {
                out.push('\n');
            }
            flatten(child_element, out);
            if is_block {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            out.extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
        }
    }
}
