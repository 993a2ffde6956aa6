//! Splitting a plain-text block into requirement segments.
//!
//! Segmentation runs through tiers, each tried only when the previous one
//! found nothing:
//!
//! 1. structural markers (`MADDE n –`, `Article n.`, numbered items), see
//!    [`marker`];
//! 2. lines that start with a number;
//! 3. the whole text as one segment.
//!
//! Every non-whitespace character of the input ends up in exactly one segment
//! body. Text ahead of the first marker becomes a `PREAMBLE` segment.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::RequirementCandidate;

pub mod marker;
use marker::{Marker, canonical_number};

/// Code given to the text that precedes the first marker.
pub const PREAMBLE: &str = "PREAMBLE";

const TITLE_LIMIT: usize = 140;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)[.) \-]").expect("numbered line pattern is valid"));

/// One segment of a text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Derived requirement code.
    pub code: String,
    /// Derived title: the code followed by the first sentence.
    pub title: String,
    /// Segment text, marker included.
    pub body: String,
}

impl Segment {
    /// Turns the segment into an included, unlinked candidate.
    #[must_use]
    pub fn into_candidate(self) -> RequirementCandidate {
        RequirementCandidate::new(self.code, self.title, self.body)
    }
}

/// Errors raised by the segmenter.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SegmentError {
    /// There was no text to segment.
    #[error("Nothing to segment: the input text is empty")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Markers,
    NumberedLines,
    WholeText,
}

/// Splits text blocks into segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Segmenter;

impl Segmenter {
    /// Creates a segmenter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Segments a text block.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::EmptyInput`] if the text is blank.
    #[tracing::instrument(skip_all, fields(len = text.len()))]
    pub fn segment(&self, text: &str) -> Result<Vec<Segment>, SegmentError> {
        if text.trim().is_empty() {
            return Err(SegmentError::EmptyInput);
        }

        let mut tier = Tier::Markers;
        loop {
            let segments = match tier {
                Tier::Markers => {
                    let markers = marker::scan(text);
                    if markers.is_empty() {
                        tier = Tier::NumberedLines;
                        continue;
                    }
                    split_at_markers(text, &markers)
                }
                Tier::NumberedLines => {
                    let segments = split_numbered_lines(text);
                    if segments.is_empty() {
                        tier = Tier::WholeText;
                        continue;
                    }
                    segments
                }
                Tier::WholeText => vec![build("SEC-1".to_string(), text.trim(), text)],
            };

            tracing::debug!(?tier, segments = segments.len(), "segmented text");
            return Ok(segments);
        }
    }

    /// Segments a text block straight into candidates.
    ///
    /// # Errors
    ///
    /// See [`Segmenter::segment`].
    pub fn candidates(&self, text: &str) -> Result<Vec<RequirementCandidate>, SegmentError> {
        Ok(self
            .segment(text)?
            .into_iter()
            .map(Segment::into_candidate)
            .collect())
    }
}

fn split_at_markers(text: &str, markers: &[Marker]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(markers.len() + 1);

    if let Some(first) = markers.first() {
        push_preamble(&mut segments, &text[..first.start]);
    }

    for (index, marker) in markers.iter().enumerate() {
        let end = markers.get(index + 1).map_or(text.len(), |next| next.start);
        let body = text[marker.start..end].trim();
        if body.is_empty() {
            continue;
        }
        segments.push(build(marker.code(), body, &text[marker.end..end]));
    }

    segments
}

fn split_numbered_lines(text: &str) -> Vec<Segment> {
    struct Open<'a> {
        code: String,
        rest_of_first_line: &'a str,
        lines: Vec<&'a str>,
    }

    fn close(open: Open<'_>, segments: &mut Vec<Segment>) {
        let body = open.lines.join("\n");
        let mut heading = vec![open.rest_of_first_line];
        heading.extend(open.lines.iter().skip(1));
        segments.push(build(open.code, &body, &heading.join("\n")));
    }

    let mut segments = Vec::new();
    let mut preamble = Vec::new();
    let mut open: Option<Open<'_>> = None;

    for line in text.lines().map(str::trim_end).filter(|line| !line.trim().is_empty()) {
        if let Some(captures) = NUMBERED_LINE.captures(line) {
            if let Some(previous) = open.take() {
                close(previous, &mut segments);
            }
            let marker_end = captures.get(0).map_or(0, |m| m.end());
            open = Some(Open {
                code: format!("SEC-{}", canonical_number(&captures[1])),
                rest_of_first_line: &line[marker_end..],
                lines: vec![line.trim_start()],
            });
        } else if let Some(current) = open.as_mut() {
            current.lines.push(line.trim_start());
        } else {
            preamble.push(line.trim_start());
        }
    }

    let Some(last) = open else {
        return Vec::new();
    };
    close(last, &mut segments);

    let mut all = Vec::with_capacity(segments.len() + 1);
    push_preamble(&mut all, &preamble.join("\n"));
    all.append(&mut segments);
    all
}

fn push_preamble(segments: &mut Vec<Segment>, text: &str) {
    let body = text.trim();
    if !body.is_empty() {
        segments.push(build(PREAMBLE.to_string(), body, body));
    }
}

fn build(code: String, body: &str, heading: &str) -> Segment {
    let sentence = first_sentence(heading);
    let title = if sentence.is_empty() {
        code.clone()
    } else {
        format!("{code}: {sentence}").chars().take(TITLE_LIMIT).collect()
    };
    Segment {
        code,
        title,
        body: body.to_string(),
    }
}

/// The first sentence of `text`, whitespace collapsed.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// the text; the terminator is kept.
fn first_sentence(text: &str) -> String {
    let text = text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '–' | '—' | '-' | ':'));
    let mut chars = text.char_indices().peekable();
    let mut end = text.len();
    while let Some((index, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
            end = index + c.len_utf8();
            break;
        }
    }
    text[..end].split_whitespace().collect::<Vec<_>>().join(" ")
}
