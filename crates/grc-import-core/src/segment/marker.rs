//! Structural markers that open a requirement in legal and standards text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Kind of marker, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// A Turkish statute article, `MADDE 5 –`.
    Madde,
    /// An English article, `Article 5.`.
    Article,
    /// A numbered item at the start of a line, `5.` or `5)`.
    NumberedItem,
}

struct Rule {
    kind: MarkerKind,
    group: &'static str,
    number: &'static str,
    pattern: &'static str,
}

/// Alternatives are tried left to right at each position, so earlier rules
/// win when two would match at the same offset.
const RULES: [Rule; 3] = [
    Rule {
        kind: MarkerKind::Madde,
        group: "madde",
        number: "madde_n",
        pattern: r"\b(?i:madde)[ \t]+(?P<madde_n>\d+)[ \t]*[–—-]",
    },
    Rule {
        kind: MarkerKind::Article,
        group: "article",
        number: "article_n",
        pattern: r"\b(?i:article)[ \t]+(?P<article_n>\d+)[ \t]*(?:[.:–—)-]|$)",
    },
    Rule {
        kind: MarkerKind::NumberedItem,
        group: "item",
        number: "item_n",
        pattern: r"^[ \t]*(?P<item_n>\d+)[.)][ \t]",
    },
];

static SCANNER: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = RULES
        .iter()
        .map(|rule| format!("(?P<{}>{})", rule.group, rule.pattern))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?m){alternatives}")).expect("marker patterns are valid")
});

/// A marker found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// What kind of marker this is.
    pub kind: MarkerKind,
    /// The article or item number, without leading zeros.
    pub number: String,
    /// Byte offset where the marker starts.
    pub start: usize,
    /// Byte offset just past the marker.
    pub end: usize,
}

impl Marker {
    /// The requirement code this marker assigns.
    #[must_use]
    pub fn code(&self) -> String {
        match self.kind {
            MarkerKind::Madde => format!("MADDE {}", self.number),
            MarkerKind::Article => format!("ARTICLE {}", self.number),
            MarkerKind::NumberedItem => format!("SEC-{}", self.number),
        }
    }

    fn from_captures(captures: &Captures<'_>) -> Option<Self> {
        RULES.iter().find_map(|rule| {
            let whole = captures.name(rule.group)?;
            let number = captures.name(rule.number)?.as_str();
            Some(Self {
                kind: rule.kind,
                number: canonical_number(number),
                start: whole.start(),
                end: whole.end(),
            })
        })
    }
}

/// Finds every marker, in order of appearance.
#[must_use]
pub fn scan(text: &str) -> Vec<Marker> {
    SCANNER
        .captures_iter(text)
        .filter_map(|captures| Marker::from_captures(&captures))
        .collect()
}

pub(crate) fn canonical_number(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
