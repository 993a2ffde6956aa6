//! The two import flows, from raw input to reviewable candidates.
//!
//! The bulk flow takes CSV and JSON files whose rows are already discrete
//! requirements. The rich flow takes workbooks, Word documents, web pages and
//! pasted text; everything but workbooks is flattened to text and segmented.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    Config,
    domain::{FrameworkRow, RequirementCandidate, framework::SectionRow},
    normalize::{Canonical, candidates_from_rows, normalize},
    segment::{SegmentError, Segmenter},
    source::{
        FileKind, ImportBundle, PageContent, Pasted, SourceContent, SourceError, docx, json,
        paste, spreadsheet, tabular, web::Fetcher,
    },
};

/// File kinds accepted by the bulk flow.
pub const BULK_KINDS: &[FileKind] = &[FileKind::Csv, FileKind::Json];

/// File kinds accepted by the rich flow.
pub const RICH_KINDS: &[FileKind] = &[FileKind::Spreadsheet, FileKind::Docx];

/// Errors raised while turning input into candidates.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The text could not be segmented.
    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// A framework to create or update, with its sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameworkEntry {
    /// The framework.
    pub row: FrameworkRow,
    /// Its sections.
    pub sections: Vec<SectionRow>,
}

impl From<FrameworkRow> for FrameworkEntry {
    fn from(row: FrameworkRow) -> Self {
        Self {
            row,
            sections: Vec::new(),
        }
    }
}

/// Input read by either flow, ready to load into a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loaded {
    /// Frameworks to write.
    pub frameworks: Vec<FrameworkEntry>,
    /// Requirement candidates.
    pub candidates: Vec<RequirementCandidate>,
    /// Best-effort title of the source.
    pub title: Option<String>,
}

impl Loaded {
    /// Builds input from JSON bundles. Requirements that do not name a
    /// framework belong to their bundle's framework.
    #[must_use]
    pub fn from_bundles(bundles: Vec<ImportBundle>) -> Self {
        let mut loaded = Self::default();
        for bundle in bundles {
            let code = bundle.framework.code.clone();
            loaded.candidates.extend(bundle.requirements.into_iter().map(|mut candidate| {
                if candidate.framework_id.is_none() && candidate.framework_code.is_none() {
                    candidate.framework_code.clone_from(&code);
                }
                candidate
            }));
            loaded.frameworks.push(FrameworkEntry {
                row: bundle.framework,
                sections: bundle.sections,
            });
        }
        loaded
    }

    /// Makes `framework` the owner of every candidate that names none, and
    /// stages it for writing.
    pub fn assign_framework(&mut self, framework: FrameworkRow) {
        for candidate in self.unowned() {
            candidate.framework_code.clone_from(&framework.code);
        }
        self.frameworks.push(framework.into());
    }

    /// Makes the existing framework `id` the owner of every candidate that
    /// names none.
    pub fn assign_framework_id(&mut self, id: Uuid) {
        for candidate in self.unowned() {
            candidate.framework_id = Some(id);
        }
    }

    fn unowned(&mut self) -> impl Iterator<Item = &mut RequirementCandidate> {
        self.candidates
            .iter_mut()
            .filter(|candidate| candidate.framework_id.is_none() && candidate.framework_code.is_none())
    }
}

/// Reads a CSV or JSON file.
///
/// # Errors
///
/// Returns [`SourceError::UnsupportedFormat`] for other file kinds, or the
/// reader's error.
#[tracing::instrument]
pub fn read_bulk(path: &Path) -> Result<Loaded, ImportError> {
    let kind = FileKind::from_path(path)?.ensure_one_of(&path.to_string_lossy(), BULK_KINDS)?;
    let loaded = match kind {
        FileKind::Json => Loaded::from_bundles(json::read_bundle_file(path)?),
        _ => Loaded {
            candidates: candidates_from_rows(&tabular::read_csv(path)?),
            ..Loaded::default()
        },
    };
    tracing::info!(
        frameworks = loaded.frameworks.len(),
        candidates = loaded.candidates.len(),
        "read bulk source"
    );
    Ok(loaded)
}

/// Where a rich import comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichSource {
    /// A workbook or Word document on disk.
    File(PathBuf),
    /// A web page.
    Url(String),
    /// Pasted text or HTML.
    Paste(String),
}

/// Reads a rich source and segments it into candidates.
///
/// Workbook rows map one-to-one onto candidates; every other source is
/// normalized to text and segmented.
///
/// # Errors
///
/// Returns the reader's or segmenter's error.
#[tracing::instrument(skip(config))]
pub async fn read_rich(source: &RichSource, config: &Config) -> Result<Loaded, ImportError> {
    let content = match source {
        RichSource::File(path) => {
            let name = path.to_string_lossy();
            match FileKind::from_path(path)?.ensure_one_of(&name, RICH_KINDS)? {
                FileKind::Docx => SourceContent::Text {
                    text: docx::read_docx(path)?,
                    title: path.file_stem().map(|stem| stem.to_string_lossy().into_owned()),
                },
                _ => SourceContent::Rows(spreadsheet::read_workbook(path)?),
            }
        }
        RichSource::Url(url) => {
            let page = Fetcher::from_config(config)?.fetch(url).await?;
            match page.content {
                PageContent::Text(text) => SourceContent::Text {
                    text,
                    title: page.title,
                },
                PageContent::Html(html) => SourceContent::Html {
                    html,
                    title: page.title,
                },
            }
        }
        RichSource::Paste(input) => match paste::read_paste(input, config.min_paste_len())? {
            Pasted::Text(text) => SourceContent::Text { text, title: None },
            Pasted::Html(html) => SourceContent::Html { html, title: None },
        },
    };

    let loaded = match normalize(content) {
        Canonical::Rows(candidates) => Loaded {
            candidates,
            ..Loaded::default()
        },
        Canonical::Text { text, title } => Loaded {
            candidates: Segmenter::new().candidates(&text)?,
            title,
            ..Loaded::default()
        },
    };
    tracing::info!(candidates = loaded.candidates.len(), "read rich source");
    Ok(loaded)
}
