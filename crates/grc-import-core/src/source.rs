//! Source readers.
//!
//! Each reader obtains raw content for one input mode and nothing more: rows
//! of `header -> cell` strings for tabular inputs, or a block of text/HTML for
//! documents, web pages and pastes. Turning that into candidates is the job
//! of [`crate::normalize`] and [`crate::segment`].

use std::{collections::BTreeMap, fmt, io, path::Path};

pub mod docx;
pub mod gate;
pub mod json;
pub mod paste;
pub mod spreadsheet;
pub mod tabular;
pub mod web;

pub use gate::{LoadState, ModuleGate};
pub use json::ImportBundle;
pub use paste::Pasted;
pub use web::{FetchAttempt, FetchedPage, Fetcher, PageContent};

/// One tabular row: column header to cell text.
pub type RawRow = BTreeMap<String, String>;

/// Raw content produced by a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    /// Already-discrete rows.
    Rows(Vec<RawRow>),
    /// A block of plain text.
    Text {
        /// The text.
        text: String,
        /// Best-effort title of the source.
        title: Option<String>,
    },
    /// A block of HTML.
    Html {
        /// The markup.
        html: String,
        /// Best-effort title of the source.
        title: Option<String>,
    },
}

/// File formats accepted by the importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Comma-separated values.
    Csv,
    /// A JSON import bundle.
    Json,
    /// An Excel workbook (`.xlsx` or `.xls`).
    Spreadsheet,
    /// A Word document (`.docx`).
    Docx,
}

const ACCEPTED: &str = ".csv, .json, .xlsx, .xls, .docx";

impl FileKind {
    /// Resolves the kind of a selected file from its MIME type or, failing
    /// that, its extension.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoFileSelected`] for an empty name and
    /// [`SourceError::UnsupportedFormat`] for anything outside the accepted
    /// formats.
    pub fn resolve(name: &str, mime: Option<&str>) -> Result<Self, SourceError> {
        if name.trim().is_empty() {
            return Err(SourceError::NoFileSelected);
        }

        if let Some(kind) = mime.and_then(Self::from_mime) {
            return Ok(kind);
        }

        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some("xlsx" | "xls") => Ok(Self::Spreadsheet),
            Some("docx") => Ok(Self::Docx),
            _ => Err(SourceError::UnsupportedFormat {
                name: name.to_string(),
                accepted: ACCEPTED,
            }),
        }
    }

    /// Resolves the kind of a file on disk from its extension.
    ///
    /// # Errors
    ///
    /// See [`FileKind::resolve`].
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        Self::resolve(&path.to_string_lossy(), None)
    }

    fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence {
            "text/csv" => Some(Self::Csv),
            "application/json" => Some(Self::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel" => Some(Self::Spreadsheet),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            _ => None,
        }
    }

    /// Checks that this kind is one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedFormat`] naming the allowed kinds.
    pub fn ensure_one_of(self, name: &str, allowed: &'static [Self]) -> Result<Self, SourceError> {
        if allowed.contains(&self) {
            Ok(self)
        } else {
            Err(SourceError::UnsupportedFormat {
                name: name.to_string(),
                accepted: match allowed {
                    [Self::Csv, Self::Json] => ".csv, .json",
                    [Self::Spreadsheet, Self::Docx] => ".xlsx, .xls, .docx",
                    _ => ACCEPTED,
                },
            })
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Spreadsheet => "spreadsheet",
            Self::Docx => "docx",
        })
    }
}

/// Errors raised while reading a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No input was provided.
    #[error("No file selected")]
    NoFileSelected,

    /// The selected file is not one of the accepted formats.
    #[error("Unsupported file '{name}': accepted formats are {accepted}")]
    UnsupportedFormat {
        /// The rejected file name.
        name: String,
        /// The accepted extensions.
        accepted: &'static str,
    },

    /// The URL could not be parsed.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Every fetch strategy failed.
    #[error("Cannot fetch {url}: {}", FetchAttempt::join(attempts))]
    FetchFailed {
        /// The normalized URL.
        url: String,
        /// One entry per attempted strategy, in order.
        attempts: Vec<FetchAttempt>,
    },

    /// An extraction backend could not be loaded.
    #[error("Failed to load {library}: {reason}")]
    LibraryLoadFailed {
        /// The backend name.
        library: &'static str,
        /// Why loading failed.
        reason: String,
    },

    /// Pasted input is shorter than the configured minimum.
    #[error("Input too short: {len} characters, at least {min} required")]
    InputTooShort {
        /// Characters supplied.
        len: usize,
        /// Characters required.
        min: usize,
    },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Reading the input failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The delimited file is malformed.
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The JSON bundle is malformed.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The workbook could not be read.
    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    /// The Word document could not be read.
    #[error("Unreadable Word document: {0}")]
    Docx(String),
}
