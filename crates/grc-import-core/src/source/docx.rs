//! Plain-text extraction from Word documents.
//!
//! The extractor sits behind a [`ModuleGate`]: it is only set up the first
//! time a `.docx` file is read, and a build without the `docx` feature
//! reports [`SourceError::LibraryLoadFailed`] instead of failing to link.

use std::path::Path;

use crate::source::{SourceError, gate::ModuleGate};

static BACKEND: ModuleGate<DocxExtractor> = ModuleGate::new("docx");

/// Extracts the running text of a Word document.
///
/// Paragraphs and explicit line breaks become newlines, tabs become spaces
/// and non-breaking spaces are normalized to regular spaces.
///
/// # Errors
///
/// Returns [`SourceError::LibraryLoadFailed`] if the backend is unavailable
/// and [`SourceError::Docx`] if the archive is not a readable document.
pub fn extract_text(bytes: &[u8]) -> Result<String, SourceError> {
    let extractor = BACKEND.load_with(DocxExtractor::load)?;
    extractor.extract(bytes)
}

/// Reads a Word document from disk and extracts its text.
///
/// # Errors
///
/// See [`extract_text`]; I/O failures are returned as [`SourceError::Io`].
pub fn read_docx(path: &Path) -> Result<String, SourceError> {
    let bytes = std::fs::read(path)?;
    extract_text(&bytes)
}

struct DocxExtractor {
    document_part: &'static str,
}

impl DocxExtractor {
    #[cfg(feature = "docx")]
    #[allow(clippy::unnecessary_wraps)]
    fn load() -> Result<Self, String> {
        Ok(Self {
            document_part: "word/document.xml",
        })
    }

    #[cfg(not(feature = "docx"))]
    fn load() -> Result<Self, String> {
        Err("this build does not include Word document support (enable the `docx` feature)".into())
    }

    #[cfg(feature = "docx")]
    fn extract(&self, bytes: &[u8]) -> Result<String, SourceError> {
        use std::io::{Cursor, Read};

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SourceError::Docx(e.to_string()))?;
        let mut part = archive
            .by_name(self.document_part)
            .map_err(|e| SourceError::Docx(format!("{}: {e}", self.document_part)))?;
        let mut xml = String::new();
        part.read_to_string(&mut xml)?;

        document_text(&xml)
    }

    #[cfg(not(feature = "docx"))]
    fn extract(&self, _bytes: &[u8]) -> Result<String, SourceError> {
        Err(SourceError::LibraryLoadFailed {
            library: "docx",
            reason: format!("cannot read {}", self.document_part),
        })
    }
}

/// Flattens the body of `word/document.xml` to text.
#[cfg(feature = "docx")]
fn document_text(xml: &str) -> Result<String, SourceError> {
    use quick_xml::{Reader, events::Event};

    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader
            .read_event()
            .map_err(|e| SourceError::Docx(e.to_string()))?
        {
            Event::Start(element) if element.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(element) => match element.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:tab" => text.push(' '),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(content) if in_run_text => {
                let content = content
                    .unescape()
                    .map_err(|e| SourceError::Docx(e.to_string()))?;
                text.push_str(&content);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text.replace('\u{a0}', " ").trim().to_string())
}
