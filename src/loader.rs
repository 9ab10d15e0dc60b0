//! Turning uploaded bytes into page texts.
//!
//! PDFs are written to a scratch file and handed to `pdf_oxide`, one text
//! per page. Anything else must be UTF-8 text and becomes a single page.
//! The scratch file is a [`NamedTempFile`], so it is removed when this
//! module returns, whether parsing succeeded or not.

use std::{io::Write, path::Path};

use pdf_oxide::PdfDocument;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A document after text extraction, ready to be chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// The name the caller gave the document, usually its file name.
    pub name: String,
    /// Extracted text, one entry per page.
    pub pages: Vec<String>,
}

impl LoadedDocument {
    /// Whether no page has any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

/// Decide whether `bytes` should be parsed as a PDF.
///
/// The magic header wins; the `.pdf` extension is the fallback for files
/// with leading junk before the header.
pub fn is_pdf(name: &str, bytes: &[u8]) -> bool {
    if bytes.starts_with(PDF_MAGIC) {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Extract page texts from raw document bytes.
///
/// # Errors
///
/// Returns [`Error::DocumentParse`] if the PDF cannot be opened or a page
/// cannot be read, or if non-PDF input is not valid UTF-8.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<LoadedDocument> {
    let pages = if is_pdf(name, bytes) {
        load_pdf(name, bytes)?
    } else {
        vec![decode_text(name, bytes)?]
    };

    tracing::debug!(document = name, pages = pages.len(), "extracted text");
    Ok(LoadedDocument {
        name: name.to_string(),
        pages,
    })
}

/// Read a file from disk and extract its text.
pub fn load_path(path: &Path) -> Result<LoadedDocument> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_bytes(&name, &bytes)
}

fn decode_text(name: &str, bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::DocumentParse {
        name: name.to_string(),
        message: format!("not a PDF and not UTF-8 text: {e}"),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

fn load_pdf(name: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let parse_error = |message: String| Error::DocumentParse {
        name: name.to_string(),
        message,
    };

    let mut scratch = tempfile::Builder::new()
        .prefix("docqa-")
        .suffix(".pdf")
        .tempfile()?;
    write_scratch(&mut scratch, bytes)?;

    let mut doc = PdfDocument::open(scratch.path())
        .map_err(|e| parse_error(e.to_string()))?;
    let page_count = doc.page_count().map_err(|e| parse_error(e.to_string()))?;

    let mut pages = Vec::with_capacity(page_count);
    for page in 0..page_count {
        let text = doc.extract_text(page).map_err(|e| {
            parse_error(format!("page {}: {e}", page + 1))
        })?;
        pages.push(text);
    }

    Ok(pages)
}

fn write_scratch(file: &mut NamedTempFile, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}
