//! # undoc
//!
//! Multi-format document text extraction with a native PDF engine.
//!
//! Parses PDF, DOCX, PPTX, XLSX, and HWPX byte buffers into a
//! unified page/block model (text paragraphs, tables, images),
//! detects tables geometrically where the format has no table
//! markup, and renders the result as Markdown, JSON, or plain text.
//!
//! ```no_run
//! use undoc::{parse_file, render};
//!
//! fn main() -> undoc::Result<()> {
//!     let document = parse_file("report.pdf")?;
//!     println!("{}", render::to_markdown(&document, &Default::default()));
//!     Ok(())
//! }
//! ```
//!
//! Parsing is best-effort: localized corruption (a bad stream, a
//! dangling reference, a malformed operator) degrades to a
//! [`Diagnostic`] on the document instead of failing the parse.
//! Only structural failures that prevent locating any object abort.

pub mod container;
pub mod detect;
mod error;
pub mod model;
pub mod pdf;
pub mod render;
pub mod table_detector;

use std::fs;
use std::path::Path;

pub use detect::DocumentFormat;
pub use error::{Diagnostic, DiagnosticKind, Error, Result};
pub use model::{Block, Document, Image, Metadata, Page, Paragraph, Table, TextRun};
pub use table_detector::{TableDetector, TableDetectorConfig};

/// Per-parse configuration.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Retain encoded image bytes on image blocks. Off by default;
    /// placement geometry is kept either way.
    pub include_images: bool,

    /// Run geometric table detection on PDF pages.
    pub detect_tables: bool,

    /// Clustering tolerances for the table detector.
    pub table_detector: TableDetectorConfig,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            include_images: false,
            detect_tables: true,
            table_detector: TableDetectorConfig::default(),
        }
    }
}

/// Parse a byte buffer, detecting the format from its content.
pub fn parse_bytes(data: Vec<u8>) -> Result<Document> {
    parse_with(data, None, &ParseOptions::default())
}

/// Parse a byte buffer with a filename-extension hint for content
/// that magic bytes cannot settle.
pub fn parse_bytes_with_hint(data: Vec<u8>, extension: &str) -> Result<Document> {
    parse_with(data, Some(extension), &ParseOptions::default())
}

/// Parse a file from disk, using its extension as the hint.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Document> {
    parse_file_with(path, &ParseOptions::default())
}

/// Parse a file from disk with explicit options.
pub fn parse_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Document> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_owned);
    let data = fs::read(path)?;
    parse_with(data, extension.as_deref(), options)
}

/// Full-control entry: bytes, optional extension hint, options.
/// Exactly one reader consumes the input.
pub fn parse_with(
    data: Vec<u8>,
    hint_extension: Option<&str>,
    options: &ParseOptions,
) -> Result<Document> {
    let format = detect::detect_format(&data, hint_extension)?;
    match format {
        DocumentFormat::Pdf => pdf::reader::parse(data, options),
        DocumentFormat::Docx => container::parse_docx(data),
        DocumentFormat::Pptx => container::parse_pptx(data),
        DocumentFormat::Xlsx => container::parse_xlsx(data),
        DocumentFormat::Hwpx => container::parse_hwpx(data),
    }
}
