//! Error types for the undoc library.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias for undoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document processing.
///
/// Only structural failures that prevent locating any content at all are
/// fatal; localized problems (a dangling reference, one undecodable
/// stream, a bad operator) are downgraded to [`Diagnostic`]s and the
/// parse continues.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized.
    #[error("Unknown file format")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The document is encrypted; decryption is not supported.
    #[error("Document is encrypted")]
    Encrypted,

    /// The document structure is corrupted beyond recovery.
    #[error("Corrupted document: {0}")]
    Corrupted(String),

    /// An indirect reference could not be resolved.
    #[error("Unresolved reference: {0} {1} R")]
    UnresolvedReference(u32, u16),

    /// A stream declares a filter this engine does not implement.
    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    /// A content-stream operator was malformed (wrong operand arity).
    #[error("Malformed content stream: {0}")]
    MalformedContentStream(String),

    /// Error parsing document structure.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error reading a container (ZIP/XML) format.
    #[error("Container error: {0}")]
    Container(String),

    /// Error during rendering (Markdown, text, JSON).
    #[error("Rendering error: {0}")]
    Render(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Container(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Container(err.to_string())
    }
}

/// Category of a non-fatal anomaly encountered during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A reference pointed at a missing or cyclic object; Null was substituted.
    UnresolvedReference,
    /// A stream filter was not supported; the stream was skipped.
    UnsupportedFilter,
    /// An operator had the wrong arity and was skipped.
    MalformedContentStream,
    /// The cross-reference structure was rebuilt by scanning for objects.
    XrefRecovered,
    /// Some other localized problem.
    Other,
}

/// A non-fatal anomaly recorded during parsing.
///
/// Diagnostics are collected on the resulting
/// [`Document`](crate::model::Document) instead of being thrown, so a
/// best-effort partial extraction still succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,

    /// Human-readable description.
    pub message: String,

    /// Page number (1-indexed) the anomaly was found on, if page-scoped.
    pub page: Option<u32>,
}

impl Diagnostic {
    /// Create a document-scoped diagnostic.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            page: None,
        }
    }

    /// Scope this diagnostic to a page (1-indexed).
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnresolvedReference(12, 0);
        assert_eq!(err.to_string(), "Unresolved reference: 12 0 R");

        let err = Error::UnsupportedFilter("CCITTFaxDecode".to_string());
        assert_eq!(err.to_string(), "Unsupported stream filter: CCITTFaxDecode");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_diagnostic_page_scope() {
        let d = Diagnostic::new(DiagnosticKind::UnsupportedFilter, "JBIG2Decode").on_page(3);
        assert_eq!(d.page, Some(3));
        assert_eq!(d.kind, DiagnosticKind::UnsupportedFilter);
    }
}
