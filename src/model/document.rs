//! Document-level types.

use super::Page;
use crate::error::Diagnostic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed document, independent of its source format.
///
/// Page order matches source page order. The document is the only
/// artifact that outlives a parse call; all intermediate state (object
/// graphs, page contexts) is dropped when parsing finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, author, etc.)
    pub metadata: Metadata,

    /// Pages in the document
    pub pages: Vec<Page>,

    /// Non-fatal anomalies recorded while parsing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Create an empty document carrying its metadata.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            pages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        if page_num == 0 {
            return None;
        }
        self.pages.get((page_num - 1) as usize)
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// All tables in the document, in page order.
    pub fn tables(&self) -> Vec<&super::Table> {
        self.pages.iter().flat_map(|p| p.tables()).collect()
    }

    /// Total number of images across all pages.
    pub fn image_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.blocks.iter().filter(|b| b.is_image()).count())
            .sum()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Metadata::default())
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Source format label ("pdf", "docx", "pptx", "xlsx", "hwpx")
    pub format: String,

    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Keywords
    pub keywords: Option<String>,

    /// Creator application
    pub creator: Option<String>,

    /// Producer application
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// Format version (e.g., "1.7" for PDF)
    pub version: Option<String>,

    /// Total number of pages
    pub page_count: u32,
}

impl Metadata {
    /// Create metadata for a source format.
    pub fn for_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Paragraph};

    #[test]
    fn test_document_new() {
        let doc = Document::new(Metadata::for_format("pdf"));
        assert!(doc.is_empty());
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.metadata.format, "pdf");
    }

    #[test]
    fn test_plain_text_joins_pages() {
        let mut doc = Document::default();
        let mut p1 = Page::new(1, 612.0, 792.0);
        p1.add_block(Block::Text(Paragraph::with_text("first")));
        let mut p2 = Page::new(2, 612.0, 792.0);
        p2.add_block(Block::Text(Paragraph::with_text("second")));
        doc.add_page(p1);
        doc.add_page(p2);

        assert_eq!(doc.plain_text(), "first\n\nsecond");
        assert_eq!(doc.get_page(2).unwrap().number, 2);
        assert!(doc.get_page(0).is_none());
    }
}
