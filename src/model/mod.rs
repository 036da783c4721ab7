//! Unified document model.
//!
//! This module defines the format-agnostic intermediate representation
//! that every reader (PDF, OOXML, HWPX) produces and every consumer
//! (table detector, renderers) consumes: an ordered sequence of pages,
//! each an ordered sequence of blocks (text, table, or image).

mod document;
mod page;
mod table;

pub use document::{Document, Metadata};
pub use page::{Block, Image, ImageFormat, Page, Paragraph, TextRun};
pub use table::{Table, TableCell, TableRow};
