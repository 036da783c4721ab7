//! Page-level types.

use super::Table;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// A single page in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Content blocks on the page, in emission (reading) order
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// Create a new page with standard Letter size (8.5 x 11 inches).
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Text(p) => Some(p.plain_text()),
                Block::Table(t) => Some(t.plain_text()),
                Block::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Iterate over tables on this page.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Check if the page is empty (no content blocks).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::letter(1)
    }
}

/// A content block on a page.
///
/// The closed set of block variants every reader produces; this is the
/// contract that lets the table detector and the renderers stay
/// format-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A run of text lines forming one paragraph
    Text(Paragraph),

    /// A table
    Table(Table),

    /// An image placed on the page
    Image(Image),
}

impl Block {
    /// Check if this block is a text block.
    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text(_))
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// Check if this block is an image.
    pub fn is_image(&self) -> bool {
        matches!(self, Block::Image(_))
    }
}

/// A paragraph: one or more text runs in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Text runs making up the paragraph
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    /// Create a paragraph from a single plain-text run.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::plain(text)],
        }
    }

    /// Create a paragraph from runs.
    pub fn from_runs(runs: Vec<TextRun>) -> Self {
        Self { runs }
    }

    /// Get the concatenated text of all runs.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (i, run) in self.runs.iter().enumerate() {
            if i > 0 && !out.ends_with(char::is_whitespace) && !run.text.starts_with(char::is_whitespace) {
                out.push(' ');
            }
            out.push_str(&run.text);
        }
        out
    }

    /// Check if the paragraph has no visible text.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.trim().is_empty())
    }
}

/// A positioned run of text, immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Decoded text
    pub text: String,

    /// X origin in page space (points)
    pub x: f32,

    /// Y origin in page space (points)
    pub y: f32,

    /// Approximate bounding width (points)
    pub width: f32,

    /// Approximate bounding height (points)
    pub height: f32,

    /// Effective font size (points)
    pub font_size: f32,

    /// Resource name of the active font
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub font_name: String,
}

impl TextRun {
    /// Create an unpositioned run (container formats carry no geometry).
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            font_size: 0.0,
            font_name: String::new(),
        }
    }

    /// Vertical center of the run's bounding box.
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Encoded image payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG
    Png,
    /// JPEG (PDF DCTDecode payloads)
    Jpeg,
    /// JPEG 2000 (PDF JPXDecode payloads)
    Jp2,
    /// Undetermined raw sample data
    Raw,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Jp2 => "jp2",
            ImageFormat::Raw => "raw",
        }
    }
}

/// An image placed on a page. Owned exclusively by its containing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Encoded image bytes (base64 in JSON; empty when not extracted)
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,

    /// Payload format tag
    pub format: ImageFormat,

    /// X origin of placement (points)
    pub x: f32,

    /// Y origin of placement (points)
    pub y: f32,

    /// Placed width (points)
    pub width: f32,

    /// Placed height (points)
    pub height: f32,
}

fn serialize_base64<S: serde::Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(data))
}

fn deserialize_base64<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(d)?;
    BASE64.decode(text).map_err(serde::de::Error::custom)
}
