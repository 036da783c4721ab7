//! Format detection: magic bytes first, container member sniffing
//! for ZIP-based formats, extension hint last.

use log::debug;

use crate::container::ZipContainer;
use crate::error::{Error, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Legacy OLE compound files (doc/ppt/xls/hwp 5.x).
const OLE_MAGIC: &[u8] = &[0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];

/// The closed set of supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Hwpx,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Hwpx => "hwpx",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "hwpx" => Some(DocumentFormat::Hwpx),
            _ => None,
        }
    }
}

/// Detect the format of a byte buffer. Exactly one reader will
/// consume the input; detection never partially applies two.
pub fn detect_format(data: &[u8], hint_extension: Option<&str>) -> Result<DocumentFormat> {
    // the header may follow a little leading garbage
    let head = &data[..data.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        return Ok(DocumentFormat::Pdf);
    }
    if data.starts_with(OLE_MAGIC) {
        return Err(Error::UnsupportedVersion(
            "legacy OLE compound document (doc/ppt/xls/hwp), not supported".into(),
        ));
    }
    if data.starts_with(ZIP_MAGIC) {
        if let Some(format) = sniff_zip(data) {
            return Ok(format);
        }
        debug!("ZIP archive without a recognized office layout");
    }
    if let Some(format) = hint_extension.and_then(DocumentFormat::from_extension) {
        return Ok(format);
    }
    Err(Error::UnknownFormat)
}

/// Identify an office container by its characteristic members.
fn sniff_zip(data: &[u8]) -> Option<DocumentFormat> {
    let mut container = ZipContainer::open(data.to_vec()).ok()?;
    if container.contains("word/document.xml") {
        return Some(DocumentFormat::Docx);
    }
    if container.contains("ppt/presentation.xml")
        || !container.members_matching("ppt/slides/slide", ".xml").is_empty()
    {
        return Some(DocumentFormat::Pptx);
    }
    if container.contains("xl/workbook.xml") {
        return Some(DocumentFormat::Xlsx);
    }
    if !container.members_matching("Contents/section", ".xml").is_empty() {
        return Some(DocumentFormat::Hwpx);
    }
    // OCF-style packages declare their type in a mimetype member
    if let Some(mime) = container.read_optional("mimetype") {
        if mime.starts_with(b"application/hwp+zip") {
            return Some(DocumentFormat::Hwpx);
        }
    }
    None
}
