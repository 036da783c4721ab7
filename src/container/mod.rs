//! ZIP-container formats: OOXML (docx/pptx/xlsx) and HWPX. Each
//! reader pulls XML parts out of the archive and emits the same
//! block variants as the PDF path.

mod hwpx;
mod ooxml;

pub use hwpx::parse_hwpx;
pub use ooxml::{parse_docx, parse_pptx, parse_xlsx};

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::{Error, Result};

/// A ZIP archive with the access patterns the readers need.
pub struct ZipContainer {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipContainer {
    pub fn open(data: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        Ok(Self { archive })
    }

    /// Read a member in full.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|_| Error::Container(format!("archive member '{name}' missing")))?;
        let mut out = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn read_optional(&mut self, name: &str) -> Option<Vec<u8>> {
        self.read(name).ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Member names matching `prefix…suffix`, ordered by the number
    /// embedded in the name so `slide10` sorts after `slide2`.
    pub fn members_matching(&self, prefix: &str, suffix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
            .map(String::from)
            .collect();
        names.sort_by_key(|n| embedded_number(n));
        names
    }
}

fn embedded_number(name: &str) -> u32 {
    name.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build an in-memory archive for reader tests.
    pub(crate) fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::build_zip;
    use super::*;

    #[test]
    fn test_member_ordering_is_numeric() {
        let data = build_zip(&[
            ("ppt/slides/slide10.xml", b"a"),
            ("ppt/slides/slide2.xml", b"b"),
            ("ppt/slides/slide1.xml", b"c"),
        ]);
        let container = ZipContainer::open(data).unwrap();
        let names = container.members_matching("ppt/slides/slide", ".xml");
        assert_eq!(
            names,
            vec![
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/slides/slide10.xml"
            ]
        );
    }

    #[test]
    fn test_missing_member_is_an_error() {
        let data = build_zip(&[("a.xml", b"x")]);
        let mut container = ZipContainer::open(data).unwrap();
        assert!(container.read("b.xml").is_err());
        assert!(container.read_optional("a.xml").is_some());
    }
}
