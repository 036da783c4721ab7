//! HWPX (Hancom Office) reader. The OWPML content schema nests
//! `tbl > tr > tc` with text in `t` runs like OOXML does, so the
//! block assembly is shared; sections map to pages.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::model::{Document, Metadata, Page};

use super::ooxml::collect_blocks;
use super::ZipContainer;

pub fn parse_hwpx(data: Vec<u8>) -> Result<Document> {
    let mut container = ZipContainer::open(data)?;
    let sections = container.members_matching("Contents/section", ".xml");
    if sections.is_empty() {
        return Err(Error::Container("document has no content sections".into()));
    }
    let mut meta = Metadata::for_format("hwpx");
    if let Some(hpf) = container.read_optional("Contents/content.hpf") {
        meta.title = read_package_title(&hpf);
    }

    let mut document = Document::new(Metadata::default());
    for (index, name) in sections.iter().enumerate() {
        let xml = container.read(name)?;
        let mut page = Page::letter(index as u32 + 1);
        page.blocks = collect_blocks(&xml)?;
        document.add_page(page);
    }
    meta.page_count = document.page_count() as u32;
    document.metadata = meta;
    Ok(document)
}

/// `<opf:title>` from the package manifest.
fn read_package_title(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_title = false;
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"title" => in_title = true,
            Event::Text(t) if in_title => {
                let title = t.unescape().ok()?.trim().to_string();
                return (!title.is_empty()).then_some(title);
            }
            Event::End(e) if e.local_name().as_ref() == b"title" => return None,
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testutil::build_zip;
    use crate::model::Block;

    const SECTION: &[u8] = br#"<?xml version="1.0"?>
<hs:sec xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph">
  <hp:p><hp:run><hp:t>HWPX paragraph text</hp:t></hp:run></hp:p>
  <hp:tbl>
    <hp:tr>
      <hp:tc><hp:cellSpan colSpan="1" rowSpan="1"/><hp:subList><hp:p><hp:run><hp:t>key</hp:t></hp:run></hp:p></hp:subList></hp:tc>
      <hp:tc><hp:cellSpan colSpan="1" rowSpan="1"/><hp:subList><hp:p><hp:run><hp:t>value</hp:t></hp:run></hp:p></hp:subList></hp:tc>
    </hp:tr>
    <hp:tr>
      <hp:tc><hp:cellSpan colSpan="2" rowSpan="1"/><hp:subList><hp:p><hp:run><hp:t>wide</hp:t></hp:run></hp:p></hp:subList></hp:tc>
    </hp:tr>
  </hp:tbl>
</hs:sec>"#;

    #[test]
    fn test_hwpx_sections_and_tables() {
        let data = build_zip(&[
            ("Contents/section0.xml", SECTION),
            (
                "Contents/section1.xml",
                br#"<hs:sec xmlns:hp="x"><hp:p><hp:run><hp:t>second section</hp:t></hp:run></hp:p></hs:sec>"#,
            ),
        ]);
        let doc = parse_hwpx(data).unwrap();
        assert_eq!(doc.page_count(), 2);

        let blocks = &doc.pages[0].blocks;
        assert!(blocks[0].is_text());
        let Block::Table(table) = &blocks[1] else {
            panic!("expected a table block");
        };
        assert_eq!(table.rows[0].cells[1].text, "value");
        assert_eq!(table.rows[1].cells[0].colspan, 2);
        assert_eq!(doc.pages[1].plain_text(), "second section");
    }

    #[test]
    fn test_hwpx_title_from_manifest() {
        let hpf = br#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf/">
<opf:metadata><opf:title>Annual Plan</opf:title></opf:metadata></opf:package>"#;
        let data = build_zip(&[
            (
                "Contents/section0.xml",
                br#"<hs:sec><hp:p><hp:run><hp:t>x</hp:t></hp:run></hp:p></hs:sec>"# as &[u8],
            ),
            ("Contents/content.hpf", hpf),
        ]);
        let doc = parse_hwpx(data).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Annual Plan"));
    }
}
