//! OOXML readers: WordprocessingML, PresentationML, SpreadsheetML.

use chrono::{DateTime, Utc};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::model::{Block, Document, Metadata, Page, Paragraph, Table, TableCell, TableRow};

use super::ZipContainer;

/// Attribute value by local name, ignoring the namespace prefix.
fn attr_local(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn xml_reader(data: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(false);
    reader
}

/// Shared metadata from `docProps/core.xml`.
fn read_core_properties(container: &mut ZipContainer, meta: &mut Metadata) {
    let Some(xml) = container.read_optional("docProps/core.xml") else {
        return;
    };
    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current = Some(e.local_name().as_ref().to_vec());
                text.clear();
            }
            Ok(Event::Text(t)) => {
                if current.is_some() {
                    if let Ok(s) = t.unescape() {
                        text.push_str(&s);
                    }
                }
            }
            Ok(Event::End(_)) => {
                if let Some(name) = current.take() {
                    let value = text.trim().to_string();
                    if value.is_empty() {
                        buf.clear();
                        continue;
                    }
                    match name.as_slice() {
                        b"title" => meta.title = Some(value),
                        b"creator" => meta.author = Some(value),
                        b"subject" => meta.subject = Some(value),
                        b"keywords" => meta.keywords = Some(value),
                        b"created" => meta.created = parse_w3c_date(&value),
                        b"modified" => meta.modified = parse_w3c_date(&value),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("core properties unreadable: {e}");
                break;
            }
        }
        buf.clear();
    }
}

fn parse_w3c_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Block assembler shared by the WordprocessingML and DrawingML
/// table shapes: both nest `tbl > tr > tc` with text in `t` runs.
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    paragraph: String,
    in_text: bool,
    tables: Vec<Table>,
    row: Option<TableRow>,
    cell_depth: usize,
    cell_text: String,
    cell_colspan: u8,
    cell_rowspan: u8,
}

impl BlockBuilder {
    fn start_element(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"t" => self.in_text = true,
            b"tbl" => self.tables.push(Table::new()),
            b"tr" => self.row = Some(TableRow::default()),
            b"tc" => {
                self.cell_depth += 1;
                if self.cell_depth == 1 {
                    self.cell_text.clear();
                    self.cell_colspan = attr_u8(e, b"gridSpan");
                    self.cell_rowspan = attr_u8(e, b"rowSpan");
                }
            }
            _ => {}
        }
    }

    fn empty_element(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            // <w:gridSpan w:val="2"/> inside tcPr
            b"gridSpan" if self.cell_depth > 0 => {
                if let Some(v) = attr_local(e, b"val").and_then(|v| v.parse().ok()) {
                    self.cell_colspan = v;
                }
            }
            // <hp:cellSpan colSpan="2" rowSpan="1"/>
            b"cellSpan" if self.cell_depth > 0 => {
                self.cell_colspan = attr_u8(e, b"colSpan");
                self.cell_rowspan = attr_u8(e, b"rowSpan");
            }
            b"br" => self.text(" "),
            _ => {}
        }
    }

    fn text(&mut self, s: &str) {
        if self.cell_depth > 0 {
            self.cell_text.push_str(s);
        } else {
            self.paragraph.push_str(s);
        }
    }

    fn end_element(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_text = false,
            b"p" => {
                if self.cell_depth > 0 {
                    if !self.cell_text.is_empty() && !self.cell_text.ends_with(' ') {
                        self.cell_text.push(' ');
                    }
                } else {
                    let text = self.paragraph.trim().to_string();
                    self.paragraph.clear();
                    if !text.is_empty() {
                        self.blocks.push(Block::Text(Paragraph::with_text(text)));
                    }
                }
            }
            b"tc" => {
                if self.cell_depth == 1 {
                    let mut cell = TableCell::text(self.cell_text.trim());
                    if self.cell_colspan > 1 {
                        cell = cell.colspan(self.cell_colspan);
                    }
                    if self.cell_rowspan > 1 {
                        cell = cell.rowspan(self.cell_rowspan);
                    }
                    if let Some(row) = self.row.as_mut() {
                        row.cells.push(cell);
                    }
                }
                self.cell_depth = self.cell_depth.saturating_sub(1);
            }
            b"tr" => {
                if let (Some(row), Some(table)) = (self.row.take(), self.tables.last_mut()) {
                    table.add_row(row);
                }
            }
            b"tbl" => {
                if let Some(mut table) = self.tables.pop() {
                    table.normalize();
                    if self.tables.is_empty() {
                        if !table.is_empty() {
                            self.blocks.push(Block::Table(table));
                        }
                    } else {
                        // nested table flattens into the outer cell
                        self.cell_text.push_str(&table.plain_text());
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.end_element(b"p");
        self.blocks
    }
}

fn attr_u8(e: &BytesStart<'_>, name: &[u8]) -> u8 {
    attr_local(e, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

pub(super) fn collect_blocks(xml: &[u8]) -> Result<Vec<Block>> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut builder = BlockBuilder::default();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => builder.start_element(&e),
            Event::Empty(e) => builder.empty_element(&e),
            Event::Text(t) => {
                if builder.in_text {
                    let s = t.unescape().map_err(Error::from)?;
                    builder.text(&s);
                }
            }
            Event::End(e) => builder.end_element(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(builder.finish())
}

/// WordprocessingML. Word has no page concept in the XML; the whole
/// body lands on one synthetic page.
pub fn parse_docx(data: Vec<u8>) -> Result<Document> {
    let mut container = ZipContainer::open(data)?;
    let body = container.read("word/document.xml")?;
    let mut meta = Metadata::for_format("docx");
    read_core_properties(&mut container, &mut meta);

    let mut page = Page::letter(1);
    page.blocks = collect_blocks(&body)?;
    meta.page_count = 1;
    let mut document = Document::new(meta);
    document.add_page(page);
    Ok(document)
}

/// PresentationML. One page per slide, in slide-number order.
pub fn parse_pptx(data: Vec<u8>) -> Result<Document> {
    let mut container = ZipContainer::open(data)?;
    let slides = container.members_matching("ppt/slides/slide", ".xml");
    if slides.is_empty() {
        return Err(Error::Container("presentation has no slides".into()));
    }
    let mut meta = Metadata::for_format("pptx");
    read_core_properties(&mut container, &mut meta);

    let mut document = Document::new(Metadata::default());
    for (index, name) in slides.iter().enumerate() {
        let xml = container.read(name)?;
        let mut page = Page::letter(index as u32 + 1);
        page.blocks = collect_blocks(&xml)?;
        document.add_page(page);
    }
    meta.page_count = document.page_count() as u32;
    document.metadata = meta;
    Ok(document)
}

/// SpreadsheetML. One page per worksheet; each sheet is one table.
pub fn parse_xlsx(data: Vec<u8>) -> Result<Document> {
    let mut container = ZipContainer::open(data)?;
    let sheets = container.members_matching("xl/worksheets/sheet", ".xml");
    if sheets.is_empty() {
        return Err(Error::Container("workbook has no worksheets".into()));
    }
    let shared = container
        .read_optional("xl/sharedStrings.xml")
        .map(|xml| parse_shared_strings(&xml))
        .transpose()?
        .unwrap_or_default();
    let mut meta = Metadata::for_format("xlsx");
    read_core_properties(&mut container, &mut meta);

    let mut document = Document::new(Metadata::default());
    for (index, name) in sheets.iter().enumerate() {
        let xml = container.read(name)?;
        let table = parse_worksheet(&xml, &shared)?;
        let mut page = Page::letter(index as u32 + 1);
        if !table.is_empty() {
            page.add_block(Block::Table(table));
        }
        document.add_page(page);
    }
    meta.page_count = document.page_count() as u32;
    document.metadata = meta;
    Ok(document)
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" => in_t = true,
                _ => {}
            },
            Event::Text(t) => {
                if in_si && in_t {
                    current.push_str(&t.unescape().map_err(Error::from)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn parse_worksheet(xml: &[u8], shared: &[String]) -> Result<Table> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut table = Table::new();
    let mut row: Option<Vec<TableCell>> = None;
    let mut cell_type = String::new();
    let mut cell_column = 0usize;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    cell_type = attr_local(&e, b"t").unwrap_or_default();
                    cell_column = attr_local(&e, b"r")
                        .map(|r| column_index(&r))
                        .unwrap_or_else(|| row.as_ref().map(Vec::len).unwrap_or(0));
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"row" {
                    table.add_row(TableRow::default());
                }
            }
            Event::Text(t) => {
                if in_value {
                    value.push_str(&t.unescape().map_err(Error::from)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cells) = row.as_mut() {
                        let text = if cell_type == "s" {
                            let idx: usize = value.trim().parse().unwrap_or(usize::MAX);
                            shared.get(idx).cloned().unwrap_or_default()
                        } else {
                            value.clone()
                        };
                        // absolute column position, gaps padded
                        while cells.len() < cell_column {
                            cells.push(TableCell::empty());
                        }
                        cells.push(TableCell::text(text.trim()));
                    }
                }
                b"row" => {
                    if let Some(cells) = row.take() {
                        table.add_row(TableRow::new(cells));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    table.normalize();
    Ok(table)
}

/// `"B7"` -> zero-based column 1.
fn column_index(cell_ref: &str) -> usize {
    let mut col = 0usize;
    for c in cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()) {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    col.saturating_sub(1)
}
