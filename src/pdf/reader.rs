//! PDF reader: drives the object graph and content interpreter into
//! the unified document model.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};

use crate::error::{Diagnostic, DiagnosticKind, Error, Result};
use crate::model::{Block, Document, Image, Metadata, Page, Paragraph, TextRun};
use crate::pdf::content::{ContentInterpreter, Emitted, TextSpan};
use crate::pdf::fonts::decode_fallback;
use crate::pdf::graph::ObjectGraph;
use crate::table_detector::TableDetector;
use crate::ParseOptions;

/// Vertical gap beyond which consecutive lines start a new paragraph,
/// as a multiple of the font size.
const PARAGRAPH_GAP_FACTOR: f32 = 1.8;

pub struct PdfReader<'o> {
    options: &'o ParseOptions,
}

impl<'o> PdfReader<'o> {
    pub fn new(options: &'o ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, data: Vec<u8>) -> Result<Document> {
        let mut graph = ObjectGraph::open(data)?;
        let mut metadata = self.read_metadata(&mut graph);
        let mut document = Document::new(Metadata::default());

        let pages = graph.pages()?;
        metadata.page_count = pages.len() as u32;
        let detector = TableDetector::new(self.options.table_detector.clone());

        for (index, node) in pages.iter().enumerate() {
            let number = index as u32 + 1;
            let content = match graph.page_content(&node.dict) {
                Ok(c) => c,
                Err(e) => {
                    // one bad page never fails the document
                    warn!("page {number} content unreadable: {e}");
                    let kind = match e {
                        Error::UnsupportedFilter(_) => DiagnosticKind::UnsupportedFilter,
                        _ => DiagnosticKind::Other,
                    };
                    document
                        .diagnostics
                        .push(Diagnostic::new(kind, e.to_string()).on_page(number));
                    document.add_page(page_shell(node, number));
                    continue;
                }
            };
            let mut interp = ContentInterpreter::new(&mut graph, node.resources.clone());
            interp.run(&content);
            for diag in interp.diagnostics.drain(..) {
                document.diagnostics.push(diag.on_page(number));
            }
            let output = std::mem::take(&mut interp.output);
            drop(interp);

            let mut page = page_shell(node, number);
            self.assemble_blocks(&detector, output, &mut page);
            document.add_page(page);
        }

        for diag in graph.diagnostics.drain(..) {
            document.diagnostics.push(diag);
        }
        document.metadata = metadata;
        Ok(document)
    }

    fn read_metadata(&self, graph: &mut ObjectGraph) -> Metadata {
        let mut meta = Metadata::for_format("pdf");
        meta.version = Some(graph.version.clone());
        let Some(info) = graph.info() else { return meta };
        let text = |key: &str| {
            info.get(key)
                .and_then(|o| o.as_string())
                .map(decode_fallback)
                .filter(|s| !s.is_empty())
        };
        meta.title = text("Title");
        meta.author = text("Author");
        meta.subject = text("Subject");
        meta.keywords = text("Keywords");
        meta.creator = text("Creator");
        meta.producer = text("Producer");
        meta.created = text("CreationDate").as_deref().and_then(parse_pdf_date);
        meta.modified = text("ModDate").as_deref().and_then(parse_pdf_date);
        meta
    }

    /// Interleave text, tables, and images preserving emission order.
    /// A detected table is inserted where its first member span was
    /// emitted; its member spans disappear from the text flow.
    fn assemble_blocks(&self, detector: &TableDetector, output: Vec<Emitted>, page: &mut Page) {
        let runs: Vec<(usize, TextRun)> = output
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Emitted::Text(span) => Some((i, span_to_run(span))),
                _ => None,
            })
            .collect();
        let run_refs: Vec<TextRun> = runs.iter().map(|(_, r)| r.clone()).collect();
        let detected = if self.options.detect_tables {
            detector.detect(&run_refs)
        } else {
            Vec::new()
        };

        // map emission index -> table to insert / membership
        let mut table_at = std::collections::HashMap::new();
        let mut consumed = std::collections::HashSet::new();
        for d in detected {
            let Some(&first) = d.consumed.first().map(|&ri| &runs[ri].0) else {
                continue;
            };
            for &ri in &d.consumed {
                consumed.insert(runs[ri].0);
            }
            table_at.insert(first, d.table);
        }

        let mut paragraph: Vec<TextRun> = Vec::new();
        let mut run_index = 0usize;
        for (i, emitted) in output.into_iter().enumerate() {
            if let Some(table) = table_at.remove(&i) {
                flush_paragraph(&mut paragraph, page);
                page.add_block(Block::Table(table));
            }
            match emitted {
                Emitted::Text(_) => {
                    let run = runs[run_index].1.clone();
                    run_index += 1;
                    if consumed.contains(&i) {
                        continue;
                    }
                    if let Some(last) = paragraph.last() {
                        let gap = (last.y - run.y).abs();
                        let size = last.font_size.max(1.0);
                        if gap > size * PARAGRAPH_GAP_FACTOR {
                            flush_paragraph(&mut paragraph, page);
                        }
                    }
                    paragraph.push(run);
                }
                Emitted::Image(img) => {
                    flush_paragraph(&mut paragraph, page);
                    let data = if self.options.include_images {
                        img.data
                    } else {
                        Vec::new()
                    };
                    page.add_block(Block::Image(Image {
                        data,
                        format: img.format,
                        x: img.x,
                        y: img.y,
                        width: img.width,
                        height: img.height,
                    }));
                }
            }
        }
        flush_paragraph(&mut paragraph, page);
    }
}

fn page_shell(node: &crate::pdf::graph::PageNode, number: u32) -> Page {
    let [llx, lly, urx, ury] = node.media_box;
    Page::new(number, (urx - llx).abs(), (ury - lly).abs())
}

fn span_to_run(span: &TextSpan) -> TextRun {
    TextRun {
        text: span.text.clone(),
        x: span.x,
        y: span.y,
        width: span.width,
        height: span.height,
        font_size: span.font_size,
        font_name: span.font_name.clone(),
    }
}

fn flush_paragraph(runs: &mut Vec<TextRun>, page: &mut Page) {
    if runs.is_empty() {
        return;
    }
    let paragraph = Paragraph::from_runs(std::mem::take(runs));
    if !paragraph.is_empty() {
        page.add_block(Block::Text(paragraph));
    }
}

/// Parse a `D:YYYYMMDDHHmmSS[+-Z]HH'mm'` date. Everything after the
/// year is optional; producers truncate freely.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_start_matches("D:");
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let num = |range: std::ops::Range<usize>, default: u32| -> u32 {
        digits
            .get(range)
            .and_then(|d| d.parse().ok())
            .unwrap_or(default)
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = num(4..6, 1).clamp(1, 12);
    let day = num(6..8, 1).clamp(1, 31);
    let hour = num(8..10, 0).min(23);
    let minute = num(10..12, 0).min(59);
    let second = num(12..14, 0).min(59);

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))?;
    let naive = date.and_hms_opt(hour, minute, second)?;

    let rest = &s[digits.len()..];
    Some(match parse_utc_offset(rest) {
        Some(offset) => to_utc(naive, offset),
        None => Utc.from_utc_datetime(&naive),
    })
}

fn to_utc(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    match offset.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

fn parse_utc_offset(rest: &str) -> Option<FixedOffset> {
    let mut chars = rest.chars();
    let sign = match chars.next()? {
        '+' => 1,
        '-' => -1,
        'Z' => return FixedOffset::east_opt(0),
        _ => return None,
    };
    let digits: String = chars.filter(|c| c.is_ascii_digit()).take(4).collect();
    if digits.len() < 2 {
        return None;
    }
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4).and_then(|d| d.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Convenience entry used by the dispatcher.
pub fn parse(data: Vec<u8>, options: &ParseOptions) -> Result<Document> {
    if !data.windows(5).take(1024).any(|w| w == b"%PDF-") {
        debug!("buffer lacks a PDF header");
        return Err(Error::UnknownFormat);
    }
    PdfReader::new(options).parse(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono::Timelike;

    #[test]
    fn test_pdf_date_full() {
        let dt = parse_pdf_date("D:20230115103000+09'00'").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2023, 1, 15));
        // 10:30 at +09:00 is 01:30 UTC
        assert_eq!((dt.hour(), dt.minute()), (1, 30));
    }

    #[test]
    fn test_pdf_date_truncated() {
        let dt = parse_pdf_date("D:2021").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 1, 1));
        assert!(parse_pdf_date("D:20").is_none());
    }

    #[test]
    fn test_pdf_date_zulu() {
        let dt = parse_pdf_date("D:20220601120000Z").unwrap();
        assert_eq!(dt.hour(), 12);
    }
}
