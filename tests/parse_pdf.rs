mod common;

use common::{show_text, PdfBuilder};
use undoc::model::Block;
use undoc::pdf::{Object, ObjectGraph};
use undoc::{parse_bytes, parse_with, ParseOptions};

#[test]
fn parses_single_page_text() {
    let data = PdfBuilder::single_page(&show_text("Hello world", 72.0, 720.0)).build();
    let doc = parse_bytes(data).unwrap();

    assert_eq!(doc.metadata.format, "pdf");
    assert_eq!(doc.pages.len(), 1);
    assert_eq!(doc.pages[0].number, 1);
    let text = doc.plain_text();
    assert!(text.contains("Hello world"), "got: {text:?}");
}

#[test]
fn parse_is_idempotent() {
    let mut content = Vec::new();
    content.extend_from_slice(&show_text("First line", 72.0, 720.0));
    content.push(b' ');
    content.extend_from_slice(&show_text("Second line", 72.0, 650.0));
    let data = PdfBuilder::single_page(&content).build();

    let first = parse_bytes(data.clone()).unwrap();
    let second = parse_bytes(data).unwrap();
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.metadata.page_count, second.metadata.page_count);
}

#[test]
fn json_round_trip_preserves_structure() {
    let data = PdfBuilder::single_page(&show_text("Round trip", 100.0, 500.0)).build();
    let doc = parse_bytes(data).unwrap();

    let json = undoc::render::to_json(&doc, undoc::render::JsonFormat::Pretty).unwrap();
    let back: undoc::model::Document = serde_json::from_str(&json).unwrap();
    assert_eq!(doc.pages, back.pages);
    assert_eq!(doc.metadata.title, back.metadata.title);
}

#[test]
fn xref_stream_resolves_every_object() {
    let builder = PdfBuilder::single_page(&show_text("Stream xref", 72.0, 720.0));
    let data = builder.build_xref_stream();

    let mut graph = ObjectGraph::open(data).unwrap();
    for id in 1..=4u32 {
        let obj = graph
            .resolve_ref((id, 0))
            .unwrap_or_else(|e| panic!("object {id} failed: {e}"));
        assert!(
            !matches!(obj, Object::Null),
            "object {id} resolved to null"
        );
    }
}

#[test]
fn dangling_reference_fails_alone_not_globally() {
    // Object 5 is referenced as the page contents but never written,
    // so neither the xref stream nor a byte scan can locate it.
    let builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 5 0 R >>",
        );
    let data = builder.build_xref_stream();

    let mut graph = ObjectGraph::open(data).unwrap();
    for id in 1..=3u32 {
        assert!(graph.resolve_ref((id, 0)).is_ok(), "object {id} lost");
    }
    let err = graph.resolve_ref((5, 0));
    assert!(
        matches!(err, Err(undoc::Error::UnresolvedReference(5, 0))),
        "got: {err:?}"
    );
}

#[test]
fn unbalanced_graphics_state_does_not_fail() {
    // One stray restore and one unclosed save around real text.
    let content = b"Q q BT /F1 12 Tf 72 720 Td (Survivor) Tj ET q".to_vec();
    let data = PdfBuilder::single_page(&content).build();
    let doc = parse_bytes(data).unwrap();
    assert!(doc.plain_text().contains("Survivor"));
}

#[test]
fn corrupt_xref_offsets_recover_by_scanning() {
    let data = PdfBuilder::single_page(&show_text("Recovered", 72.0, 720.0)).build_shifted(1);
    let doc = parse_bytes(data).unwrap();

    assert!(
        doc.plain_text().contains("Recovered"),
        "scan recovery lost text"
    );
    assert!(
        doc.diagnostics
            .iter()
            .any(|d| d.kind == undoc::DiagnosticKind::XrefRecovered),
        "expected a recovery diagnostic, got {:?}",
        doc.diagnostics
    );
}

#[test]
fn malformed_operator_skips_but_keeps_going() {
    // Tf with a single operand, then a valid show.
    let content = b"BT /F1 Tf 72 720 Td (Kept) Tj ET".to_vec();
    let data = PdfBuilder::single_page(&content).build();
    let doc = parse_bytes(data).unwrap();
    assert!(doc.plain_text().contains("Kept"));
    assert!(doc
        .diagnostics
        .iter()
        .any(|d| d.kind == undoc::DiagnosticKind::MalformedContentStream));
}

#[test]
fn bad_stream_in_contents_array_keeps_siblings() {
    // second element of the /Contents array declares a filter the
    // engine does not implement; the first element's text must survive
    let keep = show_text("Kept text", 72.0, 720.0);
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents [4 0 R 5 0 R] >>",
        )
        .stream_object(4, "", &keep)
        .stream_object(5, "/Filter /Bogus ", b"\x00\x01\x02")
        .build();
    let doc = parse_bytes(data).unwrap();

    assert!(doc.plain_text().contains("Kept text"));
    assert!(
        doc.diagnostics
            .iter()
            .any(|d| d.kind == undoc::DiagnosticKind::UnsupportedFilter),
        "expected a filter diagnostic, got {:?}",
        doc.diagnostics
    );
}

#[test]
fn encrypted_document_is_rejected() {
    let mut data = PdfBuilder::single_page(&show_text("secret", 72.0, 720.0)).build();
    // Splice /Encrypt into the trailer dictionary. The startxref
    // offset stays valid because the table precedes the trailer.
    let trailer = b"trailer\n<< ".as_slice();
    let at = data
        .windows(trailer.len())
        .position(|w| w == trailer)
        .unwrap();
    let splice = b"/Encrypt 9 0 R ".to_vec();
    data.splice(at + trailer.len()..at + trailer.len(), splice);
    let err = parse_bytes(data);
    assert!(matches!(err, Err(undoc::Error::Encrypted)), "got: {err:?}");
}

#[test]
fn table_detection_end_to_end() {
    let mut content = Vec::new();
    let cells = [
        ("Name", "Qty", "Price"),
        ("Apple", "4", "1.20"),
        ("Pear", "2", "0.80"),
    ];
    for (i, (a, b, c)) in cells.iter().enumerate() {
        let y = 700.0 - i as f32 * 20.0;
        content.extend_from_slice(&show_text(a, 72.0, y));
        content.push(b' ');
        content.extend_from_slice(&show_text(b, 200.0, y));
        content.push(b' ');
        content.extend_from_slice(&show_text(c, 320.0, y));
        content.push(b' ');
    }
    let data = PdfBuilder::single_page(&content).build();

    let doc = parse_with(data, Some("pdf"), &ParseOptions::default()).unwrap();
    let tables = doc.tables();
    assert_eq!(tables.len(), 1, "blocks: {:?}", doc.pages[0].blocks);
    assert_eq!(tables[0].row_count(), 3);
    assert_eq!(tables[0].column_count(), 3);
    assert_eq!(tables[0].rows[1].cells[0].text, "Apple");
}

#[test]
fn table_detection_can_be_disabled() {
    let mut content = Vec::new();
    for i in 0..3 {
        let y = 700.0 - i as f32 * 20.0;
        content.extend_from_slice(&show_text("a", 72.0, y));
        content.push(b' ');
        content.extend_from_slice(&show_text("b", 200.0, y));
        content.push(b' ');
    }
    let data = PdfBuilder::single_page(&content).build();

    let options = ParseOptions {
        detect_tables: false,
        ..ParseOptions::default()
    };
    let doc = parse_with(data, Some("pdf"), &options).unwrap();
    assert!(doc.tables().is_empty());
    assert!(doc.pages[0]
        .blocks
        .iter()
        .all(|b| matches!(b, Block::Text(_))));
}
