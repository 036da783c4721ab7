//! Markdown renderer: paragraphs as prose, tables as pipe grids.

use crate::model::{Block, Document, Table};

use super::options::RenderOptions;

pub fn to_markdown(document: &Document, options: &RenderOptions) -> String {
    let mut out = String::new();
    for (index, page) in document.pages.iter().enumerate() {
        if index > 0 && options.page_breaks {
            out.push_str("\n---\n\n");
        }
        for block in &page.blocks {
            match block {
                Block::Text(paragraph) => {
                    let text = paragraph.plain_text();
                    if !text.is_empty() {
                        out.push_str(&text);
                        out.push_str("\n\n");
                    }
                }
                Block::Table(table) => {
                    out.push_str(&table_to_markdown(table));
                    out.push('\n');
                }
                Block::Image(image) => {
                    if options.image_placeholders {
                        out.push_str(&format!(
                            "![image]({}x{} {})\n\n",
                            image.width.round() as i64,
                            image.height.round() as i64,
                            image.format.as_str(),
                        ));
                    }
                }
            }
        }
    }
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

/// Pipe-grid syntax. Row 2 is always the alignment separator; every
/// row is padded to the table's declared column count.
fn table_to_markdown(table: &Table) -> String {
    let cols = table.column_count();
    if cols == 0 {
        return String::new();
    }
    let mut out = String::new();
    for (index, row) in table.rows.iter().enumerate() {
        out.push('|');
        for c in 0..cols {
            let text = row
                .cells
                .get(c)
                .map(|cell| escape_cell(&cell.text))
                .unwrap_or_default();
            out.push(' ');
            out.push_str(&text);
            out.push_str(" |");
        }
        out.push('\n');
        if index == 0 {
            out.push('|');
            for _ in 0..cols {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
