//! Plain-text renderer.

use crate::model::Document;

pub fn to_text(document: &Document) -> String {
    let mut pages: Vec<String> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let text = page.plain_text();
        if !text.is_empty() {
            pages.push(text);
        }
    }
    pages.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Metadata, Page, Paragraph};

    #[test]
    fn test_pages_joined_with_blank_line() {
        let mut doc = Document::new(Metadata::for_format("pdf"));
        for n in 1..=2 {
            let mut page = Page::letter(n);
            page.add_block(Block::Text(Paragraph::with_text(format!("p{n}"))));
            doc.add_page(page);
        }
        assert_eq!(to_text(&doc), "p1\n\np2");
    }
}
