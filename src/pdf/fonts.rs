//! Font text decoding: ToUnicode CMaps, CID double-byte codes, and
//! the latin-1 fallback for fonts without a usable map.

use std::collections::HashMap;

use log::debug;

use crate::pdf::graph::ObjectGraph;
use crate::pdf::lexer::{Lexer, Token};
use crate::pdf::object::{Dictionary, Object};

/// Per-font decoding state, built once from the page's resource
/// dictionary and reused across text-showing operators.
#[derive(Debug, Clone, Default)]
pub struct Font {
    pub name: String,
    /// Type0 composite fonts consume two bytes per code.
    pub is_cid: bool,
    /// code -> text, from the ToUnicode CMap when one exists
    to_unicode: HashMap<u32, String>,
}

impl Font {
    /// Build a font from its dictionary, pulling the ToUnicode CMap
    /// through the graph. Never fails; a font we cannot understand
    /// decodes through the fallback path.
    pub fn from_dict(graph: &mut ObjectGraph, dict: &Dictionary) -> Self {
        let name = dict
            .get_name("BaseFont")
            .map(|n| n.trim_start_matches(|c: char| c != '+').trim_start_matches('+'))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| dict.get_name("BaseFont").unwrap_or(""))
            .to_string();
        let is_cid = dict.get_name("Subtype") == Some("Type0");

        let mut to_unicode = HashMap::new();
        if let Some(tu) = dict.get("ToUnicode") {
            if let Object::Stream(ref s) = graph.resolve_or_null(tu) {
                match graph.decode_stream(s) {
                    Ok(cmap) => to_unicode = parse_cmap(&cmap),
                    Err(e) => debug!("ToUnicode stream undecodable: {e}"),
                }
            }
        }

        Self {
            name,
            is_cid,
            to_unicode,
        }
    }

    /// Decode one show-string through this font.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.is_cid || (!self.to_unicode.is_empty() && self.looks_double_byte()) {
            return self.decode_wide(bytes);
        }
        if !self.to_unicode.is_empty() {
            return bytes
                .iter()
                .map(|&b| self.map_code(b as u32))
                .collect();
        }
        decode_fallback(bytes)
    }

    fn decode_wide(&self, bytes: &[u8]) -> String {
        let mut out = String::new();
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            let code = u16::from_be_bytes([pair[0], pair[1]]) as u32;
            out.push_str(&self.map_code(code));
        }
        if let [odd] = chunks.remainder() {
            out.push_str(&self.map_code(*odd as u32));
        }
        out
    }

    fn map_code(&self, code: u32) -> String {
        match self.to_unicode.get(&code) {
            Some(s) => s.clone(),
            // unmapped codes degrade to a placeholder, never fail
            None => "\u{fffd}".to_string(),
        }
    }

    /// Simple fonts occasionally carry a CMap keyed on 2-byte codes
    /// without declaring Type0.
    fn looks_double_byte(&self) -> bool {
        self.to_unicode.keys().all(|&c| c > 0xff) && !self.to_unicode.is_empty()
    }
}

/// Strings outside any font context (metadata, outline titles):
/// UTF-16BE when the BOM says so, latin-1 otherwise.
pub fn decode_fallback(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xfe, 0xff]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|p| u16::from_be_bytes([p[0], p[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Extract bfchar/bfrange mappings from a ToUnicode CMap. The CMap
/// language is PostScript-flavored; the object tokenizer handles the
/// token shapes we need.
fn parse_cmap(data: &[u8]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let mut lexer = Lexer::new(data);
    loop {
        let token = match lexer.next_token() {
            Ok(Some(t)) => t,
            Ok(None) => break,
            Err(_) => {
                // skip one byte past whatever confused the tokenizer
                let pos = lexer.pos();
                lexer.seek(pos + 1);
                continue;
            }
        };
        match token {
            Token::Keyword(ref k) if k == "beginbfchar" => parse_bfchar(&mut lexer, &mut map),
            Token::Keyword(ref k) if k == "beginbfrange" => parse_bfrange(&mut lexer, &mut map),
            _ => {}
        }
    }
    map
}

fn parse_bfchar(lexer: &mut Lexer<'_>, map: &mut HashMap<u32, String>) {
    loop {
        let src = match lexer.next_token() {
            Ok(Some(Token::String(s))) => s,
            Ok(Some(Token::Keyword(ref k))) if k == "endbfchar" => return,
            _ => return,
        };
        let dst = match lexer.next_token() {
            Ok(Some(Token::String(s))) => s,
            _ => return,
        };
        if let Some(code) = bytes_to_code(&src) {
            map.insert(code, utf16be_to_string(&dst));
        }
    }
}

fn parse_bfrange(lexer: &mut Lexer<'_>, map: &mut HashMap<u32, String>) {
    loop {
        let lo = match lexer.next_token() {
            Ok(Some(Token::String(s))) => s,
            Ok(Some(Token::Keyword(ref k))) if k == "endbfrange" => return,
            _ => return,
        };
        let hi = match lexer.next_token() {
            Ok(Some(Token::String(s))) => s,
            _ => return,
        };
        let (Some(lo), Some(hi)) = (bytes_to_code(&lo), bytes_to_code(&hi)) else {
            return;
        };
        if hi < lo || hi - lo > 0xffff {
            return;
        }
        match lexer.next_token() {
            Ok(Some(Token::String(base))) => {
                // scalar form: dst increments with the code
                for (i, code) in (lo..=hi).enumerate() {
                    let mut dst = base.clone();
                    if dst.len() >= 2 {
                        let last = dst.len() - 2;
                        let v = u16::from_be_bytes([dst[last], dst[last + 1]])
                            .wrapping_add(i as u16);
                        dst[last..].copy_from_slice(&v.to_be_bytes());
                    } else if let Some(b) = dst.last_mut() {
                        *b = b.wrapping_add(i as u8);
                    }
                    map.insert(code, utf16be_to_string(&dst));
                }
            }
            Ok(Some(Token::ArrayOpen)) => {
                // array form: one dst string per code
                let mut code = lo;
                loop {
                    match lexer.next_token() {
                        Ok(Some(Token::String(dst))) => {
                            if code <= hi {
                                map.insert(code, utf16be_to_string(&dst));
                                code += 1;
                            }
                        }
                        Ok(Some(Token::ArrayClose)) => break,
                        _ => return,
                    }
                }
            }
            _ => return,
        }
    }
}

fn bytes_to_code(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |v, &b| (v << 8) | b as u32))
}

fn utf16be_to_string(bytes: &[u8]) -> String {
    if bytes.len() % 2 != 0 {
        // single-byte destination, take it as latin-1
        return bytes.iter().map(|&b| b as char).collect();
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|p| u16::from_be_bytes([p[0], p[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin begincmap
1 begincodespacerange <0000> <FFFF> endcodespacerange
2 beginbfchar
<0048> <0048>
<0065> <0065>
endbfchar
1 beginbfrange
<006C> <006F> <006C>
endbfrange
endcmap end end";

    fn cid_font() -> Font {
        Font {
            name: "TestFont".into(),
            is_cid: true,
            to_unicode: parse_cmap(CMAP),
        }
    }

    #[test]
    fn test_bfchar_and_bfrange() {
        let map = parse_cmap(CMAP);
        assert_eq!(map.get(&0x48).map(String::as_str), Some("H"));
        assert_eq!(map.get(&0x6C).map(String::as_str), Some("l"));
        assert_eq!(map.get(&0x6F).map(String::as_str), Some("o"));
        assert_eq!(map.get(&0x70), None);
    }

    #[test]
    fn test_cid_decode() {
        let font = cid_font();
        let bytes = [0x00, 0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F];
        assert_eq!(font.decode(&bytes), "Hello");
    }

    #[test]
    fn test_unmapped_code_is_placeholder() {
        let font = cid_font();
        assert_eq!(font.decode(&[0x12, 0x34]), "\u{fffd}");
    }

    #[test]
    fn test_bfrange_array_form() {
        let cmap = b"1 beginbfrange <01> <03> [<0041> <0042> <0043>] endbfrange";
        let map = parse_cmap(cmap);
        assert_eq!(map.get(&1).map(String::as_str), Some("A"));
        assert_eq!(map.get(&3).map(String::as_str), Some("C"));
    }

    #[test]
    fn test_fallback_utf16_bom() {
        let bytes = [0xfe, 0xff, 0x00, 0x41, 0xac, 0x00];
        assert_eq!(decode_fallback(&bytes), "A\u{ac00}");
    }

    #[test]
    fn test_fallback_latin1() {
        assert_eq!(decode_fallback(b"caf\xe9"), "caf\u{e9}");
    }
}
