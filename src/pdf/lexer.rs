//! Byte-level tokenizer for the PDF object and content-stream languages.

use crate::error::{Error, Result};

/// A structural token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f32),
    /// Literal or hex string, already unescaped to raw bytes.
    String(Vec<u8>),
    /// Name without the leading slash, `#xx` escapes resolved.
    Name(String),
    ArrayOpen,
    ArrayClose,
    DictOpen,
    DictClose,
    /// Bare keyword: `obj`, `endobj`, `stream`, `R`, `true`, content
    /// operators, and anything else that is not a number or delimiter.
    Keyword(String),
}

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Cursor over a raw byte buffer.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Skip whitespace and `%` comments (to end of line).
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(b) = self.peek_byte() {
                    self.pos += 1;
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Consume a single end-of-line marker (CR, LF, or CRLF).
    pub fn skip_eol(&mut self) {
        match self.peek_byte() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek_byte() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    /// True if the remaining input starts with `tag` at a token
    /// boundary; consumes it when it does.
    pub fn eat_keyword(&mut self, tag: &[u8]) -> bool {
        self.skip_whitespace();
        if self.remaining().starts_with(tag) {
            let after = self.data.get(self.pos + tag.len()).copied();
            if after.is_none() || !is_regular(after.unwrap_or(b' ')) {
                self.pos += tag.len();
                return true;
            }
        }
        false
    }

    /// Next token, or None at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let b = match self.peek_byte() {
            Some(b) => b,
            None => return Ok(None),
        };
        let token = match b {
            b'[' => {
                self.pos += 1;
                Token::ArrayOpen
            }
            b']' => {
                self.pos += 1;
                Token::ArrayClose
            }
            b'<' => {
                if self.remaining().starts_with(b"<<") {
                    self.pos += 2;
                    Token::DictOpen
                } else {
                    Token::String(self.read_hex_string()?)
                }
            }
            b'>' => {
                if self.remaining().starts_with(b">>") {
                    self.pos += 2;
                    Token::DictClose
                } else {
                    return Err(Error::Parse(format!(
                        "unexpected '>' at offset {}",
                        self.pos
                    )));
                }
            }
            b'(' => Token::String(self.read_literal_string()?),
            b'/' => Token::Name(self.read_name()),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            b'{' | b'}' => {
                // Type 4 function bodies; irrelevant for extraction.
                self.pos += 1;
                Token::Keyword((b as char).to_string())
            }
            _ => {
                let start = self.pos;
                while self.peek_byte().is_some_and(is_regular) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(Error::Parse(format!(
                        "unexpected byte 0x{b:02x} at offset {start}"
                    )));
                }
                Token::Keyword(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
            }
        };
        Ok(Some(token))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut real = false;
        if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek_byte() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| Error::Parse(format!("bad number at offset {start}")))?;
        if real {
            // ".5" and "4." forms are legal in PDF
            let normalized = if text.starts_with('.') {
                format!("0{text}")
            } else if text.starts_with("-.") {
                format!("-0{}", &text[1..])
            } else {
                text.to_string()
            };
            let v: f32 = normalized
                .trim_end_matches('.')
                .parse()
                .map_err(|_| Error::Parse(format!("bad real '{text}' at offset {start}")))?;
            Ok(Token::Real(v))
        } else {
            let v: i64 = text
                .parse()
                .map_err(|_| Error::Parse(format!("bad integer '{text}' at offset {start}")))?;
            Ok(Token::Integer(v))
        }
    }

    fn read_name(&mut self) -> String {
        self.pos += 1; // slash
        let mut out = String::new();
        while let Some(b) = self.peek_byte() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                let hi = self.peek_byte().and_then(hex_value);
                if let Some(hi) = hi {
                    self.pos += 1;
                    let lo = self.peek_byte().and_then(hex_value);
                    if let Some(lo) = lo {
                        self.pos += 1;
                        out.push((hi * 16 + lo) as char);
                        continue;
                    }
                }
                out.push('#');
            } else {
                out.push(b as char);
            }
        }
        out
    }

    fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        self.pos += 1; // opening paren
        let mut out = Vec::new();
        let mut depth = 1usize;
        while let Some(b) = self.peek_byte() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let esc = match self.peek_byte() {
                        Some(e) => e,
                        None => break,
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'\r' => {
                            // line continuation, swallow optional LF
                            if self.peek_byte() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut v = (esc - b'0') as u16;
                            for _ in 0..2 {
                                match self.peek_byte() {
                                    Some(d @ b'0'..=b'7') => {
                                        v = v * 8 + (d - b'0') as u16;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((v & 0xff) as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }
        Err(Error::Parse("unterminated literal string".into()))
    }

    fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        self.pos += 1; // '<'
        let mut out = Vec::new();
        let mut hi: Option<u8> = None;
        while let Some(b) = self.peek_byte() {
            self.pos += 1;
            if b == b'>' {
                // odd digit count: final digit followed by implicit 0
                if let Some(h) = hi {
                    out.push(h * 16);
                }
                return Ok(out);
            }
            if is_whitespace(b) {
                continue;
            }
            let v = hex_value(b)
                .ok_or_else(|| Error::Parse(format!("bad hex digit 0x{b:02x} in string")))?;
            match hi.take() {
                Some(h) => out.push(h * 16 + v),
                None => hi = Some(v),
            }
        }
        Err(Error::Parse("unterminated hex string".into()))
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(t) = lexer.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens(b"42 -17 3.14 -.5 4."),
            vec![
                Token::Integer(42),
                Token::Integer(-17),
                Token::Real(3.14),
                Token::Real(-0.5),
                Token::Real(4.0),
            ]
        );
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(
            tokens(br"(a\(b\)c\n\101)"),
            vec![Token::String(b"a(b)c\nA".to_vec())]
        );
    }

    #[test]
    fn test_nested_parens() {
        assert_eq!(tokens(b"(a(b)c)"), vec![Token::String(b"a(b)c".to_vec())]);
    }

    #[test]
    fn test_hex_string_odd_digits() {
        assert_eq!(tokens(b"<48 65 6C 6C 6F>"), vec![Token::String(b"Hello".to_vec())]);
        assert_eq!(tokens(b"<901FA>"), vec![Token::String(vec![0x90, 0x1f, 0xa0])]);
    }

    #[test]
    fn test_name_with_hash_escape() {
        assert_eq!(
            tokens(b"/Name#20With#20Spaces"),
            vec![Token::Name("Name With Spaces".into())]
        );
    }

    #[test]
    fn test_dict_delimiters_and_comment() {
        assert_eq!(
            tokens(b"<< /Type /Page >> % trailing comment\n[1 2]"),
            vec![
                Token::DictOpen,
                Token::Name("Type".into()),
                Token::Name("Page".into()),
                Token::DictClose,
                Token::ArrayOpen,
                Token::Integer(1),
                Token::Integer(2),
                Token::ArrayClose,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens(b"1 0 obj true endobj"),
            vec![
                Token::Integer(1),
                Token::Integer(0),
                Token::Keyword("obj".into()),
                Token::Keyword("true".into()),
                Token::Keyword("endobj".into()),
            ]
        );
    }
}
