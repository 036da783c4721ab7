//! Parser for PDF objects built on the tokenizer.

use crate::error::{Error, Result};
use crate::pdf::lexer::{Lexer, Token};
use crate::pdf::object::{Dictionary, Object, ObjectId, Stream};

/// Parses objects out of a byte buffer. Thin state machine over
/// [`Lexer`]; reference syntax (`n g R`) needs two tokens of
/// lookahead, handled by position save/restore.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
        }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            lexer: Lexer::at(data, pos),
        }
    }

    pub fn pos(&self) -> usize {
        self.lexer.pos()
    }

    pub fn seek(&mut self, pos: usize) {
        self.lexer.seek(pos);
    }

    /// Parse one object, following `n g R` reference syntax and
    /// `<<dict>> stream` payloads.
    pub fn parse_object(&mut self) -> Result<Object> {
        let token = self
            .lexer
            .next_token()?
            .ok_or_else(|| Error::Parse("unexpected end of input".into()))?;
        self.object_from(token)
    }

    fn object_from(&mut self, token: Token) -> Result<Object> {
        match token {
            Token::Integer(n) => self.maybe_reference(n),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::String(s) => Ok(Object::String(s)),
            Token::Name(n) => Ok(Object::Name(n)),
            Token::ArrayOpen => self.parse_array(),
            Token::DictOpen => self.parse_dict_or_stream(),
            Token::Keyword(ref k) if k == "true" => Ok(Object::Boolean(true)),
            Token::Keyword(ref k) if k == "false" => Ok(Object::Boolean(false)),
            Token::Keyword(ref k) if k == "null" => Ok(Object::Null),
            other => Err(Error::Parse(format!("unexpected token {other:?}"))),
        }
    }

    /// An integer may begin a reference: `12 0 R`.
    fn maybe_reference(&mut self, first: i64) -> Result<Object> {
        let mark = self.lexer.pos();
        if first >= 0 && first <= u32::MAX as i64 {
            if let Ok(Some(Token::Integer(gen))) = self.lexer.next_token() {
                if (0..=u16::MAX as i64).contains(&gen) && self.lexer.eat_keyword(b"R") {
                    return Ok(Object::Reference((first as u32, gen as u16)));
                }
            }
        }
        self.lexer.seek(mark);
        Ok(Object::Integer(first))
    }

    fn parse_array(&mut self) -> Result<Object> {
        let mut items = Vec::new();
        loop {
            let token = self
                .lexer
                .next_token()?
                .ok_or_else(|| Error::Parse("unterminated array".into()))?;
            if token == Token::ArrayClose {
                return Ok(Object::Array(items));
            }
            items.push(self.object_from(token)?);
        }
    }

    fn parse_dict_or_stream(&mut self) -> Result<Object> {
        let dict = self.parse_dict_body()?;
        let mark = self.lexer.pos();
        if self.lexer.eat_keyword(b"stream") {
            self.lexer.skip_eol();
            let data = self.read_stream_data(&dict)?;
            return Ok(Object::Stream(Stream::new(dict, data)));
        }
        self.lexer.seek(mark);
        Ok(Object::Dictionary(dict))
    }

    fn parse_dict_body(&mut self) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let token = self
                .lexer
                .next_token()?
                .ok_or_else(|| Error::Parse("unterminated dictionary".into()))?;
            match token {
                Token::DictClose => return Ok(dict),
                Token::Name(key) => {
                    let value = self.parse_object()?;
                    dict.set(key, value);
                }
                other => {
                    return Err(Error::Parse(format!(
                        "expected name key in dictionary, got {other:?}"
                    )))
                }
            }
        }
    }

    /// Use a direct `/Length` when it lines up with an `endstream`
    /// marker; otherwise scan forward for the marker. Indirect
    /// lengths are resolved by the caller after the fact.
    fn read_stream_data(&mut self, dict: &Dictionary) -> Result<Vec<u8>> {
        let start = self.lexer.pos();
        let data = self.lexer.data();

        if let Some(len) = dict.get_i64("Length") {
            let len = len.max(0) as usize;
            let end = start.saturating_add(len);
            if end <= data.len() {
                let tail = &data[end..];
                let trimmed = skip_eol_bytes(tail);
                if trimmed.starts_with(b"endstream") {
                    self.lexer.seek(end);
                    self.lexer.eat_keyword(b"endstream");
                    return Ok(data[start..end].to_vec());
                }
            }
        }

        // Declared length missing, indirect, or wrong: trust the marker.
        let marker = find_subslice(&data[start..], b"endstream")
            .ok_or_else(|| Error::Parse("stream without endstream marker".into()))?;
        let mut end = start + marker;
        // strip the EOL that precedes endstream
        if end > start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }
        self.lexer.seek(start + marker);
        self.lexer.eat_keyword(b"endstream");
        Ok(data[start..end].to_vec())
    }

    /// Parse `n g obj <object> endobj` at the current position.
    pub fn parse_indirect_object(&mut self) -> Result<(ObjectId, Object)> {
        let num = match self.lexer.next_token()? {
            Some(Token::Integer(n)) if n >= 0 => n as u32,
            other => return Err(Error::Parse(format!("expected object number, got {other:?}"))),
        };
        let gen = match self.lexer.next_token()? {
            Some(Token::Integer(g)) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            other => {
                return Err(Error::Parse(format!(
                    "expected generation number, got {other:?}"
                )))
            }
        };
        if !self.lexer.eat_keyword(b"obj") {
            return Err(Error::Parse(format!(
                "missing 'obj' keyword for object {num} {gen}"
            )));
        }
        let object = self.parse_object()?;
        // endobj is advisory; tolerate its absence
        self.lexer.eat_keyword(b"endobj");
        Ok(((num, gen), object))
    }
}

fn skip_eol_bytes(data: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < data.len() && matches!(data[i], b'\r' | b'\n' | b' ') {
        i += 1;
    }
    &data[i..]
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Object {
        Parser::new(input).parse_object().unwrap()
    }

    #[test]
    fn test_reference_vs_integers() {
        assert_eq!(parse(b"12 0 R"), Object::Reference((12, 0)));
        // two plain integers in an array, not a reference
        assert_eq!(
            parse(b"[12 0 5]"),
            Object::Array(vec![
                Object::Integer(12),
                Object::Integer(0),
                Object::Integer(5),
            ])
        );
    }

    #[test]
    fn test_nested_dict() {
        let obj = parse(b"<< /A << /B 1 >> /C [true null] >>");
        let dict = obj.as_dict().unwrap();
        let inner = dict.get("A").unwrap().as_dict().unwrap();
        assert_eq!(inner.get_i64("B"), Some(1));
        assert_eq!(
            dict.get("C").unwrap().as_array().unwrap(),
            &[Object::Boolean(true), Object::Null]
        );
    }

    #[test]
    fn test_stream_with_direct_length() {
        let src = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let obj = parse(src);
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"hello");
    }

    #[test]
    fn test_stream_with_wrong_length_scans_for_marker() {
        let src = b"<< /Length 999 >>\nstream\nhello\nendstream";
        let obj = parse(src);
        assert_eq!(obj.as_stream().unwrap().data, b"hello");
    }

    #[test]
    fn test_stream_with_indirect_length_scans_for_marker() {
        let src = b"<< /Length 9 0 R >>\nstream\nhello\nendstream";
        let obj = parse(src);
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"hello");
        assert_eq!(
            stream.dict.get("Length").unwrap().as_reference(),
            Some((9, 0))
        );
    }

    #[test]
    fn test_indirect_object() {
        let src = b"7 0 obj\n<< /Type /Catalog >>\nendobj";
        let (id, obj) = Parser::new(src).parse_indirect_object().unwrap();
        assert_eq!(id, (7, 0));
        assert_eq!(obj.as_dict().unwrap().type_name(), Some("Catalog"));
    }
}
