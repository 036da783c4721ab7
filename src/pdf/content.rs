//! Content-stream interpreter: a stack machine over the page
//! operator set that emits positioned text spans and image
//! placements.

use std::collections::HashMap;

use log::debug;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::ImageFormat;
use crate::pdf::filters::{decode_stream_data, is_image_filter};
use crate::pdf::fonts::Font;
use crate::pdf::graph::ObjectGraph;
use crate::pdf::lexer::{Lexer, Token};
use crate::pdf::object::{Dictionary, Object};

const MAX_FORM_DEPTH: usize = 8;

/// Row-major 2D affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self * other` in PDF convention (self applied first).
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Vertical scale factor, used to derive effective font size.
    pub fn y_scale(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }
}

/// Text-specific parameters carried in the graphics state.
#[derive(Debug, Clone)]
struct TextState {
    font: Option<String>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// Tz value / 100
    horiz_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Full graphics state snapshot pushed on `q`, popped on `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
    /// tracked for state parity only
    fill_gray: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text: TextState::default(),
            fill_gray: 0.0,
        }
    }
}

/// A positioned piece of shown text in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_name: String,
}

/// An image placed by `Do`, already pulled through the filter chain.
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One emitted item, in document order.
#[derive(Debug, Clone)]
pub enum Emitted {
    Text(TextSpan),
    Image(PlacedImage),
}

/// Interprets one page's content stream against its resources.
pub struct ContentInterpreter<'g> {
    graph: &'g mut ObjectGraph,
    resources: Dictionary,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    stack_base: usize,
    tm: Matrix,
    tlm: Matrix,
    in_text: bool,
    fonts: HashMap<String, Font>,
    pub output: Vec<Emitted>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'g> ContentInterpreter<'g> {
    pub fn new(graph: &'g mut ObjectGraph, resources: Dictionary) -> Self {
        Self {
            graph,
            resources,
            state: GraphicsState::default(),
            stack: Vec::new(),
            stack_base: 0,
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            in_text: false,
            fonts: HashMap::new(),
            output: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Run the operator stream to completion. Unbalanced `q` at the
    /// end is tolerated; bad operators are skipped with a diagnostic.
    pub fn run(&mut self, content: &[u8]) {
        self.execute(content, 0);
    }

    fn execute(&mut self, content: &[u8], depth: usize) {
        // saves older than this belong to the calling stream (form
        // XObjects share the stack) and must survive this stream
        let base = self.stack.len();
        let outer_base = std::mem::replace(&mut self.stack_base, base);
        let mut lexer = Lexer::new(content);
        let mut operands: Vec<Object> = Vec::new();
        loop {
            let token = match lexer.next_token() {
                Ok(Some(t)) => t,
                Ok(None) => break,
                Err(e) => {
                    self.warn(format!("tokenizer error in content stream: {e}"));
                    let pos = lexer.pos();
                    lexer.seek(pos + 1);
                    operands.clear();
                    continue;
                }
            };
            match token {
                Token::Integer(n) => operands.push(Object::Integer(n)),
                Token::Real(r) => operands.push(Object::Real(r)),
                Token::String(s) => operands.push(Object::String(s)),
                Token::Name(n) => operands.push(Object::Name(n)),
                Token::ArrayOpen => match collect_array(&mut lexer) {
                    Ok(a) => operands.push(Object::Array(a)),
                    Err(e) => {
                        self.warn(format!("bad array in content stream: {e}"));
                        operands.clear();
                    }
                },
                Token::DictOpen => match collect_dict(&mut lexer) {
                    Ok(d) => operands.push(Object::Dictionary(d)),
                    Err(e) => {
                        self.warn(format!("bad dictionary in content stream: {e}"));
                        operands.clear();
                    }
                },
                Token::ArrayClose | Token::DictClose => operands.clear(),
                Token::Keyword(op) => {
                    if op == "BI" {
                        // inline image: skip to EI
                        skip_inline_image(&mut lexer);
                        operands.clear();
                        continue;
                    }
                    self.apply(&op, &operands, depth);
                    operands.clear();
                }
            }
        }
        // implicit restore at stream boundary for unbalanced q
        while self.stack.len() > base {
            if let Some(saved) = self.stack.pop() {
                self.state = saved;
            }
        }
        self.stack_base = outer_base;
    }

    fn apply(&mut self, op: &str, operands: &[Object], depth: usize) {
        match op {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                // restore on an empty stack is ignored; a nested
                // stream never pops its caller's saves
                if self.stack.len() > self.stack_base {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
            }
            "cm" => {
                let Some(m) = matrix_operands(operands) else {
                    return self.arity(op, operands);
                };
                self.state.ctm = m.then(&self.state.ctm);
            }
            "g" | "G" => {
                if let Some(v) = nth_f32(operands, 0) {
                    self.state.fill_gray = v;
                }
            }
            "BT" => {
                self.in_text = true;
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                let (Some(Object::Name(name)), Some(size)) =
                    (operands.first(), nth_f32(operands, 1))
                else {
                    return self.arity(op, operands);
                };
                self.state.text.font = Some(name.clone());
                self.state.text.size = size;
            }
            "Td" => {
                let (Some(tx), Some(ty)) = (nth_f32(operands, 0), nth_f32(operands, 1)) else {
                    return self.arity(op, operands);
                };
                self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
                self.tm = self.tlm;
            }
            "TD" => {
                let (Some(tx), Some(ty)) = (nth_f32(operands, 0), nth_f32(operands, 1)) else {
                    return self.arity(op, operands);
                };
                self.state.text.leading = -ty;
                self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
                self.tm = self.tlm;
            }
            "Tm" => {
                let Some(m) = matrix_operands(operands) else {
                    return self.arity(op, operands);
                };
                self.tm = m;
                self.tlm = m;
            }
            "T*" => self.next_line(),
            "TL" => {
                let Some(l) = nth_f32(operands, 0) else {
                    return self.arity(op, operands);
                };
                self.state.text.leading = l;
            }
            "Tc" => {
                let Some(v) = nth_f32(operands, 0) else {
                    return self.arity(op, operands);
                };
                self.state.text.char_spacing = v;
            }
            "Tw" => {
                let Some(v) = nth_f32(operands, 0) else {
                    return self.arity(op, operands);
                };
                self.state.text.word_spacing = v;
            }
            "Tz" => {
                let Some(v) = nth_f32(operands, 0) else {
                    return self.arity(op, operands);
                };
                self.state.text.horiz_scale = v / 100.0;
            }
            "Ts" => {
                let Some(v) = nth_f32(operands, 0) else {
                    return self.arity(op, operands);
                };
                self.state.text.rise = v;
            }
            "Tj" => {
                let Some(Object::String(s)) = operands.first() else {
                    return self.arity(op, operands);
                };
                let text = self.decode_shown(&s.clone());
                self.emit_text(text);
            }
            "'" => {
                let Some(Object::String(s)) = operands.first() else {
                    return self.arity(op, operands);
                };
                self.next_line();
                let text = self.decode_shown(&s.clone());
                self.emit_text(text);
            }
            "\"" => {
                let (Some(aw), Some(ac), Some(Object::String(s))) =
                    (nth_f32(operands, 0), nth_f32(operands, 1), operands.get(2))
                else {
                    return self.arity(op, operands);
                };
                self.state.text.word_spacing = aw;
                self.state.text.char_spacing = ac;
                self.next_line();
                let text = self.decode_shown(&s.clone());
                self.emit_text(text);
            }
            "TJ" => {
                let Some(Object::Array(items)) = operands.first() else {
                    return self.arity(op, operands);
                };
                let mut text = String::new();
                for item in items.clone() {
                    match item {
                        Object::String(s) => text.push_str(&self.decode_shown(&s)),
                        Object::Integer(_) | Object::Real(_) => {
                            // a large negative kern is an inter-word gap
                            if item.as_f32().unwrap_or(0.0) < -100.0 && !text.ends_with(' ') {
                                text.push(' ');
                            }
                        }
                        _ => {}
                    }
                }
                self.emit_text(text);
            }
            "Do" => {
                let Some(Object::Name(name)) = operands.first() else {
                    return self.arity(op, operands);
                };
                self.invoke_xobject(&name.clone(), depth);
            }
            // path construction / painting / clipping: no text effect
            "m" | "l" | "c" | "v" | "y" | "h" | "re" | "S" | "s" | "f" | "F" | "f*" | "B"
            | "B*" | "b" | "b*" | "n" | "W" | "W*" | "w" | "J" | "j" | "M" | "d" | "ri" | "i"
            | "gs" | "rg" | "RG" | "k" | "K" | "cs" | "CS" | "sc" | "scn" | "SC" | "SCN"
            | "sh" | "d0" | "d1" | "BMC" | "BDC" | "EMC" | "MP" | "DP" | "BX" | "EX" => {}
            other => debug!("ignoring unknown operator '{other}'"),
        }
    }

    fn next_line(&mut self) {
        self.tlm = Matrix::translate(0.0, -self.state.text.leading).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn decode_shown(&mut self, bytes: &[u8]) -> String {
        let font = self.current_font();
        match font {
            Some(f) => f.decode(bytes),
            None => crate::pdf::fonts::decode_fallback(bytes),
        }
    }

    /// Look up (and cache) the active font from page resources.
    fn current_font(&mut self) -> Option<&Font> {
        let name = self.state.text.font.clone()?;
        if !self.fonts.contains_key(&name) {
            let font = self
                .resources
                .get("Font")
                .cloned()
                .map(|f| self.graph.resolve_or_null(&f))
                .and_then(|fonts| {
                    let dict = fonts.as_dict()?.get(&name).cloned()?;
                    match self.graph.resolve_or_null(&dict) {
                        Object::Dictionary(d) => Some(Font::from_dict(self.graph, &d)),
                        _ => None,
                    }
                })
                .unwrap_or_default();
            self.fonts.insert(name.clone(), font);
        }
        self.fonts.get(&name)
    }

    fn emit_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let trm = self.tm.then(&self.state.ctm);
        let (x, y) = (trm.e, trm.f + self.state.text.rise);
        let size = self.state.text.size * trm.y_scale();
        let size = if size > 0.0 { size } else { self.state.text.size.abs() };
        // no glyph metrics: advance approximated from character count
        let width = text.chars().count() as f32
            * size
            * 0.5
            * self.state.text.horiz_scale;
        let font_name = self
            .state
            .text
            .font
            .as_ref()
            .and_then(|n| self.fonts.get(n))
            .map(|f| f.name.clone())
            .unwrap_or_default();
        self.output.push(Emitted::Text(TextSpan {
            text,
            x,
            y,
            width,
            height: size,
            font_size: size,
            font_name,
        }));
    }

    fn invoke_xobject(&mut self, name: &str, depth: usize) {
        let Some(xobjects) = self.resources.get("XObject").cloned() else {
            return;
        };
        let Object::Dictionary(xobjects) = self.graph.resolve_or_null(&xobjects) else {
            return;
        };
        let Some(entry) = xobjects.get(name).cloned() else {
            self.warn(format!("XObject /{name} not in resources"));
            return;
        };
        let Object::Stream(stream) = self.graph.resolve_or_null(&entry) else {
            return;
        };
        match stream.dict.get_name("Subtype") {
            Some("Image") => {
                let filters = stream.filters();
                let last = filters.last().map(String::as_str).unwrap_or("");
                let format = match last {
                    "DCTDecode" | "DCT" => ImageFormat::Jpeg,
                    "JPXDecode" => ImageFormat::Jp2,
                    _ => ImageFormat::Raw,
                };
                let data = if is_image_filter(last) || filters.is_empty() {
                    match decode_stream_data(&stream) {
                        Ok(d) => d,
                        Err(_) => stream.data.clone(),
                    }
                } else {
                    match self.graph.decode_stream(&stream) {
                        Ok(d) => d,
                        Err(e) => {
                            self.diagnostics.push(Diagnostic::new(
                                DiagnosticKind::UnsupportedFilter,
                                format!("image /{name} skipped: {e}"),
                            ));
                            return;
                        }
                    }
                };
                // unit square maps to the image's placed rectangle
                let m = self.state.ctm;
                let (x0, y0) = m.apply(0.0, 0.0);
                let (x1, y1) = m.apply(1.0, 1.0);
                self.output.push(Emitted::Image(PlacedImage {
                    data,
                    format,
                    x: x0.min(x1),
                    y: y0.min(y1),
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                }));
            }
            Some("Form") => {
                if depth >= MAX_FORM_DEPTH {
                    self.warn(format!("form /{name} nested too deeply, skipped"));
                    return;
                }
                let Ok(content) = self.graph.decode_stream(&stream) else {
                    return;
                };
                // form draws inside its own saved state and matrix
                self.stack.push(self.state.clone());
                if let Some(Object::Array(a)) = stream.dict.get("Matrix") {
                    let vals: Vec<f32> = a.iter().filter_map(Object::as_f32).collect();
                    if vals.len() == 6 {
                        let m = Matrix::new(vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]);
                        self.state.ctm = m.then(&self.state.ctm);
                    }
                }
                let saved_resources = self.resources.clone();
                if let Some(r) = stream.dict.get("Resources") {
                    if let Object::Dictionary(d) = self.graph.resolve_or_null(r) {
                        self.resources = d;
                        self.fonts.clear();
                    }
                }
                self.execute(&content, depth + 1);
                self.resources = saved_resources;
                self.fonts.clear();
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            _ => {}
        }
    }

    fn arity(&mut self, op: &str, operands: &[Object]) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::MalformedContentStream,
            format!("operator '{op}' with {} operand(s) skipped", operands.len()),
        ));
    }

    fn warn(&mut self, message: String) {
        self.diagnostics
            .push(Diagnostic::new(DiagnosticKind::MalformedContentStream, message));
    }
}

fn nth_f32(operands: &[Object], n: usize) -> Option<f32> {
    operands.get(n).and_then(Object::as_f32)
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    Some(Matrix::new(
        nth_f32(operands, 0)?,
        nth_f32(operands, 1)?,
        nth_f32(operands, 2)?,
        nth_f32(operands, 3)?,
        nth_f32(operands, 4)?,
        nth_f32(operands, 5)?,
    ))
}

fn collect_array(lexer: &mut Lexer<'_>) -> crate::error::Result<Vec<Object>> {
    let mut items = Vec::new();
    loop {
        match lexer.next_token()? {
            Some(Token::ArrayClose) => return Ok(items),
            Some(Token::Integer(n)) => items.push(Object::Integer(n)),
            Some(Token::Real(r)) => items.push(Object::Real(r)),
            Some(Token::String(s)) => items.push(Object::String(s)),
            Some(Token::Name(n)) => items.push(Object::Name(n)),
            Some(Token::ArrayOpen) => items.push(Object::Array(collect_array(lexer)?)),
            Some(_) => {}
            None => {
                return Err(crate::error::Error::MalformedContentStream(
                    "unterminated array".into(),
                ))
            }
        }
    }
}

fn collect_dict(lexer: &mut Lexer<'_>) -> crate::error::Result<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        match lexer.next_token()? {
            Some(Token::DictClose) => return Ok(dict),
            Some(Token::Name(key)) => {
                let value = match lexer.next_token()? {
                    Some(Token::Integer(n)) => Object::Integer(n),
                    Some(Token::Real(r)) => Object::Real(r),
                    Some(Token::String(s)) => Object::String(s),
                    Some(Token::Name(n)) => Object::Name(n),
                    Some(Token::ArrayOpen) => Object::Array(collect_array(lexer)?),
                    Some(Token::DictOpen) => Object::Dictionary(collect_dict(lexer)?),
                    _ => Object::Null,
                };
                dict.set(key, value);
            }
            Some(_) => {}
            None => {
                return Err(crate::error::Error::MalformedContentStream(
                    "unterminated dictionary".into(),
                ))
            }
        }
    }
}

/// Skip an inline image body: scan for `EI` at a token boundary.
fn skip_inline_image(lexer: &mut Lexer<'_>) {
    // consume the parameter dict up to ID
    while let Ok(Some(token)) = lexer.next_token() {
        if matches!(token, Token::Keyword(ref k) if k == "ID") {
            break;
        }
    }
    let data = lexer.data();
    let mut pos = lexer.pos();
    while pos + 1 < data.len() {
        if data[pos] == b'E'
            && data[pos + 1] == b'I'
            && pos > 0
            && data[pos - 1].is_ascii_whitespace()
            && data
                .get(pos + 2)
                .map(|&b| b.is_ascii_whitespace())
                .unwrap_or(true)
        {
            lexer.seek(pos + 2);
            return;
        }
        pos += 1;
    }
    lexer.seek(data.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_stream(content: &[u8]) -> (Vec<Emitted>, Vec<Diagnostic>) {
        let pdf = test_doc();
        let mut graph = ObjectGraph::open(pdf).unwrap();
        let mut interp = ContentInterpreter::new(&mut graph, Dictionary::new());
        interp.run(content);
        (interp.output, interp.diagnostics)
    }

    fn test_doc() -> Vec<u8> {
        let mut body = b"%PDF-1.4\n".to_vec();
        let o1 = body.len();
        body.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref_at = body.len();
        body.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n");
        body.extend_from_slice(format!("{o1:010} 00000 n \n").as_bytes());
        body.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n");
        body.extend_from_slice(xref_at.to_string().as_bytes());
        body.extend_from_slice(b"\n%%EOF\n");
        body
    }

    fn texts(output: &[Emitted]) -> Vec<&TextSpan> {
        output
            .iter()
            .filter_map(|e| match e {
                Emitted::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_text_position() {
        let (out, diags) = run_stream(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET");
        let spans = texts(&out);
        assert!(diags.is_empty());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello");
        assert_eq!(spans[0].x, 100.0);
        assert_eq!(spans[0].y, 700.0);
        assert_eq!(spans[0].font_size, 12.0);
    }

    #[test]
    fn test_tj_kerning_inserts_space() {
        let (out, _) = run_stream(b"BT /F1 10 Tf [(Hello) -250 (world)] TJ ET");
        let spans = texts(&out);
        assert_eq!(spans[0].text, "Hello world");
    }

    #[test]
    fn test_small_kerning_is_not_a_space() {
        let (out, _) = run_stream(b"BT /F1 10 Tf [(ker) -40 (ning)] TJ ET");
        assert_eq!(texts(&out)[0].text, "kerning");
    }

    fn doc_with_form(form_content: &[u8]) -> Vec<u8> {
        let mut body = b"%PDF-1.4\n".to_vec();
        let o1 = body.len();
        body.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let o2 = body.len();
        body.extend_from_slice(
            format!(
                "2 0 obj\n<< /Subtype /Form /Length {} >>\nstream\n",
                form_content.len()
            )
            .as_bytes(),
        );
        body.extend_from_slice(form_content);
        body.extend_from_slice(b"\nendstream\nendobj\n");
        let xref_at = body.len();
        body.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        body.extend_from_slice(format!("{o1:010} 00000 n \n{o2:010} 00000 n \n").as_bytes());
        body.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n");
        body.extend_from_slice(xref_at.to_string().as_bytes());
        body.extend_from_slice(b"\n%%EOF\n");
        body
    }

    fn form_resources() -> Dictionary {
        let mut xobjects = Dictionary::new();
        xobjects.set("Fm1", Object::Reference((2, 0)));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));
        resources
    }

    #[test]
    fn test_form_invocation_keeps_caller_state() {
        // text after the Do must still see the scaled CTM of the
        // enclosing q scope
        let pdf = doc_with_form(b"");
        let mut graph = ObjectGraph::open(pdf).unwrap();
        let mut interp = ContentInterpreter::new(&mut graph, form_resources());
        interp.run(b"q 2 0 0 2 0 0 cm /Fm1 Do BT /F1 12 Tf 10 10 Td (after-form) Tj ET Q");
        let out = interp.output;
        let spans = texts(&out);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].x, 20.0);
        assert_eq!(spans[0].y, 20.0);
        assert_eq!(spans[0].font_size, 24.0);
    }

    #[test]
    fn test_form_cannot_pop_caller_saves() {
        // stray Q operators inside the form hit its own stream base,
        // not the page's save
        let pdf = doc_with_form(b"Q Q Q");
        let mut graph = ObjectGraph::open(pdf).unwrap();
        let mut interp = ContentInterpreter::new(&mut graph, form_resources());
        interp.run(b"q 3 0 0 3 0 0 cm /Fm1 Do BT /F1 10 Tf 1 1 Td (x) Tj ET Q");
        let out = interp.output;
        let spans = texts(&out);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].font_size, 30.0);
        assert_eq!(spans[0].x, 3.0);
    }

    #[test]
    fn test_unbalanced_q_does_not_crash() {
        let (out, _) = run_stream(b"q 2 0 0 2 0 0 cm q BT /F1 10 Tf (x) Tj ET");
        assert_eq!(texts(&out).len(), 1);
    }

    #[test]
    fn test_q_restores_ctm() {
        let content = b"q 2 0 0 2 50 50 cm Q BT /F1 10 Tf 10 10 Td (x) Tj ET";
        let (out, _) = run_stream(content);
        let span = texts(&out)[0];
        // the scaled matrix was restored before BT
        assert_eq!((span.x, span.y), (10.0, 10.0));
    }

    #[test]
    fn test_extra_restore_is_ignored() {
        let (out, diags) = run_stream(b"Q Q BT /F1 10 Tf (ok) Tj ET");
        assert_eq!(texts(&out).len(), 1);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_arity_error_skips_operator_and_continues() {
        let (out, diags) = run_stream(b"BT /F1 10 Tf 5 Td (after) Tj ET");
        // Td with one operand is skipped, text still shows
        assert_eq!(texts(&out)[0].text, "after");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::MalformedContentStream);
    }

    #[test]
    fn test_td_and_tstar_advance_lines() {
        let content = b"BT /F1 10 Tf 14 TL 0 100 Td (line1) Tj T* (line2) Tj ET";
        let (out, _) = run_stream(content);
        let spans = texts(&out);
        assert_eq!(spans[0].y, 100.0);
        assert_eq!(spans[1].y, 86.0);
    }

    #[test]
    fn test_cm_scales_font_size() {
        let (out, _) = run_stream(b"q 2 0 0 2 0 0 cm BT /F1 10 Tf (big) Tj ET Q");
        assert_eq!(texts(&out)[0].font_size, 20.0);
    }

    #[test]
    fn test_inline_image_skipped() {
        let content = b"BT /F1 10 Tf (a) Tj ET BI /W 2 /H 2 ID \x00\x01\x02\x03 EI BT (b) Tj ET";
        let (out, _) = run_stream(content);
        let spans = texts(&out);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].text, "b");
    }
}
