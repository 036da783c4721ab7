//! Cross-reference loading: classic tables, xref streams, and the
//! incremental-update `Prev` chain.

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::pdf::filters::decode_stream_data;
use crate::pdf::lexer::Lexer;
use crate::pdf::object::{Dictionary, Object};
use crate::pdf::parser::Parser;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Freed or never-used slot; resolves to Null.
    Free,
    /// Plain indirect object at a byte offset.
    InFile { offset: usize, gen: u16 },
    /// Compressed object inside an object stream.
    InStream { stream_id: u32, index: usize },
}

/// The merged cross-reference table plus the newest trailer.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    pub entries: BTreeMap<u32, XrefEntry>,
    pub trailer: Dictionary,
}

impl XrefTable {
    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }
}

/// Follow `startxref` and the `Prev` chain. Sections are visited
/// newest first; an id already seen keeps its newest entry.
pub fn load_xref(data: &[u8]) -> Result<XrefTable> {
    let start = find_startxref(data)?;
    let mut table = XrefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next {
        if offset >= data.len() || !visited.insert(offset) {
            break;
        }
        let trailer = match read_section(data, offset, &mut table) {
            Ok(t) => t,
            Err(e) => {
                warn!("xref section at offset {offset} unreadable: {e}");
                break;
            }
        };
        // hybrid-reference files carry a parallel xref stream
        if let Some(stm) = trailer.get_i64("XRefStm") {
            let stm = stm.max(0) as usize;
            if visited.insert(stm) {
                if let Err(e) = read_section(data, stm, &mut table) {
                    warn!("hybrid xref stream at offset {stm} unreadable: {e}");
                }
            }
        }
        next = trailer.get_i64("Prev").map(|p| p.max(0) as usize);
        merge_trailer(&mut table.trailer, trailer);
    }

    if table.entries.is_empty() {
        return Err(Error::Corrupted("no usable cross-reference section".into()));
    }
    Ok(table)
}

/// Locate the byte offset following the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(2048);
    let tail = &data[window_start..];
    let pos = rfind_subslice(tail, b"startxref")
        .ok_or_else(|| Error::Corrupted("startxref not found".into()))?;
    let mut lexer = Lexer::at(data, window_start + pos + b"startxref".len());
    lexer.skip_whitespace();
    let mut end = lexer.pos();
    while end < data.len() && data[end].is_ascii_digit() {
        end += 1;
    }
    let digits = std::str::from_utf8(&data[lexer.pos()..end]).unwrap_or("");
    digits
        .parse()
        .map_err(|_| Error::Corrupted("startxref offset is not a number".into()))
}

/// Read one xref section (classic table or xref stream) at `offset`,
/// adding entries not already present, and return its trailer dict.
fn read_section(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dictionary> {
    let mut lexer = Lexer::at(data, offset);
    if lexer.eat_keyword(b"xref") {
        read_classic_table(data, lexer.pos(), table)
    } else {
        read_xref_stream(data, offset, table)
    }
}

fn read_classic_table(
    data: &[u8],
    mut pos: usize,
    table: &mut XrefTable,
) -> Result<Dictionary> {
    loop {
        let mut lexer = Lexer::at(data, pos);
        if lexer.eat_keyword(b"trailer") {
            let mut parser = Parser::at(data, lexer.pos());
            let obj = parser.parse_object()?;
            return match obj {
                Object::Dictionary(d) => Ok(d),
                other => Err(Error::Corrupted(format!("trailer is not a dictionary: {other}"))),
            };
        }
        // subsection header: first-id count
        let mut parser = Parser::at(data, pos);
        let first = match parser.parse_object()? {
            Object::Integer(n) if n >= 0 => n as u32,
            other => {
                return Err(Error::Corrupted(format!(
                    "bad xref subsection header: {other}"
                )))
            }
        };
        let count = match parser.parse_object()? {
            Object::Integer(n) if n >= 0 => n as u32,
            other => {
                return Err(Error::Corrupted(format!(
                    "bad xref subsection count: {other}"
                )))
            }
        };
        let mut lexer = Lexer::at(data, parser.pos());
        lexer.skip_whitespace();
        pos = lexer.pos();

        for i in 0..count {
            // 20-byte records: 10-digit offset, 5-digit gen, type letter
            let record = data
                .get(pos..pos + 20)
                .or_else(|| data.get(pos..pos + 19))
                .ok_or_else(|| Error::Corrupted("truncated xref record".into()))?;
            let id = first + i;
            let offset_digits = std::str::from_utf8(&record[0..10]).unwrap_or("");
            let gen_digits = std::str::from_utf8(&record[11..16]).unwrap_or("");
            let kind = record.get(17).copied().unwrap_or(b'n');
            let entry = if kind == b'f' {
                XrefEntry::Free
            } else {
                let off: usize = offset_digits
                    .trim()
                    .parse()
                    .map_err(|_| Error::Corrupted(format!("bad offset in xref record {id}")))?;
                let gen: u16 = gen_digits.trim().parse().unwrap_or(0);
                XrefEntry::InFile { offset: off, gen }
            };
            table.entries.entry(id).or_insert(entry);
            pos += if record.len() == 20 { 20 } else { 19 };
        }
    }
}

fn read_xref_stream(data: &[u8], offset: usize, table: &mut XrefTable) -> Result<Dictionary> {
    let mut parser = Parser::at(data, offset);
    let (_, obj) = parser.parse_indirect_object()?;
    let stream = obj
        .as_stream()
        .ok_or_else(|| Error::Corrupted("xref offset does not point at a stream".into()))?;
    let dict = stream.dict.clone();
    if dict.type_name() != Some("XRef") {
        return Err(Error::Corrupted("stream at xref offset is not /Type /XRef".into()));
    }
    let decoded = decode_stream_data(stream)?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|a| a.iter().filter_map(|o| o.as_i64().map(|n| n.max(0) as usize)).collect())
        .ok_or_else(|| Error::Corrupted("xref stream missing /W".into()))?;
    if widths.len() < 3 {
        return Err(Error::Corrupted("xref stream /W has fewer than 3 fields".into()));
    }
    let row = widths.iter().sum::<usize>();
    if row == 0 {
        return Err(Error::Corrupted("xref stream /W is all zero".into()));
    }

    let size = dict.get_i64("Size").unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(a) => a
            .chunks(2)
            .filter_map(|c| match c {
                [Object::Integer(f), Object::Integer(n)] if *f >= 0 && *n >= 0 => {
                    Some((*f as u32, *n as u32))
                }
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let mut cursor = 0usize;
    for (first, count) in index {
        for i in 0..count {
            let Some(record) = decoded.get(cursor..cursor + row) else {
                debug!("xref stream data shorter than /Index declares");
                break;
            };
            cursor += row;
            let mut fields = [1u64, 0, 0]; // type defaults to 1 when W[0]==0
            let mut at = 0;
            for (fi, &w) in widths.iter().take(3).enumerate() {
                if w > 0 {
                    fields[fi] = record[at..at + w].iter().fold(0u64, |v, &b| (v << 8) | b as u64);
                    at += w;
                }
            }
            let id = first + i;
            let entry = match fields[0] {
                0 => XrefEntry::Free,
                1 => XrefEntry::InFile {
                    offset: fields[1] as usize,
                    gen: fields[2] as u16,
                },
                2 => XrefEntry::InStream {
                    stream_id: fields[1] as u32,
                    index: fields[2] as usize,
                },
                other => {
                    debug!("xref stream entry {id} has unknown type {other}, treating as free");
                    XrefEntry::Free
                }
            };
            table.entries.entry(id).or_insert(entry);
        }
    }
    Ok(dict)
}

/// Keep the newest trailer's values; fill gaps from older trailers so
/// `Root`/`Info` survive sloppy incremental updates.
fn merge_trailer(newest: &mut Dictionary, older: Dictionary) {
    for (key, value) in older.iter() {
        if !newest.contains_key(key) {
            newest.set(key.clone(), value.clone());
        }
    }
}

/// Linear scan for `<id> <gen> obj` headers. The recovery path when
/// offsets are wrong or the trailer is unusable; later occurrences of
/// the same id win, matching incremental-update semantics.
pub fn scan_recover(data: &[u8]) -> BTreeMap<u32, XrefEntry> {
    let re = regex::bytes::Regex::new(r"(?m)(\d{1,10})[ \t]+(\d{1,5})[ \t]+obj\b")
        .unwrap_or_else(|_| unreachable!("static pattern"));
    let mut found = BTreeMap::new();
    for caps in re.captures_iter(data) {
        let (Some(whole), Some(num), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let id: u32 = match std::str::from_utf8(num.as_bytes()).ok().and_then(|s| s.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let gen: u16 = std::str::from_utf8(gen.as_bytes())
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        found.insert(
            id,
            XrefEntry::InFile {
                offset: whole.start(),
                gen,
            },
        );
    }
    debug!("scan recovery located {} object headers", found.len());
    found
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Locate the trailer dictionary even when `startxref` is unusable,
/// by scanning backwards for the `trailer` keyword.
pub fn scan_trailer(data: &[u8]) -> Option<Dictionary> {
    let pos = rfind_subslice(data, b"trailer")?;
    let mut parser = Parser::at(data, pos + b"trailer".len());
    match parser.parse_object() {
        Ok(Object::Dictionary(d)) => Some(d),
        _ => None,
    }
}
