//! Object graph: the cross-reference index plus lazy, cached
//! resolution of indirect objects.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, warn};

use crate::error::{Diagnostic, DiagnosticKind, Error, Result};
use crate::pdf::filters::decode_stream_data;
use crate::pdf::object::{Dictionary, Object, ObjectId, Stream};
use crate::pdf::parser::Parser;
use crate::pdf::xref::{self, XrefEntry, XrefTable};

const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A page with its inherited attributes already applied.
#[derive(Debug, Clone)]
pub struct PageNode {
    pub dict: Dictionary,
    pub resources: Dictionary,
    /// \[llx, lly, urx, ury\] in default user space units
    pub media_box: [f32; 4],
}

/// Owns the document bytes, the offset table, and the decode cache.
/// All object access goes through [`resolve`](Self::resolve); the
/// cache is never exposed for external mutation.
pub struct ObjectGraph {
    data: Vec<u8>,
    pub version: String,
    xref: XrefTable,
    cache: HashMap<ObjectId, Object>,
    /// object numbers currently being resolved, for cycle detection
    resolving: HashSet<u32>,
    /// decoded object streams: id -> (header pairs, payload)
    objstm_cache: HashMap<u32, (Vec<(u32, usize)>, Vec<u8>)>,
    recovered: Option<BTreeMap<u32, XrefEntry>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ObjectGraph {
    /// Build the graph: header version, xref chain, trailer. Falls
    /// back to a byte-scan when the xref machinery is unusable, and
    /// fails only when that locates zero objects.
    pub fn open(data: Vec<u8>) -> Result<Self> {
        let version = parse_header_version(&data)?;
        let mut diagnostics = Vec::new();
        let mut recovered = None;

        let xref = match xref::load_xref(&data) {
            Ok(t) => t,
            Err(e) => {
                warn!("xref unusable ({e}), switching to scan recovery");
                let found = xref::scan_recover(&data);
                if found.is_empty() {
                    return Err(Error::Corrupted(format!(
                        "no cross-reference and no object headers found: {e}"
                    )));
                }
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::XrefRecovered,
                    format!("cross-reference rebuilt by scanning, {} objects found", found.len()),
                ));
                let trailer = xref::scan_trailer(&data).unwrap_or_default();
                let table = XrefTable {
                    entries: found.clone(),
                    trailer,
                };
                recovered = Some(found);
                table
            }
        };

        if xref.trailer.contains_key("Encrypt") {
            return Err(Error::Encrypted);
        }

        Ok(Self {
            data,
            version,
            xref,
            cache: HashMap::new(),
            resolving: HashSet::new(),
            objstm_cache: HashMap::new(),
            recovered,
            diagnostics,
        })
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.xref.trailer
    }

    /// Resolve an object, following one level of reference. Direct
    /// objects come back as clones.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(id) => self.resolve_ref(*id),
            other => Ok(other.clone()),
        }
    }

    /// Resolve, substituting Null for anything unresolvable and
    /// recording a diagnostic. The lenient path used during content
    /// extraction.
    pub fn resolve_or_null(&mut self, obj: &Object) -> Object {
        match self.resolve(obj) {
            Ok(o) => o,
            Err(e) => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedReference,
                    e.to_string(),
                ));
                Object::Null
            }
        }
    }

    /// Resolve an indirect object by id. Free and absent slots are
    /// Null; a cycle or an unlocatable object is `UnresolvedReference`.
    pub fn resolve_ref(&mut self, id: ObjectId) -> Result<Object> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(cached.clone());
        }
        if !self.resolving.insert(id.0) {
            debug!("reference cycle through object {}", id.0);
            return Err(Error::UnresolvedReference(id.0, id.1));
        }
        let result = self.resolve_uncached(id);
        self.resolving.remove(&id.0);
        let object = result?;
        self.cache.insert(id, object.clone());
        Ok(object)
    }

    fn resolve_uncached(&mut self, id: ObjectId) -> Result<Object> {
        let entry = match self.xref.get(id.0) {
            Some(e) => *e,
            None => match self.recovered_entry(id.0) {
                Some(e) => e,
                None => return Err(Error::UnresolvedReference(id.0, id.1)),
            },
        };
        match entry {
            XrefEntry::Free => Ok(Object::Null),
            XrefEntry::InFile { offset, .. } => self.parse_at(id, offset),
            XrefEntry::InStream { stream_id, index } => self.resolve_in_stream(id, stream_id, index),
        }
    }

    /// Parse the indirect object at `offset`; on an id mismatch or a
    /// parse failure, retry via the scan-recovery table.
    fn parse_at(&mut self, id: ObjectId, offset: usize) -> Result<Object> {
        if offset < self.data.len() {
            let mut parser = Parser::at(&self.data, offset);
            if let Ok((parsed_id, obj)) = parser.parse_indirect_object() {
                if parsed_id.0 == id.0 {
                    return self.fix_stream_length(obj);
                }
                debug!(
                    "offset {offset} holds object {} but {} was expected",
                    parsed_id.0, id.0
                );
            }
        }
        match self.recovered_entry(id.0) {
            Some(XrefEntry::InFile { offset: alt, .. }) if alt != offset => {
                self.note_recovery();
                self.parse_at_exact(id, alt)
            }
            _ => Err(Error::UnresolvedReference(id.0, id.1)),
        }
    }

    fn parse_at_exact(&mut self, id: ObjectId, offset: usize) -> Result<Object> {
        let mut parser = Parser::at(&self.data, offset);
        let (parsed_id, obj) = parser
            .parse_indirect_object()
            .map_err(|_| Error::UnresolvedReference(id.0, id.1))?;
        if parsed_id.0 != id.0 {
            return Err(Error::UnresolvedReference(id.0, id.1));
        }
        self.fix_stream_length(obj)
    }

    /// Populate the scan-recovery table on first use.
    fn recovered_entry(&mut self, num: u32) -> Option<XrefEntry> {
        if self.recovered.is_none() {
            self.recovered = Some(xref::scan_recover(&self.data));
        }
        self.recovered.as_ref().and_then(|m| m.get(&num)).copied()
    }

    fn note_recovery(&mut self) {
        let already = self
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::XrefRecovered);
        if !already {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::XrefRecovered,
                "cross-reference offsets wrong, objects located by scanning",
            ));
        }
    }

    /// A stream whose `/Length` is indirect was sized by scanning for
    /// `endstream`; trim it once the real length is known.
    fn fix_stream_length(&mut self, obj: Object) -> Result<Object> {
        let Object::Stream(mut stream) = obj else {
            return Ok(obj);
        };
        if let Some(id) = stream.dict.get("Length").and_then(Object::as_reference) {
            if let Ok(Object::Integer(len)) = self.resolve_ref(id) {
                let len = len.max(0) as usize;
                if len <= stream.data.len() {
                    stream.data.truncate(len);
                }
                stream.dict.set("Length", Object::Integer(len as i64));
            }
        }
        Ok(Object::Stream(stream))
    }

    fn resolve_in_stream(&mut self, id: ObjectId, stream_id: u32, index: usize) -> Result<Object> {
        if !self.objstm_cache.contains_key(&stream_id) {
            let loaded = self.load_object_stream(stream_id)?;
            self.objstm_cache.insert(stream_id, loaded);
        }
        let (pairs, payload) = &self.objstm_cache[&stream_id];
        let &(num, offset) = pairs
            .get(index)
            .ok_or(Error::UnresolvedReference(id.0, id.1))?;
        if num != id.0 {
            debug!("object stream {stream_id} slot {index} holds {num}, expected {}", id.0);
            return Err(Error::UnresolvedReference(id.0, id.1));
        }
        if offset >= payload.len() {
            return Err(Error::UnresolvedReference(id.0, id.1));
        }
        let mut parser = Parser::at(payload, offset);
        parser
            .parse_object()
            .map_err(|_| Error::UnresolvedReference(id.0, id.1))
    }

    fn load_object_stream(&mut self, stream_id: u32) -> Result<(Vec<(u32, usize)>, Vec<u8>)> {
        let container = self.resolve_ref((stream_id, 0))?;
        let stream = container
            .as_stream()
            .ok_or_else(|| Error::Corrupted(format!("object {stream_id} is not an object stream")))?;
        if stream.dict.type_name() != Some("ObjStm") {
            return Err(Error::Corrupted(format!(
                "object {stream_id} is not /Type /ObjStm"
            )));
        }
        let n = stream.dict.get_i64("N").unwrap_or(0).max(0) as usize;
        let first = stream.dict.get_i64("First").unwrap_or(0).max(0) as usize;
        let decoded = decode_stream_data(stream)?;

        let header = decoded.get(..first.min(decoded.len())).unwrap_or(&[]);
        let mut parser = Parser::new(header);
        let mut pairs = Vec::with_capacity(n);
        for _ in 0..n {
            let num = match parser.parse_object() {
                Ok(Object::Integer(v)) if v >= 0 => v as u32,
                _ => break,
            };
            let off = match parser.parse_object() {
                Ok(Object::Integer(v)) if v >= 0 => v as usize,
                _ => break,
            };
            pairs.push((num, first + off));
        }
        Ok((pairs, decoded))
    }

    /// Decode a stream's payload, surfacing `UnsupportedFilter` to
    /// the caller for per-stream skip decisions.
    pub fn decode_stream(&mut self, stream: &Stream) -> Result<Vec<u8>> {
        decode_stream_data(stream)
    }

    /// The document catalog (trailer `/Root`).
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer()
            .get("Root")
            .cloned()
            .ok_or_else(|| Error::Corrupted("trailer has no /Root".into()))?;
        match self.resolve(&root)? {
            Object::Dictionary(d) => Ok(d),
            other => Err(Error::Corrupted(format!("document catalog is {other}"))),
        }
    }

    /// The document information dictionary, if present and readable.
    pub fn info(&mut self) -> Option<Dictionary> {
        let info = self.trailer().get("Info").cloned()?;
        match self.resolve(&info) {
            Ok(Object::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    /// Walk the page tree in order, applying inherited `/Resources`
    /// and `/MediaBox`. Unresolvable kids are skipped with a
    /// diagnostic; a malformed tree yields the pages found so far.
    pub fn pages(&mut self) -> Result<Vec<PageNode>> {
        let catalog = self.catalog()?;
        let pages_obj = catalog
            .get("Pages")
            .cloned()
            .ok_or_else(|| Error::Corrupted("catalog has no /Pages".into()))?;
        let root = match self.resolve(&pages_obj)? {
            Object::Dictionary(d) => d,
            other => return Err(Error::Corrupted(format!("page tree root is {other}"))),
        };
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        if let Some(id) = pages_obj.as_reference() {
            visited.insert(id.0);
        }
        let inherited = Inherited::default();
        self.walk_pages(&root, inherited, &mut visited, 0, &mut out);
        if out.is_empty() {
            // scan-recovered documents may lack a usable tree; fall
            // back to every /Type /Page object in the file
            self.collect_orphan_pages(&mut out);
        }
        Ok(out)
    }

    fn walk_pages(
        &mut self,
        node: &Dictionary,
        inherited: Inherited,
        visited: &mut HashSet<u32>,
        depth: usize,
        out: &mut Vec<PageNode>,
    ) {
        if depth > MAX_PAGE_TREE_DEPTH {
            warn!("page tree deeper than {MAX_PAGE_TREE_DEPTH}, truncating walk");
            return;
        }
        let inherited = inherited.absorb(self, node);
        let kids = match node.get("Kids").map(|k| self.resolve_or_null(k)) {
            Some(Object::Array(kids)) => kids,
            _ => return,
        };
        for kid in kids {
            if let Some(id) = kid.as_reference() {
                if !visited.insert(id.0) {
                    debug!("page tree cycle through object {}", id.0);
                    continue;
                }
            }
            let dict = match self.resolve_or_null(&kid) {
                Object::Dictionary(d) => d,
                _ => continue,
            };
            match dict.type_name() {
                Some("Pages") => self.walk_pages(&dict, inherited.clone(), visited, depth + 1, out),
                _ => out.push(inherited.clone().absorb(self, &dict).into_page(dict)),
            }
        }
    }

    fn collect_orphan_pages(&mut self, out: &mut Vec<PageNode>) {
        let ids: Vec<u32> = self.xref.entries.keys().copied().collect();
        for num in ids {
            let Ok(obj) = self.resolve_ref((num, 0)) else { continue };
            let Some(dict) = obj.as_dict() else { continue };
            if dict.type_name() == Some("Page") {
                let dict = dict.clone();
                let node = Inherited::default().absorb(self, &dict).into_page(dict);
                out.push(node);
            }
        }
    }

    /// Concatenate and decode a page's `/Contents`, which may be one
    /// stream or an array of streams.
    pub fn page_content(&mut self, page: &Dictionary) -> Result<Vec<u8>> {
        let contents = match page.get("Contents") {
            Some(c) => self.resolve_or_null(c),
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        match contents {
            Object::Stream(ref s) => out = self.decode_stream(s)?,
            Object::Array(items) => {
                for item in items {
                    if let Object::Stream(ref s) = self.resolve_or_null(&item) {
                        // one undecodable element loses itself, not
                        // its siblings
                        match self.decode_stream(s) {
                            Ok(data) => out.extend_from_slice(&data),
                            Err(e) => {
                                let kind = match e {
                                    Error::UnsupportedFilter(_) => {
                                        DiagnosticKind::UnsupportedFilter
                                    }
                                    _ => DiagnosticKind::Other,
                                };
                                self.diagnostics
                                    .push(Diagnostic::new(kind, e.to_string()));
                                continue;
                            }
                        }
                        // streams split mid-token need a separator
                        out.push(b'\n');
                    }
                }
            }
            _ => {}
        }
        Ok(out)
    }
}

/// Attributes a page inherits from its ancestors when absent locally.
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Dictionary>,
    media_box: Option<[f32; 4]>,
}

impl Inherited {
    fn absorb(mut self, graph: &mut ObjectGraph, node: &Dictionary) -> Self {
        if let Some(r) = node.get("Resources") {
            if let Object::Dictionary(d) = graph.resolve_or_null(r) {
                self.resources = Some(d);
            }
        }
        if let Some(mb) = node.get("MediaBox") {
            if let Object::Array(a) = graph.resolve_or_null(mb) {
                let vals: Vec<f32> = a.iter().filter_map(Object::as_f32).collect();
                if vals.len() == 4 {
                    self.media_box = Some([vals[0], vals[1], vals[2], vals[3]]);
                }
            }
        }
        self
    }

    fn into_page(self, dict: Dictionary) -> PageNode {
        PageNode {
            dict,
            resources: self.resources.unwrap_or_default(),
            // US Letter when nothing declares a box
            media_box: self.media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]),
        }
    }
}

fn parse_header_version(data: &[u8]) -> Result<String> {
    // the header may sit after a little leading garbage
    let window = &data[..data.len().min(1024)];
    let pos = crate::pdf::parser::find_subslice(window, b"%PDF-")
        .ok_or(Error::UnknownFormat)?;
    let rest = &data[pos + 5..];
    let end = rest
        .iter()
        .position(|&b| !(b.is_ascii_digit() || b == b'.'))
        .unwrap_or(rest.len());
    let version = String::from_utf8_lossy(&rest[..end]).into_owned();
    if version.is_empty() {
        return Err(Error::Corrupted("header has no version number".into()));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal well-formed document built with exact offsets.
    fn tiny_pdf() -> Vec<u8> {
        let mut body = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        let objects: Vec<Vec<u8>> = vec![
            b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_vec(),
            b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n".to_vec(),
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n"
                .to_vec(),
        ];
        for obj in &objects {
            offsets.push(body.len());
            body.extend_from_slice(obj);
        }
        let xref_at = body.len();
        body.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for off in &offsets {
            body.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        body.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n");
        body.extend_from_slice(xref_at.to_string().as_bytes());
        body.extend_from_slice(b"\n%%EOF\n");
        body
    }

    #[test]
    fn test_open_and_walk_pages() {
        let mut graph = ObjectGraph::open(tiny_pdf()).unwrap();
        assert_eq!(graph.version, "1.4");
        let pages = graph.pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].media_box, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_dangling_reference() {
        let mut graph = ObjectGraph::open(tiny_pdf()).unwrap();
        let err = graph.resolve_ref((99, 0)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(99, 0)));
        // lenient path records a diagnostic instead
        let obj = graph.resolve_or_null(&Object::Reference((99, 0)));
        assert!(obj.is_null());
        assert_eq!(graph.diagnostics.len(), 1);
    }

    #[test]
    fn test_free_entry_is_null() {
        let mut graph = ObjectGraph::open(tiny_pdf()).unwrap();
        assert_eq!(graph.resolve_ref((0, 65535)).unwrap(), Object::Null);
    }

    #[test]
    fn test_corrupt_offsets_recovered_by_scan() {
        let mut data = tiny_pdf();
        // shift every xref offset by +1
        let xref_pos = crate::pdf::parser::find_subslice(&data, b"xref").unwrap();
        let region: Vec<u8> = data[xref_pos..].to_vec();
        let fixed = String::from_utf8_lossy(&region).replace("0000000009", "0000000010");
        data.truncate(xref_pos);
        data.extend_from_slice(fixed.as_bytes());

        let mut graph = ObjectGraph::open(data).unwrap();
        let obj = graph.resolve_ref((1, 0)).unwrap();
        assert_eq!(obj.as_dict().unwrap().type_name(), Some("Catalog"));
        assert!(graph
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::XrefRecovered));
    }

    #[test]
    fn test_missing_trailer_falls_back_to_scan() {
        let mut data = tiny_pdf();
        let sx = crate::pdf::parser::find_subslice(&data, b"startxref").unwrap();
        data.truncate(sx);
        let mut graph = ObjectGraph::open(data).unwrap();
        let pages = graph.pages().unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_encrypted_is_rejected() {
        let mut data = tiny_pdf();
        let text = String::from_utf8(data.clone()).unwrap();
        let patched = text.replace("/Size 4", "/Size 4 /Encrypt 9 0 R");
        data = patched.into_bytes();
        // trailer grew, startxref still points at the xref keyword
        assert!(matches!(ObjectGraph::open(data), Err(Error::Encrypted)));
    }

    #[test]
    fn test_reference_cycle_fails_one_object() {
        let mut body = b"%PDF-1.4\n".to_vec();
        let o1 = body.len();
        body.extend_from_slice(b"1 0 obj\n<< /Next 2 0 R >>\nendobj\n");
        let o2 = body.len();
        body.extend_from_slice(b"2 0 obj\n1 0 R\nendobj\n");
        let xref_at = body.len();
        body.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        for off in [o1, o2] {
            body.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        body.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n");
        body.extend_from_slice(xref_at.to_string().as_bytes());
        body.extend_from_slice(b"\n%%EOF\n");

        let mut graph = ObjectGraph::open(body).unwrap();
        let one = graph.resolve_ref((1, 0)).unwrap();
        // following /Next from inside object 1 would cycle; resolving
        // object 2 directly terminates at one level of indirection
        let next = one.as_dict().unwrap().get("Next").cloned().unwrap();
        let two = graph.resolve(&next).unwrap();
        assert!(two.as_dict().is_some() || two.as_reference().is_some());
    }
}
