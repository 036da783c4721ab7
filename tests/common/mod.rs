//! Shared builders for synthetic in-memory test documents.

/// Assembles a small PDF with correct byte offsets, so tests can
/// exercise the xref machinery without fixture files.
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
    root_id: u32,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            root_id: 1,
        }
    }

    /// Add object `id` with the given body (what follows `n 0 obj`).
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.push((id, body.as_bytes().to_vec()));
        self
    }

    pub fn stream_object(mut self, id: u32, dict_extra: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {}>>\nstream\n", data.len(), dict_extra).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((id, body));
        self
    }

    /// A one-page document around the given content stream.
    pub fn single_page(content: &[u8]) -> Self {
        Self::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
            )
            .stream_object(4, "", content)
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_shifted(0)
    }

    /// Build with every recorded xref offset wrong by `delta` bytes,
    /// for scan-recovery tests.
    pub fn build_shifted(&self, delta: i64) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (id, body) in &self.objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let max_id = self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0);
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", max_id + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..=max_id {
            match offsets.iter().find(|(oid, _)| *oid == id) {
                Some((_, off)) => {
                    let shifted = (*off as i64 + delta).max(0);
                    out.extend_from_slice(format!("{shifted:010} 00000 n \n").as_bytes());
                }
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
                max_id + 1,
                self.root_id
            )
            .as_bytes(),
        );
        out
    }

    /// Build with a cross-reference stream instead of a classic
    /// table.
    pub fn build_xref_stream(&self) -> Vec<u8> {
        let mut out = b"%PDF-1.5\n".to_vec();
        let mut offsets = Vec::new();
        for (id, body) in &self.objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let max_id = self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0);
        let xref_id = max_id + 1;
        let xref_at = out.len();

        // W [1 4 2]: type byte, 4-byte offset, 2-byte generation
        let mut rows = Vec::new();
        let mut index = String::new();
        let mut push_row = |id: u32, entry: [u8; 7], index: &mut String| {
            index.push_str(&format!("{id} 1 "));
            rows.extend_from_slice(&entry);
        };
        push_row(0, [0, 0, 0, 0, 0, 0xff, 0xff], &mut index);
        for id in 1..=xref_id {
            let off = if id == xref_id {
                xref_at
            } else {
                match offsets.iter().find(|(oid, _)| *oid == id) {
                    Some((_, off)) => *off,
                    None => continue,
                }
            };
            let o = (off as u32).to_be_bytes();
            push_row(id, [1, o[0], o[1], o[2], o[3], 0, 0], &mut index);
        }

        let dict = format!(
            "<< /Type /XRef /Size {} /W [1 4 2] /Index [{}] /Root {} 0 R /Length {} >>",
            xref_id + 1,
            index.trim_end(),
            self.root_id,
            rows.len()
        );
        out.extend_from_slice(format!("{xref_id} 0 obj\n{dict}\nstream\n").as_bytes());
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        out
    }
}

/// Content stream placing `text` at (x, y) in 12pt.
pub fn show_text(text: &str, x: f32, y: f32) -> Vec<u8> {
    format!("BT /F1 12 Tf {x} {y} Td ({text}) Tj ET").into_bytes()
}
