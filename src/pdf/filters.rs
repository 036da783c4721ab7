//! Stream filters. Each decoder is a pure function; chains compose
//! left to right per the stream's `/Filter` array.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use log::debug;

use crate::error::{Error, Result};
use crate::pdf::object::{Dictionary, Stream};

/// Decode a stream's raw bytes through its declared filter chain,
/// including predictor post-processing from `/DecodeParms`.
///
/// Image codecs (`DCTDecode`, `JPXDecode`) terminate the chain: their
/// output is the encoded image itself, handed on unchanged.
pub fn decode_stream_data(stream: &Stream) -> Result<Vec<u8>> {
    let mut data = stream.data.clone();
    let parms = stream.decode_parms();
    for (i, filter) in stream.filters().iter().enumerate() {
        let parms = parms.get(i).and_then(|p| p.as_ref());
        match filter.as_str() {
            "FlateDecode" | "Fl" => {
                data = flate_decode(&data)?;
                data = apply_predictor(data, parms)?;
            }
            "LZWDecode" | "LZW" => {
                let early = parms
                    .and_then(|p| p.get_i64("EarlyChange"))
                    .unwrap_or(1)
                    != 0;
                data = lzw_decode(&data, early)?;
                data = apply_predictor(data, parms)?;
            }
            "ASCII85Decode" | "A85" => data = ascii85_decode(&data)?,
            "ASCIIHexDecode" | "AHx" => data = asciihex_decode(&data)?,
            "RunLengthDecode" | "RL" => data = runlength_decode(&data)?,
            "DCTDecode" | "DCT" | "JPXDecode" => break,
            "Crypt" => {
                // /Identity is the only Crypt we see unencrypted
                let name = parms.and_then(|p| p.get_name("Name")).unwrap_or("Identity");
                if name != "Identity" {
                    return Err(Error::UnsupportedFilter(format!("Crypt/{name}")));
                }
            }
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        }
    }
    Ok(data)
}

/// True when the filter chain ends in an image codec the engine does
/// not decode (the payload itself is the image file).
pub fn is_image_filter(name: &str) -> bool {
    matches!(name, "DCTDecode" | "DCT" | "JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode")
}

/// Inflate. Producers disagree on whether the zlib header is present,
/// so a raw-deflate pass is tried when the zlib pass yields nothing.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut zlib = ZlibDecoder::new(data);
    match zlib.read_to_end(&mut out) {
        Ok(_) if !out.is_empty() || data.is_empty() => return Ok(out),
        Ok(_) => {}
        Err(e) => {
            if !out.is_empty() {
                // truncated tail after valid prefix: keep what decoded
                debug!("flate stream truncated, keeping {} bytes: {e}", out.len());
                return Ok(out);
            }
        }
    }
    out.clear();
    let mut raw = DeflateDecoder::new(data);
    raw.read_to_end(&mut out)
        .map_err(|e| Error::Corrupted(format!("flate decode failed: {e}")))?;
    Ok(out)
}

/// LZW with variable code width 9..12 bits, codes 256 = clear and
/// 257 = end-of-data. With `early_change`, the width grows one code
/// before the table is actually full.
pub fn lzw_decode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    const CLEAR: u16 = 256;
    const EOD: u16 = 257;
    const FIRST: u16 = 258;

    let mut table: Vec<Vec<u8>> = (0..=255u16).map(|b| vec![b as u8]).collect();
    table.push(Vec::new()); // 256
    table.push(Vec::new()); // 257

    let mut out = Vec::new();
    let mut width = 9u32;
    let mut bits = 0u32;
    let mut acc = 0u32;
    let mut prev: Option<u16> = None;
    let bump = if early_change { 1 } else { 0 };

    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= width {
            bits -= width;
            let code = ((acc >> bits) & ((1 << width) - 1)) as u16;
            match code {
                EOD => return Ok(out),
                CLEAR => {
                    table.truncate(FIRST as usize);
                    width = 9;
                    prev = None;
                }
                _ => {
                    let entry = if (code as usize) < table.len() {
                        table[code as usize].clone()
                    } else if let Some(p) = prev {
                        // KwKwK case
                        let mut e = table[p as usize].clone();
                        e.push(table[p as usize][0]);
                        e
                    } else {
                        return Err(Error::Corrupted(format!("LZW code {code} out of range")));
                    };
                    if let Some(p) = prev {
                        let mut new = table[p as usize].clone();
                        new.push(entry[0]);
                        table.push(new);
                    }
                    out.extend_from_slice(&entry);
                    prev = Some(code);
                    if table.len() + bump >= (1 << width) && width < 12 {
                        width += 1;
                    }
                }
            }
        }
    }
    Ok(out)
}

/// ASCII85: 5 chars -> 4 bytes, `z` shorthand for four zero bytes,
/// `~>` terminator, whitespace ignored.
pub fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut n = 0usize;
    // tolerate the optional <~ opener
    let body = data.strip_prefix(b"<~".as_slice()).unwrap_or(data);

    for &b in body {
        match b {
            b'~' => break,
            b'z' if n == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[n] = b - b'!';
                n += 1;
                if n == 5 {
                    push_group(&mut out, &group, 5)?;
                    n = 0;
                }
            }
            _ if b.is_ascii_whitespace() => {}
            other => {
                return Err(Error::Corrupted(format!(
                    "invalid ASCII85 byte 0x{other:02x}"
                )))
            }
        }
    }
    if n > 0 {
        if n == 1 {
            return Err(Error::Corrupted("dangling ASCII85 digit".into()));
        }
        // pad with 'u' and drop the padded output bytes
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        push_group(&mut out, &group, n)?;
    }
    Ok(out)
}

fn push_group(out: &mut Vec<u8>, group: &[u8; 5], used: usize) -> Result<()> {
    let mut v = 0u32;
    for &d in group {
        v = v
            .checked_mul(85)
            .and_then(|v| v.checked_add(d as u32))
            .ok_or_else(|| Error::Corrupted("ASCII85 group overflow".into()))?;
    }
    let bytes = v.to_be_bytes();
    out.extend_from_slice(&bytes[..used - 1]);
    Ok(())
}

/// ASCIIHex: hex pairs, whitespace ignored, `>` terminator, odd final
/// digit padded with zero.
pub fn asciihex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut hi: Option<u8> = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        let v = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            other => {
                return Err(Error::Corrupted(format!(
                    "invalid ASCIIHex byte 0x{other:02x}"
                )))
            }
        };
        match hi.take() {
            Some(h) => out.push(h * 16 + v),
            None => hi = Some(v),
        }
    }
    if let Some(h) = hi {
        out.push(h * 16);
    }
    Ok(out)
}

/// PackBits-style run-length: length byte < 128 copies n+1 literal
/// bytes, length byte > 128 repeats the next byte 257-n times, 128
/// ends the data.
pub fn runlength_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let n = len as usize + 1;
                let chunk = data
                    .get(i..i + n)
                    .ok_or_else(|| Error::Corrupted("truncated RunLength literal".into()))?;
                out.extend_from_slice(chunk);
                i += n;
            }
            129..=255 => {
                let b = *data
                    .get(i)
                    .ok_or_else(|| Error::Corrupted("truncated RunLength run".into()))?;
                i += 1;
                out.extend(std::iter::repeat(b).take(257 - len as usize));
            }
        }
    }
    Ok(out)
}

/// Undo row prediction when `/Predictor` >= 2. PNG predictors carry
/// a per-row tag byte; TIFF predictor 2 is horizontal differencing.
fn apply_predictor(data: Vec<u8>, parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(parms) = parms else { return Ok(data) };
    let predictor = parms.get_i64("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }
    let colors = parms.get_i64("Colors").unwrap_or(1).max(1) as usize;
    let bpc = parms.get_i64("BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = parms.get_i64("Columns").unwrap_or(1).max(1) as usize;
    let bpp = (colors * bpc).div_ceil(8).max(1);
    let row = (colors * bpc * columns).div_ceil(8);

    if predictor == 2 {
        return Ok(tiff_predictor(data, row, bpp));
    }
    png_predictor(&data, row, bpp)
}

fn tiff_predictor(mut data: Vec<u8>, row: usize, bpp: usize) -> Vec<u8> {
    // only the byte-aligned (8-bit component) case matters in practice
    for r in data.chunks_mut(row) {
        for i in bpp..r.len() {
            r[i] = r[i].wrapping_add(r[i - bpp]);
        }
    }
    data
}

fn png_predictor(data: &[u8], row: usize, bpp: usize) -> Result<Vec<u8>> {
    let stride = row + 1;
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row];
    for chunk in data.chunks(stride) {
        if chunk.len() < 2 {
            break;
        }
        let tag = chunk[0];
        let mut cur = chunk[1..].to_vec();
        cur.resize(row, 0);
        match tag {
            0 => {}
            1 => {
                for i in bpp..row {
                    cur[i] = cur[i].wrapping_add(cur[i - bpp]);
                }
            }
            2 => {
                for i in 0..row {
                    cur[i] = cur[i].wrapping_add(prev[i]);
                }
            }
            3 => {
                for i in 0..row {
                    let left = if i >= bpp { cur[i - bpp] as u16 } else { 0 };
                    cur[i] = cur[i].wrapping_add(((left + prev[i] as u16) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row {
                    let a = if i >= bpp { cur[i - bpp] } else { 0 };
                    let b = prev[i];
                    let c = if i >= bpp { prev[i - bpp] } else { 0 };
                    cur[i] = cur[i].wrapping_add(paeth(a, b, c));
                }
            }
            other => {
                return Err(Error::Corrupted(format!(
                    "unknown PNG predictor tag {other}"
                )))
            }
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::object::Object;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_flate_round_trip() {
        let plain = b"the quick brown fox jumps over the lazy dog".repeat(4);
        assert_eq!(flate_decode(&deflate(&plain)).unwrap(), plain);
    }

    #[test]
    fn test_asciihex() {
        assert_eq!(asciihex_decode(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        // odd digit count pads with zero
        assert_eq!(asciihex_decode(b"7>").unwrap(), vec![0x70]);
    }

    #[test]
    fn test_ascii85() {
        assert_eq!(ascii85_decode(b"87cURDZ~>").unwrap(), b"Hello");
        assert_eq!(ascii85_decode(b"z~>").unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn test_runlength() {
        // 2 literals "ab", then "c" repeated 3 times, then EOD
        let encoded = [1u8, b'a', b'b', 254, b'c', 128];
        assert_eq!(runlength_decode(&encoded).unwrap(), b"abccc");
    }

    #[test]
    fn test_lzw_reference_vector() {
        // canonical vector from the PDF spec: expands to 45 45 45 45 45 65 45 45 45 66
        let encoded = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(
            lzw_decode(&encoded, true).unwrap(),
            vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]
        );
    }

    #[test]
    fn test_png_up_predictor() {
        // two rows of 3 bytes, Up predictor (tag 2)
        let raw = [2u8, 1, 1, 1, 2, 1, 1, 1];
        let out = png_predictor(&raw, 3, 1).unwrap();
        assert_eq!(out, vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_tiff_predictor() {
        let data = vec![10u8, 1, 1, 20, 2, 2];
        assert_eq!(tiff_predictor(data, 3, 1), vec![10, 11, 12, 20, 22, 24]);
    }

    #[test]
    fn test_unknown_filter_is_reported() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name("BogusDecode".into()));
        let stream = Stream::new(dict, b"xx".to_vec());
        assert!(matches!(
            decode_stream_data(&stream),
            Err(Error::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn test_filter_chain_composes() {
        let plain = b"chained payload";
        let flated = deflate(plain);
        let hex: String = flated.iter().map(|b| format!("{b:02X}")).collect();
        let mut dict = Dictionary::new();
        dict.set(
            "Filter",
            Object::Array(vec![
                Object::Name("ASCIIHexDecode".into()),
                Object::Name("FlateDecode".into()),
            ]),
        );
        let stream = Stream::new(dict, format!("{hex}>").into_bytes());
        assert_eq!(decode_stream_data(&stream).unwrap(), plain);
    }
}
