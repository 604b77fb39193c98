//! Text string encodings: PDFDocEncoding, UTF-16 and UTF-8 with byte order mark.

use crate::error::*;

// PDFDocEncoding differs from Latin-1 only in these two ranges
static PDF_DOC_18: [char; 8] = [
    '\u{02d8}', '\u{02c7}', '\u{02c6}', '\u{02d9}', '\u{02dd}', '\u{02db}', '\u{02da}', '\u{02dc}',
];
static PDF_DOC_80: [Option<char>; 33] = [
    Some('\u{2022}'), Some('\u{2020}'), Some('\u{2021}'), Some('\u{2026}'),
    Some('\u{2014}'), Some('\u{2013}'), Some('\u{0192}'), Some('\u{2044}'),
    Some('\u{2039}'), Some('\u{203a}'), Some('\u{2212}'), Some('\u{2030}'),
    Some('\u{201e}'), Some('\u{201c}'), Some('\u{201d}'), Some('\u{2018}'),
    Some('\u{2019}'), Some('\u{201a}'), Some('\u{2122}'), Some('\u{fb01}'),
    Some('\u{fb02}'), Some('\u{0141}'), Some('\u{0152}'), Some('\u{0160}'),
    Some('\u{0178}'), Some('\u{017d}'), Some('\u{0131}'), Some('\u{0142}'),
    Some('\u{0153}'), Some('\u{0161}'), Some('\u{017e}'), None,
    Some('\u{20ac}'),
];

/// The character a PDFDocEncoding byte stands for. `None` if undefined.
pub fn pdf_doc_char(b: u8) -> Option<char> {
    match b {
        0x18 ..= 0x1f => Some(PDF_DOC_18[(b - 0x18) as usize]),
        0x80 ..= 0xa0 => PDF_DOC_80[(b - 0x80) as usize],
        0x7f | 0xad => None,
        b => Some(b as char)
    }
}

/// The PDFDocEncoding byte for `c`, if there is one.
pub fn pdf_doc_byte(c: char) -> Option<u8> {
    let n = c as u32;
    match n {
        0x00 ..= 0x17 | 0x20 ..= 0x7e | 0xa1 ..= 0xff if n != 0xad => Some(n as u8),
        _ => {
            if let Some(i) = PDF_DOC_18.iter().position(|&d| d == c) {
                return Some(0x18 + i as u8);
            }
            PDF_DOC_80.iter().position(|&d| d == Some(c)).map(|i| 0x80 + i as u8)
        }
    }
}

/// UTF-16 code units, without the language escapes (`ESC xx [yy] ESC`).
fn utf16_units(data: &[u8], big_endian: bool) -> Vec<u16> {
    let mut units = Vec::with_capacity(data.len() / 2);
    let mut in_escape = false;
    for pair in data.chunks_exact(2) {
        let unit = if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        };
        if unit == 0x1b {
            in_escape = !in_escape;
            continue;
        }
        if !in_escape {
            units.push(unit);
        }
    }
    units
}

enum Text<'a> {
    Utf16(Vec<u16>),
    Utf8(&'a [u8]),
    PdfDoc(&'a [u8]),
}
fn classify(data: &[u8]) -> Text {
    match data {
        [0xfe, 0xff, rest @ ..] => Text::Utf16(utf16_units(rest, true)),
        [0xff, 0xfe, rest @ ..] => Text::Utf16(utf16_units(rest, false)),
        [0xef, 0xbb, 0xbf, rest @ ..] => Text::Utf8(rest),
        _ => Text::PdfDoc(data),
    }
}

/// Decode a text string. Malformed and undefined characters become U+FFFD.
pub fn decode_text(data: &[u8]) -> String {
    match classify(data) {
        Text::Utf16(units) => std::char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
        Text::Utf8(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Text::PdfDoc(bytes) => bytes.iter()
            .map(|&b| pdf_doc_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    }
}

/// Decode a text string, failing on malformed or undefined characters.
pub fn decode_text_strict(data: &[u8]) -> Result<String> {
    match classify(data) {
        Text::Utf16(units) => std::char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|e| PdfError::Utf8 { source: e.into() }),
        Text::Utf8(bytes) => Ok(std::str::from_utf8(bytes)?.to_owned()),
        Text::PdfDoc(bytes) => bytes.iter()
            .map(|&b| pdf_doc_char(b).ok_or_else(|| PdfError::Other {
                msg: format!("byte {:#04x} is undefined in PDFDocEncoding", b)
            }))
            .collect(),
    }
}

/// Encode `text` as PDFDocEncoding if possible, as UTF-16BE with byte order mark otherwise.
pub fn encode_text(text: &str) -> Vec<u8> {
    if let Some(bytes) = text.chars().map(pdf_doc_byte).collect::<Option<Vec<u8>>>() {
        // must not be mistaken for a byte order mark
        if !bytes.starts_with(&[0xfe, 0xff]) && !bytes.starts_with(&[0xff, 0xfe]) && !bytes.starts_with(&[0xef, 0xbb, 0xbf]) {
            return bytes;
        }
    }
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xfe, 0xff]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}
