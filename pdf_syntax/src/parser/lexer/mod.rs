/// Lexing an input buffer, in the sense of breaking it up into words based on delimiters and
/// whitespace. Also holds the character classes shared with the windowed document parser.

use std::ops::{Range, Deref};

use crate::error::*;
use crate::primitive::Primitive;

mod str;
pub use self::str::{StringDecoder, HexStringDecoder};

/// Longest word either parser keeps; the rest of an over-long token is skipped.
pub const MAX_WORD_LEN: usize = 256;

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}
#[inline]
pub fn is_line_ending(b: u8) -> bool {
    matches!(b, b'\r' | b'\n')
}
#[inline]
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}
#[inline]
pub fn is_numeric(b: u8) -> bool {
    matches!(b, b'0' ..= b'9' | b'.' | b'-' | b'+')
}
/// Neither whitespace, delimiter nor numeric.
#[inline]
pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b) && !is_numeric(b)
}
#[inline]
pub fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0' ..= b'9' => Some(b - b'0'),
        b'a' ..= b'f' => Some(b - b'a' + 10),
        b'A' ..= b'F' => Some(b - b'A' + 10),
        _ => None
    }
}

/// Convert a numeric word into `Integer` or `Number`.
///
/// Words containing a `.` are reals. Everything else is read as an unsigned 32 bit value:
/// overflow yields 0, an explicit sign on a value outside the `i32` range yields 0, and an
/// unsigned value beyond `i32::MAX` wraps around. Parsing stops at the first non-digit.
pub fn parse_number(word: &[u8]) -> Primitive {
    if word.contains(&b'.') {
        return Primitive::Number(parse_real(word));
    }
    let (negative, signed, digits) = match word.first() {
        Some(b'+') => (false, true, &word[1..]),
        Some(b'-') => (true, true, &word[1..]),
        _ => (false, false, word)
    };
    let mut value: u32 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        match value.checked_mul(10).and_then(|v| v.checked_add((b - b'0') as u32)) {
            Some(v) => value = v,
            None => return Primitive::Integer(0),
        }
    }
    if negative {
        // -2147483648 is the one magnitude without a positive counterpart
        return Primitive::Integer(match i32::try_from(-(value as i64)) {
            Ok(v) => v,
            Err(_) => 0,
        });
    }
    if signed && value > i32::MAX as u32 {
        return Primitive::Integer(0);
    }
    Primitive::Integer(value as i32)
}

/// Parses the longest prefix of the form `[+-]?digits[.digits]`. Garbage yields 0.
pub fn parse_real(word: &[u8]) -> f32 {
    let mut end = 0;
    if let Some(b'+' | b'-') = word.first() {
        end = 1;
    }
    let mut seen_dot = false;
    while let Some(&b) = word.get(end) {
        match b {
            b'0' ..= b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break
        }
        end += 1;
    }
    let s = match std::str::from_utf8(&word[..end]) {
        Ok(s) => s,
        Err(_) => return 0.0,
    };
    match s {
        "" | "+" | "-" | "." | "+." | "-." => 0.0,
        s => s.parse().unwrap_or(0.0)
    }
}

/// Unsigned value of the leading digits; 0 on overflow.
pub fn parse_uint(word: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for &b in word.iter().take_while(|b| b.is_ascii_digit()) {
        match value.checked_mul(10).and_then(|v| v.checked_add((b - b'0') as u32)) {
            Some(v) => value = v,
            None => return 0,
        }
    }
    value
}

/// `Lexer` walks the words of an in-memory buffer. Used for content streams and
/// inline image data.
#[derive(Copy, Clone)]
pub struct Lexer<'a> {
    pos: usize,
    buf: &'a [u8],
    file_offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(buf: &'a [u8]) -> Lexer<'a> {
        Lexer {
            pos: 0,
            buf,
            file_offset: 0
        }
    }
    /// `file_offset` is added to the ranges of returned `Substr`s.
    pub fn with_offset(buf: &'a [u8], file_offset: usize) -> Lexer<'a> {
        Lexer {
            pos: 0,
            buf,
            file_offset
        }
    }

    #[inline]
    pub fn get_pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, wanted_pos: usize) {
        self.pos = wanted_pos.min(self.buf.len());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn get_remaining_slice(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    #[inline]
    pub fn next_byte(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    #[inline]
    pub fn peek_byte(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Reads the next word and whether it consists of numeric characters only.
    /// An empty word means the end of the buffer was reached.
    ///
    /// Names keep their leading `/`, `<<` and `>>` form one word, any other delimiter
    /// is a word of its own.
    pub fn next_word(&mut self) -> (Substr<'a>, bool) {
        let mut ch = match self.next_byte() {
            Some(b) => b,
            None => return (self.new_substr(self.pos..self.pos), true),
        };
        loop {
            while is_whitespace(ch) {
                ch = match self.next_byte() {
                    Some(b) => b,
                    None => return (self.new_substr(self.pos..self.pos), true),
                };
            }
            if ch != b'%' {
                break;
            }
            loop {
                ch = match self.next_byte() {
                    Some(b) => b,
                    None => return (self.new_substr(self.pos..self.pos), true),
                };
                if is_line_ending(ch) {
                    break;
                }
            }
        }

        let start = self.pos - 1;
        if is_delimiter(ch) {
            match ch {
                b'/' => {
                    while let Some(b) = self.peek_byte() {
                        if !is_regular(b) && !is_numeric(b) {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'<' | b'>' => {
                    if self.peek_byte() == Some(ch) {
                        self.pos += 1;
                    }
                }
                _ => {}
            }
            return (self.word_substr(start), false);
        }

        let mut is_number = is_numeric(ch);
        while let Some(b) = self.peek_byte() {
            if is_delimiter(b) || is_whitespace(b) {
                break;
            }
            is_number &= is_numeric(b);
            self.pos += 1;
        }
        (self.word_substr(start), is_number)
    }

    // words are capped at MAX_WORD_LEN, the remainder has already been skipped
    #[inline]
    fn word_substr(&self, start: usize) -> Substr<'a> {
        let end = self.pos.min(start + MAX_WORD_LEN);
        self.new_substr(start..end)
    }

    /// Returns the next word without consuming it.
    pub fn peek_word(&self) -> (Substr<'a>, bool) {
        let mut copy = *self;
        copy.next_word()
    }

    /// Skips whitespace and comments. Returns `false` at the end of the buffer.
    pub fn skip_whitespace_and_comments(&mut self) -> bool {
        while let Some(b) = self.peek_byte() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(b) = self.next_byte() {
                    if is_line_ending(b) {
                        break;
                    }
                }
            } else {
                return true;
            }
        }
        false
    }

    /// Reads a literal string. The opening `(` must already be consumed.
    pub fn read_string(&mut self, max_len: usize) -> Vec<u8> {
        let mut decoder = StringDecoder::with_limit(max_len);
        while let Some(b) = self.next_byte() {
            if decoder.feed(b) {
                break;
            }
        }
        decoder.finish()
    }

    /// Reads a hex string. The opening `<` must already be consumed.
    pub fn read_hex_string(&mut self, max_len: usize) -> Vec<u8> {
        let mut decoder = HexStringDecoder::with_limit(max_len);
        while let Some(b) = self.next_byte() {
            if decoder.feed(b) {
                break;
            }
        }
        decoder.finish()
    }

    #[inline]
    pub fn new_substr(&self, range: Range<usize>) -> Substr<'a> {
        Substr {
            file_offset: self.file_offset + range.start,
            slice: &self.buf[range],
        }
    }
}

/// A slice from some original input - not copied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Substr<'a> {
    slice: &'a [u8],
    file_offset: usize,
}
impl<'a> Substr<'a> {
    pub fn new<T: AsRef<[u8]> + ?Sized>(data: &'a T, file_offset: usize) -> Self {
        Substr { slice: data.as_ref(), file_offset }
    }
    // as: &S -> &U. Cheap borrow conversion
    // into: S -> U. Cheap ownership transfer conversion.

    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        String::from_utf8_lossy(self.as_slice()).into()
    }
    pub fn to_vec(&self) -> Vec<u8> {
        self.slice.to_vec()
    }
    pub fn as_slice(&self) -> &'a [u8] {
        self.slice
    }
    pub fn as_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(self.slice)?)
    }
    pub fn equals(&self, other: impl AsRef<[u8]>) -> bool {
        self.slice == other.as_ref()
    }
    pub fn file_range(&self) -> Range<usize> {
        self.file_offset .. self.file_offset + self.slice.len()
    }
}

impl<'a> Deref for Substr<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}
impl<'a> PartialEq<&[u8]> for Substr<'a> {
    fn eq(&self, rhs: &&[u8]) -> bool {
        self.equals(rhs)
    }
}
impl<'a> PartialEq<&str> for Substr<'a> {
    fn eq(&self, rhs: &&str) -> bool {
        self.equals(rhs.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(data: &[u8]) -> Vec<(String, bool)> {
        let mut lexer = Lexer::new(data);
        let mut out = vec![];
        loop {
            let (word, is_number) = lexer.next_word();
            if word.is_empty() {
                break;
            }
            out.push((word.to_string(), is_number));
        }
        out
    }

    #[test]
    fn test_words() {
        let w = words(b"  /Name 12 -3.5 <<>> [true] % comment\n BT");
        let w: Vec<&str> = w.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(w, ["/Name", "12", "-3.5", "<<", ">>", "[", "true", "]", "BT"]);
    }

    #[test]
    fn test_number_flag() {
        let w = words(b"12 1.5 1a /12 +");
        let flags: Vec<bool> = w.iter().map(|&(_, n)| n).collect();
        assert_eq!(flags, [true, true, false, false, true]);
    }

    #[test]
    fn test_long_word_truncated() {
        let mut data = vec![b'a'; 1000];
        data.extend_from_slice(b" next");
        let mut lexer = Lexer::new(&data);
        let (word, _) = lexer.next_word();
        assert_eq!(word.len(), MAX_WORD_LEN);
        let (word, _) = lexer.next_word();
        assert_eq!(word, "next");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(b"42"), Primitive::Integer(42));
        assert_eq!(parse_number(b"-17"), Primitive::Integer(-17));
        assert_eq!(parse_number(b"+5"), Primitive::Integer(5));
        assert_eq!(parse_number(b"1.5"), Primitive::Number(1.5));
        assert_eq!(parse_number(b"-.5"), Primitive::Number(-0.5));
        assert_eq!(parse_number(b"12abc"), Primitive::Integer(12));
        // overflow
        assert_eq!(parse_number(b"99999999999"), Primitive::Integer(0));
        assert_eq!(parse_number(b"-3000000000"), Primitive::Integer(0));
        assert_eq!(parse_number(b"+2147483648"), Primitive::Integer(0));
        assert_eq!(parse_number(b"-2147483649"), Primitive::Integer(0));
        // the extremes of i32
        assert_eq!(parse_number(b"-2147483648"), Primitive::Integer(i32::MIN));
        assert_eq!(parse_number(b"2147483647"), Primitive::Integer(i32::MAX));
        assert_eq!(parse_number(b"+2147483647"), Primitive::Integer(i32::MAX));
        // unsigned values beyond i32 wrap
        assert_eq!(parse_number(b"3000000000"), Primitive::Integer(3000000000u32 as i32));
    }

    #[test]
    fn test_parse_real() {
        assert_eq!(parse_real(b"3.25"), 3.25);
        assert_eq!(parse_real(b"1.2.3"), 1.2);
        assert_eq!(parse_real(b"."), 0.0);
        assert_eq!(parse_real(b"--1"), 0.0);
    }

    #[test]
    fn test_substr() {
        let s = Substr::new("123", 10);
        assert_eq!(s.as_str().unwrap(), "123");
        assert_eq!(s.file_range(), 10..13);
        assert!(s.equals("123"));

        let mut lexer = Lexer::with_offset(b"  /A 12", 100);
        assert_eq!(lexer.next_word().0.file_range(), 102..104);
        assert_eq!(lexer.next_word().0.file_range(), 105..107);
    }

    #[test]
    fn test_char_classes() {
        assert!(is_whitespace(b'\x0c'));
        assert!(is_delimiter(b'%'));
        assert!(is_numeric(b'+'));
        assert!(is_regular(b'R'));
        assert!(!is_regular(b'1'));
    }
}
