/// Incremental decoders for literal `( .. )` and hex `< .. >` strings.
///
/// Both are fed one byte at a time, so the windowed document parser and the
/// in-memory content parser share them.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Normal,
    Backslash,
    Octal,
    FinishOctal,
    CarriageReturn,
}

/// Decodes the body of a literal string. Feed it the bytes following the opening `(`.
///
/// ```
/// let mut decoder = StringDecoder::new();
/// for &b in data {
///     if decoder.feed(b) {
///         break;
///     }
/// }
/// let bytes = decoder.finish();
/// ```
#[derive(Clone, Debug)]
pub struct StringDecoder {
    state: State,
    nesting: u32,
    esc_octal: u32,
    out: Vec<u8>,
    max_len: usize,
}

impl StringDecoder {
    pub fn new() -> StringDecoder {
        StringDecoder::with_limit(usize::MAX)
    }

    /// Bytes beyond `max_len` are silently dropped.
    pub fn with_limit(max_len: usize) -> StringDecoder {
        StringDecoder {
            state: State::Normal,
            nesting: 0,
            esc_octal: 0,
            out: Vec::new(),
            max_len,
        }
    }

    #[inline]
    fn push(&mut self, b: u8) {
        if self.out.len() < self.max_len {
            self.out.push(b);
        }
    }

    /// Returns `true` once the closing parenthesis was consumed.
    pub fn feed(&mut self, c: u8) -> bool {
        loop {
            match self.state {
                State::Normal => {
                    match c {
                        b')' if self.nesting == 0 => return true,
                        b')' => {
                            self.nesting -= 1;
                            self.push(c);
                        }
                        b'(' => {
                            self.nesting += 1;
                            self.push(c);
                        }
                        b'\\' => self.state = State::Backslash,
                        _ => self.push(c),
                    }
                    return false;
                }
                State::Backslash => {
                    match c {
                        b'0' ..= b'7' => {
                            self.esc_octal = (c - b'0') as u32;
                            self.state = State::Octal;
                            return false;
                        }
                        b'\r' => {
                            self.state = State::CarriageReturn;
                            return false;
                        }
                        // line continuation
                        b'\n' => {}
                        b'n' => self.push(b'\n'),
                        b'r' => self.push(b'\r'),
                        b't' => self.push(b'\t'),
                        b'b' => self.push(b'\x08'),
                        b'f' => self.push(b'\x0c'),
                        _ => self.push(c),
                    }
                    self.state = State::Normal;
                    return false;
                }
                State::Octal => {
                    if let b'0' ..= b'7' = c {
                        self.esc_octal = self.esc_octal * 8 + (c - b'0') as u32;
                        self.state = State::FinishOctal;
                        return false;
                    }
                    self.push(self.esc_octal as u8);
                    self.state = State::Normal;
                }
                State::FinishOctal => {
                    self.state = State::Normal;
                    if let b'0' ..= b'7' = c {
                        // overflow is ignored
                        self.esc_octal = self.esc_octal * 8 + (c - b'0') as u32;
                        self.push(self.esc_octal as u8);
                        return false;
                    }
                    self.push(self.esc_octal as u8);
                }
                State::CarriageReturn => {
                    self.state = State::Normal;
                    if c == b'\n' {
                        return false;
                    }
                }
            }
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl Default for StringDecoder {
    fn default() -> Self {
        StringDecoder::new()
    }
}

/// Decodes the body of a hex string. Feed it the bytes following the opening `<`.
///
/// Anything that is not a hex digit is skipped and an odd trailing nibble is padded with zero.
#[derive(Clone, Debug)]
pub struct HexStringDecoder {
    first: bool,
    code: u8,
    out: Vec<u8>,
    max_len: usize,
}

impl HexStringDecoder {
    pub fn new() -> HexStringDecoder {
        HexStringDecoder::with_limit(usize::MAX)
    }

    pub fn with_limit(max_len: usize) -> HexStringDecoder {
        HexStringDecoder {
            first: true,
            code: 0,
            out: Vec::new(),
            max_len,
        }
    }

    /// Returns `true` once the closing `>` was consumed.
    pub fn feed(&mut self, c: u8) -> bool {
        if c == b'>' {
            return true;
        }
        if let Some(val) = super::hex_value(c) {
            if self.first {
                self.code = val * 16;
            } else {
                self.code += val;
                self.push(self.code);
            }
            self.first = !self.first;
        }
        false
    }

    #[inline]
    fn push(&mut self, b: u8) {
        if self.out.len() < self.max_len {
            self.out.push(b);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if !self.first {
            self.push(self.code);
        }
        self.out
    }
}

impl Default for HexStringDecoder {
    fn default() -> Self {
        HexStringDecoder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{HexStringDecoder, StringDecoder};

    fn string(data: &[u8]) -> Vec<u8> {
        let mut decoder = StringDecoder::new();
        for &b in data {
            if decoder.feed(b) {
                break;
            }
        }
        decoder.finish()
    }

    fn hex(data: &[u8]) -> Vec<u8> {
        let mut decoder = HexStringDecoder::new();
        for &b in data {
            if decoder.feed(b) {
                break;
            }
        }
        decoder.finish()
    }

    #[test]
    fn tests() {
        assert_eq!(string(b"a\\nb\\rc\\td\\(f/)\\\\hei)"), b"a\nb\rc\td(f/");
    }

    #[test]
    fn nested_parens() {
        assert_eq!(string(b"a(b(c)d)e)f"), b"a(b(c)d)e");
        assert_eq!(string(b"unknown \\q escape)"), b"unknown q escape");
    }

    #[test]
    fn string_split_lines() {
        assert_eq!(string(b"These \\\ntwo strings \\\nare the same.)"), b"These two strings are the same.");
        assert_eq!(string(b"These \\\rtwo strings \\\rare the same.)"), b"These two strings are the same.");
        assert_eq!(string(b"These \\\r\ntwo strings \\\r\nare the same.)"), b"These two strings are the same.");
    }

    #[test]
    fn octal_escape() {
        assert_eq!(
            string(b"This string contains\\245two octal characters\\307.)"),
            &b"This string contains\xa5two octal characters\xc7."[..]
        );
        assert_eq!(string(b"\\0053)"), b"\x053");
        assert_eq!(string(b"\\053)"), b"+");
        assert_eq!(string(b"\\53)"), b"+");
        // overflow is ignored
        assert_eq!(string(b"\\541)"), b"a");
    }

    #[test]
    fn length_limit() {
        let mut decoder = StringDecoder::with_limit(3);
        for &b in b"abcdef)" {
            if decoder.feed(b) {
                break;
            }
        }
        assert_eq!(decoder.finish(), b"abc");
    }

    #[test]
    fn unterminated() {
        assert_eq!(string(b"abc"), b"abc");
    }

    #[test]
    fn hex_test() {
        assert_eq!(hex(b"901FA3>"), [0x90, 0x1f, 0xa3]);
        assert_eq!(hex(b"901FA>"), [0x90, 0x1f, 0xa0]);
        assert_eq!(hex(b"1 9F\t5\r\n4\x0c62a>"), [0x19, 0xf5, 0x46, 0x2a]);
    }

    #[test]
    fn hex_skips_garbage() {
        assert_eq!(hex(b"12tk  \tAc>zzz"), [0x12, 0xac]);
        assert!(hex(b">").is_empty());
    }
}
