use crate::error::*;
use crate::backend::Backend;
use crate::options::ParseOptions;
use super::lexer::{
    is_whitespace, is_line_ending, is_delimiter, is_numeric, is_regular, parse_uint,
    StringDecoder, HexStringDecoder, MAX_WORD_LEN,
};

/// Tokenizer over a `Backend`, reading it through a small window.
///
/// Positions are relative to the header offset given on construction.
/// Everything that reads may fail with `DataUnavailable` when used on a
/// progressively loaded backend; operations documented to do so restore the
/// cursor in that case.
pub struct SyntaxParser<'a, B: Backend> {
    pub(super) backend: &'a B,
    pub(super) options: ParseOptions,
    pub(super) header_offset: usize,
    pub(super) file_len: usize,
    pub(super) pos: usize,
    window: &'a [u8],
    window_start: usize,
    /// the last word read, capped at MAX_WORD_LEN
    pub(super) word: Vec<u8>,
}

impl<'a, B: Backend> SyntaxParser<'a, B> {
    pub fn new(backend: &'a B, options: ParseOptions) -> Self {
        SyntaxParser::with_header_offset(backend, 0, options)
    }

    /// Offsets are relative to `header_offset` (the position of `%PDF-`).
    pub fn with_header_offset(backend: &'a B, header_offset: usize, options: ParseOptions) -> Self {
        let header_offset = header_offset.min(backend.len());
        SyntaxParser {
            backend,
            options,
            header_offset,
            file_len: backend.len() - header_offset,
            pos: 0,
            window: &[],
            window_start: 0,
            word: Vec::with_capacity(MAX_WORD_LEN),
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }
    pub fn file_len(&self) -> usize {
        self.file_len
    }
    pub fn pos(&self) -> usize {
        self.pos
    }
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.file_len);
    }

    fn load_window(&mut self, start: usize) -> Result<()> {
        let end = (start + self.options.window_size).min(self.file_len);
        let offset = self.header_offset;
        self.window = match self.backend.read(offset + start .. offset + end) {
            Ok(window) => window,
            // the window may reach into bytes that are still missing
            Err(e) if e.is_data_unavailable() && end > start + 1 => {
                self.backend.read(offset + start .. offset + start + 1)?
            }
            Err(e) => return Err(e),
        };
        self.window_start = start;
        Ok(())
    }

    #[inline]
    fn in_window(&self, pos: usize) -> bool {
        pos >= self.window_start && pos < self.window_start + self.window.len()
    }

    pub(super) fn byte_at(&mut self, pos: usize) -> Result<Option<u8>> {
        if pos >= self.file_len {
            return Ok(None);
        }
        if !self.in_window(pos) {
            self.load_window(pos)?;
        }
        Ok(Some(self.window[pos - self.window_start]))
    }

    // like byte_at, but a reload places the window before `pos`
    fn byte_at_backward(&mut self, pos: usize) -> Result<Option<u8>> {
        if pos >= self.file_len {
            return Ok(None);
        }
        if !self.in_window(pos) {
            let start = (pos + 1).saturating_sub(self.options.window_size);
            self.load_window(start)?;
            if !self.in_window(pos) {
                self.load_window(pos)?;
            }
        }
        Ok(Some(self.window[pos - self.window_start]))
    }

    pub(super) fn next_char(&mut self) -> Result<Option<u8>> {
        let b = self.byte_at(self.pos)?;
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    /// Skips whitespace and comments.
    pub fn to_next_word(&mut self) -> Result<()> {
        loop {
            let ch = match self.byte_at(self.pos)? {
                Some(ch) => ch,
                None => return Ok(()),
            };
            if is_whitespace(ch) {
                self.pos += 1;
            } else if ch == b'%' {
                while let Some(ch) = self.next_char()? {
                    if is_line_ending(ch) {
                        break;
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    /// Moves behind the next line ending (`\r`, `\n` or `\r\n`).
    pub fn to_next_line(&mut self) -> Result<()> {
        while let Some(ch) = self.next_char()? {
            if ch == b'\n' {
                break;
            }
            if ch == b'\r' {
                if self.byte_at(self.pos)? == Some(b'\n') {
                    self.pos += 1;
                }
                break;
            }
        }
        Ok(())
    }

    #[inline]
    fn push_word(&mut self, ch: u8) {
        if self.word.len() < MAX_WORD_LEN {
            self.word.push(ch);
        }
    }

    /// Reads the next word into the word buffer. Returns whether it is numeric.
    pub(super) fn read_word(&mut self) -> Result<bool> {
        self.word.clear();
        self.to_next_word()?;
        let mut ch = match self.next_char()? {
            Some(ch) => ch,
            None => return Ok(false),
        };
        if is_delimiter(ch) {
            self.push_word(ch);
            match ch {
                b'/' => {
                    while let Some(ch) = self.byte_at(self.pos)? {
                        if !is_regular(ch) && !is_numeric(ch) {
                            break;
                        }
                        self.pos += 1;
                        self.push_word(ch);
                    }
                }
                b'<' | b'>' => {
                    if self.byte_at(self.pos)? == Some(ch) {
                        self.pos += 1;
                        self.push_word(ch);
                    }
                }
                _ => {}
            }
            return Ok(false);
        }

        let mut is_number = true;
        loop {
            self.push_word(ch);
            is_number &= is_numeric(ch);
            ch = match self.byte_at(self.pos)? {
                Some(ch) if !is_delimiter(ch) && !is_whitespace(ch) => ch,
                _ => break,
            };
            self.pos += 1;
        }
        Ok(is_number)
    }

    /// The next word and whether it is numeric. An empty word means end of input.
    pub fn next_word(&mut self) -> Result<(Vec<u8>, bool)> {
        let saved = self.pos;
        match self.read_word() {
            Ok(is_number) => Ok((self.word.clone(), is_number)),
            Err(e) => {
                self.pos = saved;
                Err(e)
            }
        }
    }

    pub fn peek_next_word(&mut self) -> Result<(Vec<u8>, bool)> {
        let saved = self.pos;
        let result = self.next_word();
        self.pos = saved;
        result
    }

    /// The next word, numeric or not.
    pub fn keyword(&mut self) -> Result<Vec<u8>> {
        self.next_word().map(|(word, _)| word)
    }

    /// Reads an unsigned number. 0 if the next word is not numeric.
    pub fn direct_num(&mut self) -> Result<u32> {
        let (word, is_number) = self.next_word()?;
        if !is_number {
            return Ok(0);
        }
        Ok(parse_uint(&word))
    }

    /// Reads `len` bytes at the cursor. `None` if the input is shorter.
    pub fn read_block(&mut self, len: usize) -> Result<Option<Vec<u8>>> {
        let end = match self.pos.checked_add(len) {
            Some(end) if end <= self.file_len => end,
            _ => return Ok(None),
        };
        let offset = self.header_offset;
        let data = self.backend.read(offset + self.pos .. offset + end)?.to_vec();
        self.pos = end;
        Ok(Some(data))
    }

    /// Body of a literal string; the `(` has been consumed.
    pub(super) fn read_string(&mut self) -> Result<Vec<u8>> {
        let mut decoder = StringDecoder::new();
        while let Some(ch) = self.next_char()? {
            if decoder.feed(ch) {
                break;
            }
        }
        Ok(decoder.finish())
    }

    /// Body of a hex string; the `<` has been consumed.
    pub(super) fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        let mut decoder = HexStringDecoder::new();
        while let Some(ch) = self.next_char()? {
            if decoder.feed(ch) {
                break;
            }
        }
        Ok(decoder.finish())
    }

    /// Number of end-of-line bytes at `pos`: 2 for `\r\n`, 1 for `\r` or `\n`, else 0.
    pub(super) fn read_eol_markers(&mut self, pos: usize) -> Result<usize> {
        Ok(match self.byte_at(pos)? {
            Some(b'\r') => {
                if self.byte_at(pos + 1)? == Some(b'\n') { 2 } else { 1 }
            }
            Some(b'\n') => 1,
            _ => 0
        })
    }

    /// Searches for `tag` from the cursor. Returns the offset of its start relative to
    /// the cursor and leaves the cursor behind it.
    pub fn find_tag(&mut self, tag: &[u8]) -> Result<Option<usize>> {
        if tag.is_empty() {
            return Ok(Some(0));
        }
        let start = self.pos;
        let mut matched = 0;
        while let Some(ch) = self.next_char()? {
            if ch == tag[matched] {
                matched += 1;
                if matched == tag.len() {
                    return Ok(Some(self.pos - start - tag.len()));
                }
            } else {
                matched = if ch == tag[0] { 1 } else { 0 };
            }
        }
        Ok(None)
    }

    /// `true` if `word` at `start` is not glued to a neighbouring regular or numeric character.
    fn is_whole_word(&mut self, start: usize, word: &[u8]) -> Result<bool> {
        let (first, last) = match (word.first(), word.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Ok(true),
        };
        let glued = |ch: u8| is_numeric(ch) || is_regular(ch);
        if !is_delimiter(last) && !is_whitespace(last) {
            if let Some(ch) = self.byte_at(start + word.len())? {
                if glued(ch) {
                    return Ok(false);
                }
            }
        }
        if !is_delimiter(first) && !is_whitespace(first) && start > 0 {
            if let Some(ch) = self.byte_at(start - 1)? {
                if glued(ch) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Position of the next whole-word occurrence of `word`. The cursor is not moved.
    pub fn find_word_pos(&mut self, word: &[u8]) -> Result<Option<usize>> {
        let saved = self.pos;
        let result = self.find_word_pos_inner(word);
        self.pos = saved;
        result
    }

    fn find_word_pos_inner(&mut self, word: &[u8]) -> Result<Option<usize>> {
        loop {
            let search_start = self.pos;
            let found = match self.find_tag(word)? {
                Some(offset) => search_start + offset,
                None => return Ok(None),
            };
            if self.is_whole_word(found, word)? {
                return Ok(Some(found));
            }
            self.pos = found + 1;
        }
    }

    /// Searches backwards from the cursor, at most `limit` bytes, for a whole-word
    /// occurrence of `word`. On success the cursor is placed at its start.
    pub fn backwards_search_to_word(&mut self, word: &[u8], limit: usize) -> Result<bool> {
        if word.is_empty() || word.len() > self.file_len {
            return Ok(false);
        }
        let highest = self.pos.min(self.file_len - word.len());
        let lowest = self.pos.saturating_sub(limit);
        let mut start = highest + 1;
        while start > lowest {
            start -= 1;
            let mut matches = true;
            for (i, &expected) in word.iter().enumerate().rev() {
                if self.byte_at_backward(start + i)? != Some(expected) {
                    matches = false;
                    break;
                }
            }
            if matches && self.is_whole_word(start, word)? {
                self.pos = start;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// For debugging: the text around the cursor.
    pub fn ctx(&mut self) -> String {
        let start = self.pos.saturating_sub(20);
        let end = (self.pos + 20).min(self.file_len);
        let offset = self.header_offset;
        match self.backend.read(offset + start .. offset + end) {
            Ok(data) => String::from_utf8_lossy(data).into_owned(),
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_across_small_windows() {
        let data: &[u8] = b"%comment\n/Name#20x 12 -3.5 <<>> (str) R";
        let options = ParseOptions::default().with_window_size(3);
        let mut p = SyntaxParser::new(&data, options);
        let mut words = vec![];
        loop {
            let (word, is_number) = p.next_word().unwrap();
            if word.is_empty() {
                break;
            }
            words.push((String::from_utf8(word).unwrap(), is_number));
        }
        let expected = [
            ("/Name#20x", false), ("12", true), ("-3.5", true), ("<<", false), (">>", false),
            ("(", false), ("str", false), (")", false), ("R", false),
        ];
        let expected: Vec<(String, bool)> = expected.iter().map(|&(w, n)| (w.to_string(), n)).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn cursor_helpers() {
        let data: &[u8] = b"abc\r\ndef endstream x endstreamy endobj";
        let mut p = SyntaxParser::new(&data, ParseOptions::default());
        p.to_next_line().unwrap();
        assert_eq!(p.pos(), 5);
        assert_eq!(p.peek_next_word().unwrap().0, b"def");
        assert_eq!(p.pos(), 5);
        assert_eq!(p.find_word_pos(b"endstream").unwrap(), Some(9));
        assert_eq!(p.find_word_pos(b"endobj").unwrap(), Some(32));
        assert_eq!(p.pos(), 5);

        p.set_pos(9);
        assert_eq!(p.read_block(9).unwrap().unwrap(), b"endstream");
        assert_eq!(p.read_block(1000).unwrap(), None);

        // "endstreamy" is not a whole word
        p.set_pos(21);
        assert_eq!(p.find_word_pos(b"endstream").unwrap(), None);

        p.set_pos(data.len());
        assert!(p.backwards_search_to_word(b"endstream", 100).unwrap());
        assert_eq!(p.pos(), 9);
    }

    #[test]
    fn find_tag_moves_behind() {
        let data: &[u8] = b"xxtrtrailer 1";
        let mut p = SyntaxParser::new(&data, ParseOptions::default());
        assert_eq!(p.find_tag(b"trailer").unwrap(), Some(4));
        assert_eq!(p.pos(), 11);
        assert_eq!(p.direct_num().unwrap(), 1);
        assert_eq!(p.find_tag(b"trailer").unwrap(), None);
    }

    #[test]
    fn header_offset_shifts_positions() {
        let data: &[u8] = b"junk%PDF-1.4 obj";
        let mut p = SyntaxParser::with_header_offset(&data, 4, ParseOptions::default());
        assert_eq!(p.file_len(), 12);
        // the header is a comment
        assert!(p.keyword().unwrap().is_empty());
        p.set_pos(9);
        assert_eq!(p.keyword().unwrap(), b"obj");
    }

    #[test]
    fn eol_markers() {
        let data: &[u8] = b"a\r\nb\rc\nd";
        let mut p = SyntaxParser::new(&data, ParseOptions::default());
        assert_eq!(p.read_eol_markers(1).unwrap(), 2);
        assert_eq!(p.read_eol_markers(4).unwrap(), 1);
        assert_eq!(p.read_eol_markers(6).unwrap(), 1);
        assert_eq!(p.read_eol_markers(0).unwrap(), 0);
    }
}
