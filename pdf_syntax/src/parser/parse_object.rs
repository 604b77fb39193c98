use crate::error::*;
use crate::backend::Backend;
use crate::options::ParseType;
use crate::primitive::{Primitive, Dictionary, Array, PdfStream, PdfString, Name};
use crate::object::{ObjNr, GenNr, PlainRef};
use super::lexer::{parse_number, parse_uint};
use super::SyntaxParser;

impl<'a, B: Backend> SyntaxParser<'a, B> {
    /// Parses one value at the cursor.
    ///
    /// `Ok(None)` if the input holds no valid value there. On `Err` (data not yet
    /// available) the cursor is restored, so the call can be repeated later.
    pub fn get_object(&mut self) -> Result<Option<Primitive>> {
        let saved = self.pos;
        let parse_type = self.options.parse_type;
        let result = self.get_object_body(1, parse_type);
        if result.is_err() {
            self.pos = saved;
        }
        result
    }

    fn get_object_body(&mut self, depth: usize, parse_type: ParseType) -> Result<Option<Primitive>> {
        if depth > self.options.max_depth {
            debug!("nesting too deep at {}", self.pos);
            return Ok(None);
        }
        let word_start = self.pos;
        let is_number = self.read_word()?;
        if self.word.is_empty() {
            return Ok(None);
        }

        if is_number {
            let number = self.word.clone();
            let saved = self.pos;
            if self.read_word()? {
                let gen = self.word.clone();
                self.read_word()?;
                if self.word == b"R" {
                    let id = parse_uint(&number);
                    if id == 0 {
                        return Ok(None);
                    }
                    let gen = GenNr::try_from(parse_uint(&gen)).unwrap_or(GenNr::MAX);
                    return Ok(Some(Primitive::Reference(PlainRef { id: id as ObjNr, gen })));
                }
            }
            self.pos = saved;
            return Ok(Some(parse_number(&number)));
        }

        match self.word.as_slice() {
            b"true" => Ok(Some(Primitive::Boolean(true))),
            b"false" => Ok(Some(Primitive::Boolean(false))),
            b"null" => Ok(Some(Primitive::Null)),
            b"(" => {
                let data = self.read_string()?;
                Ok(Some(Primitive::String(PdfString::new(data.into()))))
            }
            b"<" => {
                let data = self.read_hex_string()?;
                Ok(Some(Primitive::String(PdfString::new_hex(data.into()))))
            }
            b"[" => {
                let mut array = Array::new();
                // elements are always parsed leniently
                while let Some(obj) = self.get_object_body(depth + 1, ParseType::Loose)? {
                    array.push(obj);
                }
                if parse_type == ParseType::Loose || self.word.first() == Some(&b']') {
                    Ok(Some(Primitive::Array(array)))
                } else {
                    debug!("unterminated array at {}", word_start);
                    Ok(None)
                }
            }
            b"<<" => {
                let dict = match self.read_dictionary(depth, parse_type)? {
                    Some(dict) => dict,
                    None => return Ok(None),
                };
                if depth > 1 {
                    return Ok(Some(Primitive::Dictionary(dict)));
                }
                let saved = self.pos;
                self.read_word()?;
                if self.word == b"stream" {
                    return self.read_stream(dict);
                }
                self.pos = saved;
                Ok(Some(Primitive::Dictionary(dict)))
            }
            b">>" => {
                self.pos = word_start;
                Ok(None)
            }
            [b'/', name @ ..] => Ok(Some(Primitive::Name(Name::decode(name)))),
            _ => Ok(None)
        }
    }

    // the `<<` has been read
    fn read_dictionary(&mut self, depth: usize, parse_type: ParseType) -> Result<Option<Dictionary>> {
        let mut dict = Dictionary::new();
        loop {
            let key_start = self.pos;
            self.read_word()?;
            if self.word.is_empty() {
                return Ok(None);
            }
            if self.word == b">>" {
                break;
            }
            if self.word == b"endobj" {
                // unterminated dictionary
                self.pos = key_start;
                break;
            }
            if self.word[0] != b'/' {
                if parse_type == ParseType::Strict {
                    return Ok(None);
                }
                debug!("skipping dictionary key {:?}", String::from_utf8_lossy(&self.word));
                continue;
            }
            let key = Name::decode(&self.word[1..]);
            if key.is_empty() && parse_type == ParseType::Loose {
                continue;
            }
            let value = match self.get_object_body(depth + 1, ParseType::Loose)? {
                Some(value) => value,
                None if parse_type == ParseType::Loose => {
                    debug!("no value for key {}", key);
                    continue;
                }
                None => {
                    self.to_next_line()?;
                    return Ok(None);
                }
            };
            if !key.is_empty() {
                dict.insert(key, value);
            }
        }
        Ok(Some(dict))
    }

    /// Extracts the stream data following the `stream` keyword.
    fn read_stream(&mut self, dict: Dictionary) -> Result<Option<Primitive>> {
        // only a direct length can be trusted
        let mut len = match dict.get("Length") {
            Some(&Primitive::Integer(n)) => Some(n as i64),
            Some(&Primitive::Number(n)) => Some(n as i64),
            _ => None,
        }.filter(|&n| n >= 0).map(|n| n as usize);

        self.to_next_line()?;
        let start = self.pos;

        if let Some(n) = len {
            if start.checked_add(n).map_or(true, |end| end >= self.file_len) {
                len = None;
            }
        }
        if let Some(n) = len {
            self.pos = start + n;
            let markers = self.read_eol_markers(self.pos)?;
            self.pos += markers;
            self.read_word()?;
            if !self.word.starts_with(b"endstream") {
                debug!("stream at {}: /Length {} does not point to endstream", start, n);
                len = None;
                self.pos = start;
            }
        }
        let len = match len {
            Some(n) => n,
            None => {
                let end = match self.find_stream_end_pos()? {
                    Some(end) => end,
                    None => {
                        debug!("no end found for stream at {}", start);
                        return Ok(None);
                    }
                };
                debug!("stream at {}: recovered length {}", start, end - start);
                end - start
            }
        };

        let offset = self.header_offset;
        let data = self.backend.read(offset + start .. offset + start + len)?;
        let stream = PdfStream::from_parts(dict, data);
        self.pos = start + len;

        let end_stream_offset = self.pos;
        self.read_word()?;
        let markers = self.read_eol_markers(self.pos)?;
        if self.word == b"endobj" && markers != 0 {
            // leave endobj for the caller
            self.pos = end_stream_offset;
        }
        Ok(Some(Primitive::Stream(stream)))
    }

    /// The end of stream data starting at the cursor, found by searching for
    /// the first `endstream` or `endobj` and excluding the line ending before it.
    fn find_stream_end_pos(&mut self) -> Result<Option<usize>> {
        let start = self.pos;
        let end_stream = self.find_word_pos(b"endstream")?;
        let end_obj = self.find_word_pos(b"endobj")?;
        let mut end = match (end_stream, end_obj) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return Ok(None),
        };
        if end < start {
            return Ok(None);
        }
        if end >= start + 2 && self.read_eol_markers(end - 2)? == 2 {
            end -= 2;
        } else if end >= start + 1 && self.read_eol_markers(end - 1)? == 1 {
            end -= 1;
        }
        Ok(Some(end))
    }

    /// Parses `num gen obj value [endobj]` at the cursor.
    ///
    /// `Ok(None)` if there is no such object; the cursor is then restored.
    /// A missing `endobj` is tolerated.
    pub fn get_indirect_object(&mut self) -> Result<Option<(PlainRef, Primitive)>> {
        let saved = self.pos;
        let result = self.get_indirect_object_inner();
        match result {
            Ok(Some(_)) => {}
            _ => self.pos = saved,
        }
        result
    }

    fn get_indirect_object_inner(&mut self) -> Result<Option<(PlainRef, Primitive)>> {
        let (word, is_number) = self.next_word()?;
        if !is_number || word.is_empty() {
            return Ok(None);
        }
        let id = parse_uint(&word) as ObjNr;
        let (word, is_number) = self.next_word()?;
        if !is_number || word.is_empty() {
            return Ok(None);
        }
        let gen = GenNr::try_from(parse_uint(&word)).unwrap_or(GenNr::MAX);
        if self.keyword()? != b"obj" {
            return Ok(None);
        }
        let parse_type = self.options.parse_type;
        let value = match self.get_object_body(1, parse_type)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let before_end = self.pos;
        if self.keyword()? != b"endobj" {
            self.pos = before_end;
        }
        Ok(Some((PlainRef { id, gen }, value)))
    }

    /// Parses the indirect object at `pos`, which must be object `expected` if given.
    /// The cursor is left unchanged.
    pub fn parse_indirect_object_at(&mut self, pos: usize, expected: Option<ObjNr>) -> Result<Option<(PlainRef, Primitive)>> {
        let saved = self.pos;
        self.set_pos(pos);
        let result = self.get_indirect_object();
        self.pos = saved;
        match result? {
            Some((r, _)) if expected.map_or(false, |num| num != r.id) => {
                debug!("expected object {} at {}, found {}", expected.unwrap_or(0), pos, r.id);
                Ok(None)
            }
            found => Ok(found),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::ReadValidator;
    use crate::options::ParseOptions;
    use crate::primitive::*;
    use crate::object::PlainRef;
    use crate::parser::{parse, parse_with_options, parse_indirect_object, SyntaxParser};
    use crate::error::PdfError;

    fn p(data: &str) -> Primitive {
        parse(data.as_bytes()).unwrap().unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(p("null"), Primitive::Null);
        assert_eq!(p("true"), Primitive::Boolean(true));
        assert_eq!(p("  false "), Primitive::Boolean(false));
        assert_eq!(p("-12"), Primitive::Integer(-12));
        assert_eq!(p("4."), Primitive::Number(4.0));
        assert_eq!(p("/A#42C"), Primitive::name("ABC"));
        assert_eq!(p("(a\\)b)"), PdfString::from("a)b").into());
        assert_eq!(p("<41 4>"), PdfString::new_hex(b"A@".as_slice().into()).into());
    }

    #[test]
    fn serialized_values_read_back() {
        let mut inner = Dictionary::new();
        inner.insert("Z", 1);
        inner.insert("A B#", Primitive::name("x/y"));
        inner.insert("\u{e9}", PdfString::new_hex([0u8, 0xff, 0x41].as_slice().into()));
        let mut outer = Dictionary::new();
        outer.insert("Type", Primitive::name("Page"));
        outer.insert("Kids", vec![Primitive::Reference(PlainRef { id: 4, gen: 0 }), Primitive::Null]);
        outer.insert("Inner", inner);
        outer.insert("Empty", Dictionary::new());

        let values: Vec<Primitive> = vec![
            Primitive::Null,
            Primitive::Boolean(true),
            Primitive::Integer(0),
            Primitive::Integer(-7),
            Primitive::Integer(i32::MAX),
            Primitive::Integer(i32::MIN),
            Primitive::Number(1.5),
            Primitive::Number(-0.25),
            Primitive::Number(3.0),
            Primitive::Number(0.1),
            Primitive::name("A B#"),
            Primitive::name("x/y"),
            Primitive::name("\u{e9}t\u{e9}"),
            PdfString::from(&b"a(b)c\\d\n\r\x00\xff"[..]).into(),
            PdfString::from("").into(),
            PdfString::new_hex([0u8, 0xff, 0x41].as_slice().into()).into(),
            Primitive::Reference(PlainRef { id: 12, gen: 3 }),
            Primitive::from(Vec::<Primitive>::new()),
            Primitive::from(vec![
                Primitive::Integer(i32::MIN), Primitive::Number(-0.5), Primitive::from(vec![Primitive::Null])
            ]),
            outer.clone().into(),
        ];
        for value in values {
            let mut out = vec![];
            value.serialize(&mut out).unwrap();
            assert_eq!(parse(&out).unwrap(), Some(value), "{}", String::from_utf8_lossy(&out));
        }

        // key order survives
        let mut out = vec![];
        Primitive::from(outer.clone()).serialize(&mut out).unwrap();
        let read = parse(&out).unwrap().unwrap();
        let read = read.as_dictionary().unwrap();
        assert!(read.keys().eq(outer.keys()));
        let inner = read.get_dictionary_for("Inner").unwrap();
        let keys: Vec<&[u8]> = inner.keys().map(|k| k.as_bytes()).collect();
        let expected: [&[u8]; 3] = [b"Z", b"A B#", "\u{e9}".as_bytes()];
        assert_eq!(keys, expected);
    }

    #[test]
    fn references_need_lookahead() {
        assert_eq!(p("12 0 R"), Primitive::Reference(PlainRef { id: 12, gen: 0 }));
        assert_eq!(p("[1 2 R 3 4]"), Primitive::from(vec![
            Primitive::Reference(PlainRef { id: 1, gen: 2 }), 3.into(), 4.into()
        ]));
        assert_eq!(p("[1 2 3]"), Primitive::from(vec![1.into(), 2.into(), 3.into()]));
        assert_eq!(parse(b"0 0 R").unwrap(), None);
    }

    #[test]
    fn dictionaries() {
        let d = p("<</Type/Test /Kids [1 0 R] /Sub <</X 1.5>> >>");
        let d = d.as_dictionary().unwrap();
        assert_eq!(d.get_name_for("Type").unwrap(), "Test");
        assert_eq!(d.get_array_for("Kids").unwrap().len(), 1);
        assert_eq!(d.get_dictionary_for("Sub").unwrap().get_number_for("X"), 1.5);
    }

    #[test]
    fn loose_and_strict_dictionaries() {
        let data = b"<</A 1 junk /B 2 /C >> ";
        let loose = parse(data).unwrap().unwrap();
        let loose = loose.as_dictionary().unwrap();
        assert_eq!(loose.keys().map(|k| k.to_string()).collect::<Vec<_>>(), ["/A", "/B"]);

        assert_eq!(parse_with_options(data, ParseOptions::strict()).unwrap(), None);
        assert_eq!(parse_with_options(b"<</A /B /C 2>>", ParseOptions::strict()).unwrap().unwrap(),
            p("<</A/B/C 2>>"));
        // `/B` is the value of `/A`, so `2` is read as a key
        assert_eq!(parse_with_options(b"<</A /B 2>>", ParseOptions::strict()).unwrap(), None);
    }

    #[test]
    fn dictionary_closed_by_endobj() {
        let (r, obj) = parse_indirect_object(b"3 0 obj <</A 1 endobj").unwrap().unwrap();
        assert_eq!(r, PlainRef { id: 3, gen: 0 });
        assert_eq!(obj.as_dictionary().unwrap().get_integer_for("A"), 1);
    }

    #[test]
    fn stray_close_rewinds() {
        let data: &[u8] = b">> 5";
        let mut parser = SyntaxParser::new(&data, ParseOptions::default());
        assert_eq!(parser.get_object().unwrap(), None);
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn unterminated_array() {
        assert_eq!(p("[1 2"), Primitive::from(vec![1.into(), 2.into()]));
        assert_eq!(parse_with_options(b"[1 2", ParseOptions::strict()).unwrap(), None);
    }

    #[test]
    fn depth_is_bounded() {
        let data = vec![b'['; 2000];
        let value = parse(&data).unwrap().unwrap();
        let mut depth = 0;
        let mut current = &value;
        while let Primitive::Array(arr) = current {
            depth += 1;
            match arr.first() {
                Some(next) => current = next,
                None => break,
            }
        }
        assert_eq!(depth, ParseOptions::DEFAULT_MAX_DEPTH);
        assert_eq!(parse_with_options(&data, ParseOptions::strict()).unwrap(), None);
    }

    #[test]
    fn indirect_object() {
        let (r, obj) = parse_indirect_object(b"10 0 obj<</Type/Test>>endobj").unwrap().unwrap();
        assert_eq!(r, PlainRef { id: 10, gen: 0 });
        let mut expected = Dictionary::new();
        expected.insert("Type", Primitive::name("Test"));
        assert_eq!(obj, expected.into());

        assert_eq!(parse_indirect_object(b"10 0 bj 1 endobj").unwrap(), None);
    }

    #[test]
    fn indirect_object_at() {
        let data: &[u8] = b"%PDF-1.7\n1 0 obj 5 endobj\n2 1 obj (x) endobj";
        let mut parser = SyntaxParser::new(&data, ParseOptions::default());
        let (r, obj) = parser.parse_indirect_object_at(26, Some(2)).unwrap().unwrap();
        assert_eq!(r, PlainRef { id: 2, gen: 1 });
        assert_eq!(obj, PdfString::from("x").into());
        assert_eq!(parser.pos(), 0);
        assert_eq!(parser.parse_indirect_object_at(9, Some(2)).unwrap(), None);
        assert!(parser.parse_indirect_object_at(9, None).unwrap().is_some());
    }

    #[test]
    fn stream_with_correct_length() {
        let (_, obj) = parse_indirect_object(b"1 0 obj <</Length 5>>stream\r\nhello\r\nendstream\nendobj").unwrap().unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data(), b"hello");
    }

    #[test]
    fn stream_with_wrong_length() {
        let data = b"1 0 obj <</Length 2>>stream\nhello world\r\nendstream\nendobj";
        let (_, obj) = parse_indirect_object(data).unwrap().unwrap();
        assert_eq!(obj.as_stream().unwrap().data(), b"hello world");
    }

    #[test]
    fn stream_with_indirect_length() {
        let data = b"1 0 obj <</Length 8 0 R>>stream\nabc\nendobj";
        let (_, obj) = parse_indirect_object(data).unwrap().unwrap();
        assert_eq!(obj.as_stream().unwrap().data(), b"abc");
    }

    #[test]
    fn empty_stream() {
        let data = b"1 0 obj <</Length 0>>stream\n\nendstream endobj";
        let (_, obj) = parse_indirect_object(data).unwrap().unwrap();
        assert!(obj.as_stream().unwrap().data().is_empty());
    }

    #[test]
    fn stream_without_end() {
        assert_eq!(parse_indirect_object(b"1 0 obj <<>>stream\nabc").unwrap(), None);
    }

    #[test]
    fn data_unavailable_restores_cursor() {
        let data = b"1 0 obj <</A [1 2 3]>> endobj".to_vec();
        let validator = ReadValidator::new(data.clone());
        validator.add_range(0..12);
        let options = ParseOptions::default().with_window_size(4);
        let mut parser = SyntaxParser::new(&validator, options);

        let err = parser.get_indirect_object().unwrap_err();
        assert!(matches!(err, PdfError::DataUnavailable { .. }));
        assert_eq!(parser.pos(), 0);
        assert!(validator.take_missing().is_some());

        validator.add_range(12..data.len());
        let (r, obj) = parser.get_indirect_object().unwrap().unwrap();
        assert_eq!(r.id, 1);
        assert_eq!(obj.as_dictionary().unwrap().get_array_for("A").unwrap().len(), 3);
    }

    #[test]
    fn long_words_are_truncated() {
        let mut data = b"/".to_vec();
        data.extend(std::iter::repeat(b'x').take(1000));
        let name = p(std::str::from_utf8(&data).unwrap());
        assert_eq!(name.as_name().unwrap().len(), 255);
    }
}
