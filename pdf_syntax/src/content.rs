//! PDF content streams.
use std::fmt::{Display, Formatter};
use std::mem::take;
use std::io;
use itertools::Itertools;

use crate::error::*;
use crate::object::Resolve;
use crate::options::ParseOptions;
use crate::parser::{Lexer, Substr};
use crate::parser::lexer::{is_delimiter, is_whitespace, parse_number};
use crate::primitive::*;
use crate::enc;

/// One item of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    EndOfData,
    Number(Primitive),
    Name(Name),
    /// Any other bare word, usually an operator.
    Keyword(Substr<'a>),
    /// Strings, arrays, dictionaries, booleans and `null`.
    /// `None` if a delimiter did not start a valid value.
    Other(Option<Primitive>),
}

/// Tokenizer for content streams and inline image data.
///
/// Works on a buffer that is fully in memory and never fails; malformed
/// input shows up as `Element::Other(None)` or missing values.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    options: ParseOptions,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8], options: ParseOptions) -> ContentParser<'a> {
        ContentParser {
            lexer: Lexer::new(data),
            options,
        }
    }

    pub fn get_pos(&self) -> usize {
        self.lexer.get_pos()
    }
    pub fn set_pos(&mut self, pos: usize) {
        self.lexer.set_pos(pos)
    }

    pub fn parse_next_element(&mut self) -> Element<'a> {
        if !self.lexer.skip_whitespace_and_comments() {
            return Element::EndOfData;
        }
        match self.lexer.peek_byte() {
            Some(b) if is_delimiter(b) && b != b'/' => {
                return Element::Other(self.read_next_object(false, false, 0));
            }
            None => return Element::EndOfData,
            _ => {}
        }

        let (word, is_number) = self.lexer.next_word();
        if is_number {
            return Element::Number(parse_number(&word));
        }
        if word.first() == Some(&b'/') {
            return Element::Name(Name::decode(&word[1..]));
        }
        match word.as_slice() {
            b"true" => Element::Other(Some(Primitive::Boolean(true))),
            b"false" => Element::Other(Some(Primitive::Boolean(false))),
            b"null" => Element::Other(Some(Primitive::Null)),
            _ => Element::Keyword(word),
        }
    }

    /// Reads one value.
    ///
    /// Arrays directly inside arrays are only accepted with `allow_nested_array`;
    /// values nested deeper than `content_max_depth` yield `None`.
    pub fn read_next_object(&mut self, allow_nested_array: bool, in_array: bool, depth: usize) -> Option<Primitive> {
        let (word, is_number) = self.lexer.next_word();
        if word.is_empty() || depth > self.options.content_max_depth {
            return None;
        }
        if is_number {
            return Some(parse_number(&word));
        }
        match word[0] {
            b'/' => Some(Primitive::Name(Name::decode(&word[1..]))),
            b'(' => {
                let data = self.lexer.read_string(self.options.max_string_len);
                Some(Primitive::String(PdfString::new(data.into())))
            }
            b'<' if word.len() == 1 => {
                let data = self.lexer.read_hex_string(self.options.max_string_len);
                Some(Primitive::String(PdfString::new_hex(data.into())))
            }
            b'<' => {
                let mut dict = Dictionary::new();
                loop {
                    let (key, _) = self.lexer.next_word();
                    if key.as_slice() == b">>" {
                        break;
                    }
                    if key.first() != Some(&b'/') {
                        trace!("content dictionary ended by {:?}", key.to_string());
                        return None;
                    }
                    let value = self.read_next_object(true, in_array, depth + 1)?;
                    dict.insert(Name::decode(&key[1..]), value);
                }
                Some(Primitive::Dictionary(dict))
            }
            b'[' => {
                if !allow_nested_array && in_array {
                    return None;
                }
                let mut array = Array::new();
                loop {
                    let (next, _) = self.lexer.peek_word();
                    if next.is_empty() || next[0] == b']' {
                        self.lexer.next_word();
                        break;
                    }
                    if let Some(value) = self.read_next_object(allow_nested_array, true, depth + 1) {
                        array.push(value);
                    }
                }
                Some(Primitive::Array(array))
            }
            _ => match word.as_slice() {
                b"true" => Some(Primitive::Boolean(true)),
                b"false" => Some(Primitive::Boolean(false)),
                b"null" => Some(Primitive::Null),
                _ => None
            }
        }
    }

    /// Reads the data of an inline image. The cursor has to be right behind `ID`.
    ///
    /// `dict` must use full key names. Without a filter the size follows from the image
    /// geometry; with one, the filter tells how much it consumed and the data is
    /// extended up to the next `EI`. Sets `/Length` and leaves the cursor behind the data.
    pub fn read_inline_stream(&mut self, mut dict: Dictionary, color_space: Option<&Primitive>) -> Option<PdfStream> {
        if self.lexer.peek_byte().map_or(false, is_whitespace) {
            self.lexer.next_byte();
        }
        let start = self.lexer.get_pos();
        let data = self.lexer.get_remaining_slice();
        if data.is_empty() {
            return None;
        }

        let (filter, params) = match dict.get("Filter") {
            Some(Primitive::Array(filters)) => (
                filters.first().and_then(|f| f.as_name().ok()).cloned(),
                dict.get_array_for("DecodeParms")
                    .and_then(|p| p.first())
                    .and_then(|p| p.as_dictionary().ok())
                    .cloned(),
            ),
            Some(filter) => (
                filter.as_name().ok().cloned(),
                dict.get_dictionary_for("DecodeParms").cloned(),
            ),
            None => (None, None),
        };

        let width = dict.get_integer_for("Width") as u32;
        let height = dict.get_integer_for("Height") as u32;
        let (bpc, components) = match color_space {
            Some(cs) => (dict.get_integer_for("BitsPerComponent") as u32, color_components(cs)),
            None => (1, 1),
        };
        let pitch = bpc.checked_mul(components)?.checked_mul(width)?.checked_add(7)? / 8;
        let size = pitch.checked_mul(height)? as usize;

        let len = match filter {
            None => size.min(data.len()),
            Some(filter) => {
                let consumed = enc::inline_data_len(data, &filter, params.as_ref(), width, height, self.options.max_stream_size)?;
                if consumed > i32::MAX as usize {
                    return None;
                }
                // filters do not always stop exactly at the end; everything up to `EI` belongs to the image
                let mut len = consumed;
                self.lexer.set_pos(start + consumed);
                loop {
                    let prev = self.lexer.get_pos();
                    match self.parse_next_element() {
                        Element::EndOfData => {
                            debug!("inline image data at {} is not terminated by EI", start);
                            self.lexer.set_pos(start);
                            return None;
                        }
                        Element::Keyword(word) if word == "EI" => break,
                        _ => len += self.lexer.get_pos() - prev,
                    }
                }
                len
            }
        };

        self.lexer.set_pos(start + len);
        dict.insert("Length", len as i32);
        Some(PdfStream::from_parts(dict, &data[.. len]))
    }

    /// Parses `BI <dict> ID <data> EI`, the cursor being behind `BI`.
    ///
    /// If the dictionary is not followed by `ID`, the cursor is put back and `None`
    /// is returned. Otherwise everything up to `EI` is consumed, even if the data
    /// turns out to be unreadable.
    pub fn read_inline_image(&mut self) -> Option<PdfStream> {
        let save = self.lexer.get_pos();
        let mut dict = Dictionary::new();
        loop {
            match self.parse_next_element() {
                Element::Keyword(word) if word == "ID" => break,
                Element::Keyword(word) => {
                    debug!("inline image dictionary ended by {:?}", word.to_string());
                    self.lexer.set_pos(save);
                    return None;
                }
                Element::Name(key) => {
                    let value = self.read_next_object(false, false, 0);
                    match value {
                        Some(value) if !key.is_empty() => {
                            dict.insert(key, value);
                        }
                        _ => {}
                    }
                }
                _ => break,
            }
        }
        let mut dict = expand_abbreviations(dict);
        dict.insert("Subtype", Primitive::name("Image"));
        let color_space = dict.get("ColorSpace").cloned();
        let stream = self.read_inline_stream(dict, color_space.as_ref());

        loop {
            match self.parse_next_element() {
                Element::EndOfData => break,
                Element::Keyword(word) if word == "EI" => break,
                _ => {}
            }
        }
        stream
    }
}

fn full_key_name(key: &[u8]) -> Option<&'static str> {
    Some(match key {
        b"BPC" => "BitsPerComponent",
        b"CS" => "ColorSpace",
        b"D" => "Decode",
        b"DP" => "DecodeParms",
        b"F" => "Filter",
        b"H" => "Height",
        b"IM" => "ImageMask",
        b"I" => "Interpolate",
        b"W" => "Width",
        _ => return None
    })
}

fn full_value_name(value: &[u8]) -> Option<&'static str> {
    Some(match value {
        b"G" => "DeviceGray",
        b"RGB" => "DeviceRGB",
        b"CMYK" => "DeviceCMYK",
        b"I" => "Indexed",
        b"AHx" | b"A85" | b"LZW" | b"Fl" | b"RL" | b"CCF" | b"DCT" => enc::full_filter_name(value)?,
        _ => return None
    })
}

fn expand_value(value: Primitive) -> Primitive {
    match value {
        Primitive::Name(name) => match full_value_name(&name) {
            Some(full) => Primitive::name(full),
            None => Primitive::Name(name),
        },
        Primitive::Dictionary(dict) => Primitive::Dictionary(expand_abbreviations(dict)),
        Primitive::Array(array) => Primitive::Array(array.into_iter().map(expand_value).collect()),
        p => p
    }
}

/// Replaces the abbreviated keys and values of inline image dictionaries, recursively.
pub fn expand_abbreviations(dict: Dictionary) -> Dictionary {
    dict.into_iter()
        .map(|(key, value)| {
            let key = match full_key_name(&key) {
                Some(full) => Name::from(full),
                None => key,
            };
            (key, expand_value(value))
        })
        .collect()
}

/// Number of color components of a color space, 3 if unknown.
fn color_components(cs: &Primitive) -> u32 {
    let (family, array) = match cs {
        Primitive::Name(name) => (name, None),
        Primitive::Array(array) => match array.first() {
            Some(Primitive::Name(name)) => (name, Some(array)),
            _ => return 3,
        },
        _ => return 3,
    };
    match family.as_bytes() {
        b"DeviceGray" | b"CalGray" | b"Indexed" | b"Separation" | b"Pattern" => 1,
        b"DeviceCMYK" => 4,
        b"ICCBased" => array
            .and_then(|a| a.get(1))
            .and_then(|p| p.as_stream().ok())
            .map(|s| s.info.get_integer_for("N"))
            .filter(|&n| n > 0)
            .map_or(3, |n| n as u32),
        b"DeviceN" => array
            .and_then(|a| a.get(1))
            .and_then(|p| p.as_array().ok())
            .map(|names| names.len() as u32)
            .filter(|&n| n > 0)
            .unwrap_or(3),
        _ => 3
    }
}

/// Operation in a PDF content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Primitive>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Primitive>) -> Operation {
        Operation{
            operator: operator.into(),
            operands,
        }
    }

    /// For `BI`: the inline image.
    pub fn inline_image(&self) -> Option<&PdfStream> {
        match (self.operator.as_str(), self.operands.as_slice()) {
            ("BI", [Primitive::Stream(image)]) => Some(image),
            _ => None
        }
    }
}

/// Represents a PDF content stream - a `Vec` of `Operator`s
///
/// Inline images become a single `BI` operation with the image stream as operand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Content {
    pub operations: Vec<Operation>,
}

impl Content {
    pub fn parse(data: &[u8], options: ParseOptions) -> Content {
        let mut parser = ContentParser::new(data, options);
        let mut content = Content::default();
        let mut operands = Vec::new();

        loop {
            match parser.parse_next_element() {
                Element::EndOfData => break,
                Element::Number(n) => operands.push(n),
                Element::Name(name) => operands.push(Primitive::Name(name)),
                Element::Other(Some(p)) => operands.push(p),
                Element::Other(None) => {}
                Element::Keyword(word) if word == "BI" => {
                    if !operands.is_empty() {
                        debug!("dropping {} operands before BI", operands.len());
                        operands.clear();
                    }
                    let operands = parser.read_inline_image()
                        .map(|image| vec![Primitive::Stream(image)])
                        .unwrap_or_default();
                    content.operations.push(Operation::new("BI", operands));
                }
                Element::Keyword(word) => {
                    content.operations.push(Operation::new(word.to_string(), take(&mut operands)));
                }
            }
        }
        if !operands.is_empty() {
            debug!("{} operands at the end of the content stream", operands.len());
        }
        content
    }

    /// Content of a page: one stream, or an array of streams that is read as if concatenated.
    pub fn from_primitive(p: &Primitive, resolve: &impl Resolve, options: ParseOptions) -> Result<Content> {
        let mut data = Vec::new();
        match p.clone().resolve(resolve)? {
            Primitive::Array(parts) => {
                for part in parts {
                    let stream = part.resolve(resolve)?.into_stream()?;
                    data.extend_from_slice(&stream.decoded()?);
                    // parts may split in the middle of an operation, but never inside a token
                    data.push(b'\n');
                }
            }
            p => data.extend_from_slice(&p.into_stream()?.decoded()?),
        }
        Ok(Content::parse(&data, options))
    }

    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        for op in &self.operations {
            if let Some(image) = op.inline_image() {
                write_inline_image(out, image)?;
                continue;
            }
            for arg in &op.operands {
                arg.serialize(out)?;
                out.write_all(b" ")?;
            }
            writeln!(out, "{}", op.operator)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.serialize(&mut data)?;
        Ok(data)
    }
}

fn write_inline_image(out: &mut impl io::Write, image: &PdfStream) -> Result<()> {
    writeln!(out, "BI")?;
    for (key, value) in image.info.iter() {
        if key == "Length" || key == "Subtype" {
            continue;
        }
        key.serialize(out)?;
        out.write_all(b" ")?;
        value.serialize(out)?;
        out.write_all(b"\n")?;
    }
    out.write_all(b"ID ")?;
    out.write_all(image.data())?;
    out.write_all(b"\nEI\n")?;
    Ok(())
}

impl Display for Content {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        writeln!(f, "Content:")?;
        for operation in &self.operations {
            writeln!(f, "  {}", operation)?;
        }
        Ok(())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} : {}", self.operator, self.operands.iter().format(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;

    fn parse(data: &[u8]) -> Content {
        Content::parse(data, ParseOptions::default())
    }

    #[test]
    fn elements() {
        let data = b"/Name 12 -3.5 (str) [1 /A] << /K 1 >> true foo %comment\n";
        let mut parser = ContentParser::new(data, ParseOptions::default());
        assert_eq!(parser.parse_next_element(), Element::Name("Name".into()));
        assert_eq!(parser.parse_next_element(), Element::Number(Primitive::Integer(12)));
        assert_eq!(parser.parse_next_element(), Element::Number(Primitive::Number(-3.5)));
        assert_eq!(parser.parse_next_element(), Element::Other(Some(PdfString::from("str").into())));
        assert_eq!(parser.parse_next_element(), Element::Other(Some(Primitive::from(vec![Primitive::Integer(1), Primitive::name("A")]))));

        let mut dict = Dictionary::new();
        dict.insert("K", 1);
        assert_eq!(parser.parse_next_element(), Element::Other(Some(dict.into())));
        assert_eq!(parser.parse_next_element(), Element::Other(Some(Primitive::Boolean(true))));
        match parser.parse_next_element() {
            Element::Keyword(word) => assert_eq!(word, "foo"),
            e => panic!("unexpected {:?}", e),
        }
        assert_eq!(parser.parse_next_element(), Element::EndOfData);
    }

    #[test]
    fn operations() {
        let content = parse(b"q 1 0 0 1 10 20 cm /F1 12 Tf (Hi) Tj [(A) -120 (B)] TJ Q");
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops, ["q", "cm", "Tf", "Tj", "TJ", "Q"]);
        assert_eq!(content.operations[1].operands.len(), 6);
        assert_eq!(content.operations[2].operands, [Primitive::name("F1"), Primitive::Integer(12)]);
        assert_eq!(content.operations[4].operands[0].as_array().unwrap().len(), 3);
    }

    #[test]
    fn nested_arrays() {
        // arrays do not nest at the top level of a content stream
        let mut parser = ContentParser::new(b"[[1] 2]", ParseOptions::default());
        assert_eq!(parser.parse_next_element(), Element::Other(Some(Primitive::from(vec![Primitive::Integer(1)]))));
        assert_eq!(parser.parse_next_element(), Element::Number(2.into()));
        assert_eq!(parser.parse_next_element(), Element::Other(None));

        // but inside dictionaries they do
        let mut parser = ContentParser::new(b"<< /A [[1] 2] >>", ParseOptions::default());
        let inner = Primitive::from(vec![Primitive::from(vec![Primitive::Integer(1)]), Primitive::Integer(2)]);
        let mut dict = Dictionary::new();
        dict.insert("A", inner);
        assert_eq!(parser.parse_next_element(), Element::Other(Some(dict.into())));
    }

    #[test]
    fn depth_is_bounded() {
        let mut data = Vec::new();
        for _ in 0 .. 2000 {
            data.extend_from_slice(b"<</A ");
        }
        let mut parser = ContentParser::new(&data, ParseOptions::default());
        assert_eq!(parser.parse_next_element(), Element::Other(None));
    }

    #[test]
    fn long_strings_are_truncated() {
        let mut data = b"(".to_vec();
        data.resize(40001, b'a');
        data.extend_from_slice(b") Tj");
        let content = parse(&data);
        assert_eq!(content.operations.len(), 1);
        let s = content.operations[0].operands[0].as_string().unwrap();
        assert_eq!(s.as_bytes().len(), ParseOptions::DEFAULT_MAX_STRING_LEN);
    }

    #[test]
    fn inline_image_without_filter() {
        let content = parse(b"q BI /W 2 /H 2 /BPC 8 /CS /G ID \x01\x02EI\x04 EI Q");
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops, ["q", "BI", "Q"]);

        let image = content.operations[1].inline_image().unwrap();
        assert_eq!(image.data(), b"\x01\x02EI");
        assert_eq!(image.info.get_integer_for("Width"), 2);
        assert_eq!(image.info.get_integer_for("BitsPerComponent"), 8);
        assert_eq!(image.info.get_integer_for("Length"), 4);
        assert_eq!(image.info.get_name_for("ColorSpace").unwrap(), "DeviceGray");
        assert_eq!(image.info.get_name_for("Subtype").unwrap(), "Image");
    }

    #[test]
    fn inline_image_with_filter() {
        let content = parse(b"BI /W 3 /H 1 /F /AHx ID 414243> EI");
        let image = content.operations[0].inline_image().unwrap();
        assert_eq!(image.data(), b"414243>");
        assert_eq!(image.info.get_name_for("Filter").unwrap(), "ASCIIHexDecode");
        assert_eq!(&*image.decoded().unwrap(), b"ABC");

        // the filter stops early; the rest up to EI is kept
        let content = parse(b"BI /W 3 /H 1 /F /AHx ID 41> junk EI Q");
        let image = content.operations[0].inline_image().unwrap();
        assert_eq!(image.data(), b"41> junk");
        assert_eq!(content.operations[1].operator, "Q");
    }

    #[test]
    fn inline_image_flate() {
        let pixels = b"\x10\x20\x30\x40\x50\x60\x70\x80\x90\xa0\xb0\xc0";
        let mut data = b"BI /W 4 /H 1 /CS /RGB /BPC 8 /F [/Fl] ID ".to_vec();
        data.extend_from_slice(&enc::encode(pixels, &enc::StreamFilter::FlateDecode(Default::default())).unwrap());
        data.extend_from_slice(b"\nEI Q");

        let content = parse(&data);
        let image = content.operations[0].inline_image().unwrap();
        assert_eq!(&*image.decoded().unwrap(), &pixels[..]);
        assert_eq!(content.operations[1].operator, "Q");
    }

    #[test]
    fn unterminated_inline_image() {
        let content = parse(b"BI /F /AHx ID 41");
        assert_eq!(content.operations.len(), 1);
        assert!(content.operations[0].inline_image().is_none());

        // no ID: BI stands alone and the rest is read normally
        let content = parse(b"BI /W 1 Tf");
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops, ["BI", "Tf"]);
        assert_eq!(content.operations[1].operands.len(), 2);
    }

    #[test]
    fn abbreviations() {
        let mut params = Dictionary::new();
        params.insert("K", -1);
        let mut dict = Dictionary::new();
        dict.insert("F", Primitive::from(vec![Primitive::name("A85"), Primitive::name("CCF")]));
        dict.insert("DP", Primitive::from(vec![Primitive::Null, params.into()]));
        dict.insert("I", true);
        dict.insert("CS", Primitive::from(vec![Primitive::name("I"), Primitive::name("RGB"), 1.into()]));

        let dict = expand_abbreviations(dict);
        let keys: Vec<String> = dict.keys().map(|k| k.to_string_lossy().into_owned()).collect();
        assert_eq!(keys, ["Filter", "DecodeParms", "Interpolate", "ColorSpace"]);
        assert_eq!(dict["Filter"], Primitive::from(vec![Primitive::name("ASCII85Decode"), Primitive::name("CCITTFaxDecode")]));
        assert_eq!(dict["Interpolate"], Primitive::Boolean(true));
        assert_eq!(dict["ColorSpace"].as_array().unwrap()[1], Primitive::name("DeviceRGB"));
    }

    #[test]
    fn serialize_roundtrip() {
        let content = parse(b"q 1 0 0 1 10 20 cm /F1 12 Tf (a\\(b) Tj BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff EI Q");
        let bytes = content.to_bytes().unwrap();
        assert_eq!(parse(&bytes), content);
    }

    #[test]
    fn from_stream_array() {
        let parts: Vec<Primitive> = vec![
            PdfStream::new(Dictionary::new(), b"q 1 0 0".to_vec()).into(),
            PdfStream::new(Dictionary::new(), b"1 0 0 cm Q".to_vec()).into(),
        ];
        let content = Content::from_primitive(&Primitive::from(parts), &NoResolve, ParseOptions::default()).unwrap();
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops, ["q", "cm", "Q"]);
    }
}
