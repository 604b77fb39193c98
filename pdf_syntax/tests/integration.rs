use std::fs;

use glob::glob;
use pdf_syntax::content::Content;
use pdf_syntax::file::{storage_with_offsets, Storage};
use pdf_syntax::object::*;
use pdf_syntax::parser::SyntaxParser;
use pdf_syntax::primitive::Primitive;
use pdf_syntax::ParseOptions;

macro_rules! file_path {
    ( $subdir:expr ) => { concat!("tests/files/", $subdir) }
}

/// Offsets of all `num gen obj` lines. Good enough for the small fixtures.
fn object_offsets(data: &Vec<u8>) -> Vec<(ObjNr, usize)> {
    let mut parser = SyntaxParser::new(data, ParseOptions::default());
    let line_starts = std::iter::once(0)
        .chain(data.iter().enumerate().filter(|&(_, &b)| b == b'\n').map(|(i, _)| i + 1));
    let mut offsets = vec![];
    for pos in line_starts {
        if let Ok(Some((r, _))) = parser.parse_indirect_object_at(pos, None) {
            offsets.push((r.id, pos));
        }
    }
    offsets
}

fn open(path: &str) -> Storage<Vec<u8>> {
    let data = fs::read(path).unwrap();
    let offsets = object_offsets(&data);
    storage_with_offsets(data, offsets, ParseOptions::default()).unwrap()
}

fn get(storage: &Storage<Vec<u8>>, num: ObjNr) -> Primitive {
    (*storage.get_or_parse_indirect_object(num).unwrap().unwrap()).clone()
}

#[test]
fn read_fixtures() {
    for entry in glob("tests/files/*.pdf").expect("Failed to read glob pattern") {
        let path = entry.unwrap();
        println!("\n == Now testing `{}` ==", path.display());
        let storage = open(path.to_str().unwrap());

        let reachable = storage.reachable_from(1).unwrap();
        assert!(reachable.len() > 1);
        for num in storage.object_numbers() {
            let value = get(&storage, num);
            let nodes = ObjectWalker::new(&value).count();
            assert!(nodes >= 1);
        }
        assert!(storage.heap_size() > 0);
    }
}

#[test]
fn page_content() {
    let storage = open(file_path!("hello.pdf"));
    let page = get(&storage, 3);
    let page = page.as_dictionary().unwrap();
    assert_eq!(page.get_name_for("Type").unwrap(), "Page");

    let fonts = page.get_dictionary_for("Resources").unwrap().get_dictionary_for("Font").unwrap();
    let font = fonts.get_direct_for("F1", &storage).unwrap();
    assert_eq!(font.as_dictionary().unwrap().get_name_for("BaseFont").unwrap(), "Helvetica");

    let content = Content::from_primitive(&page["Contents"], &storage, ParseOptions::default()).unwrap();
    let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
    assert_eq!(ops, ["BT", "Tf", "Td", "Tj", "ET", "q", "cm", "BI", "Q"]);

    let text = content.operations[3].operands[0].as_string().unwrap();
    assert_eq!(text.to_string_lossy(), "Hello, world");
    let image = content.operations[7].inline_image().unwrap();
    assert_eq!(image.data(), b"abcd");
}

#[test]
fn recovered_stream_length() {
    let storage = open(file_path!("hello.pdf"));
    // /Length is indirect, so the end is found by searching
    let stream = get(&storage, 5).into_stream().unwrap();
    assert!(stream.data().starts_with(b"q 2 0 0"));
    assert!(stream.data().ends_with(b"EI Q"));
}

#[test]
fn cycles() {
    let storage = open(file_path!("cycle.pdf"));
    let mut reachable = storage.reachable_from(1).unwrap();
    reachable.sort();
    assert_eq!(reachable, [1, 2, 3, 4, 9]);

    let copy = storage.clone_indirect_object(1, true).unwrap().unwrap();
    let catalog = copy.as_dictionary().unwrap();
    assert!(!catalog.contains_key("Self"));
    let kids = catalog.get_dictionary_for("Pages").unwrap().get_array_for("Kids").unwrap();
    assert_eq!(kids.len(), 2);
    let page = kids[0].as_dictionary().unwrap();
    assert!(!page.contains_key("Parent"));
    assert!(page.get_array_for("Annots").unwrap().is_empty());

    let content = Content::from_primitive(&Primitive::Reference(PlainRef::new(4, 0)), &storage, ParseOptions::default()).unwrap();
    assert_eq!(content.operations.len(), 1);
    assert_eq!(content.operations[0].operator, "re");
}

#[test]
fn content_roundtrip() {
    for entry in glob("tests/files/*.content").expect("Failed to read glob pattern") {
        let path = entry.unwrap();
        let data = fs::read(&path).unwrap();
        let content = Content::parse(&data, ParseOptions::default());
        assert!(!content.operations.is_empty(), "{}", path.display());

        let written = content.to_bytes().unwrap();
        assert_eq!(Content::parse(&written, ParseOptions::default()), content, "{}", path.display());
    }
}

#[test]
fn inline_images() {
    let data = fs::read(file_path!("images.content")).unwrap();
    let content = Content::parse(&data, ParseOptions::default());
    let images: Vec<_> = content.operations.iter().filter_map(|op| op.inline_image()).collect();
    assert_eq!(images.len(), 2);

    assert_eq!(images[0].info.get_name_for("ColorSpace").unwrap(), "DeviceRGB");
    assert_eq!(images[0].decoded().unwrap().len(), 12);

    assert_eq!(images[1].info["ImageMask"], Primitive::Boolean(true));
    assert_eq!(images[1].data(), b"\xff\x00");
    assert_eq!(content.operations.last().unwrap().operator, "Q");
}
