use std::env::args;
use std::fs;
use std::time::SystemTime;

use pdf_syntax::error::PdfError;
use pdf_syntax::file::storage_with_offsets;
use pdf_syntax::object::*;
use pdf_syntax::parser::SyntaxParser;
use pdf_syntax::ParseOptions;

/// Finds objects by looking for `num gen obj` at line starts and lists
/// everything reachable from the first one.
fn main() -> Result<(), PdfError> {
    let path = args().nth(1).expect("no file given");
    println!("read: {}", path);
    let now = SystemTime::now();

    let data = fs::read(&path)?;
    let header = data.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
    let mut offsets = vec![];
    {
        let mut parser = SyntaxParser::with_header_offset(&data, header, ParseOptions::default());
        let mut pos = 0;
        while pos < parser.file_len() {
            if let Some((r, _)) = parser.parse_indirect_object_at(pos, None)? {
                offsets.push((r.id, pos));
            }
            parser.set_pos(pos);
            parser.to_next_line()?;
            if parser.pos() <= pos {
                break;
            }
            pos = parser.pos();
        }
    }
    let first = match offsets.iter().map(|&(num, _)| num).min() {
        Some(num) => num,
        None => {
            println!("no objects found");
            return Ok(());
        }
    };

    let storage = storage_with_offsets(data, offsets, ParseOptions::default())?;
    for num in storage.reachable_from(first)? {
        match storage.get_or_parse_indirect_object(num)? {
            Some(value) => println!("{} {}: {}", num, storage.generation(num).unwrap_or(0), value),
            None => println!("{}: missing", num),
        }
    }

    if let Ok(elapsed) = now.elapsed() {
        println!("Time: {}s", elapsed.as_secs() as f64 + elapsed.subsec_nanos() as f64 * 1e-9);
    }
    println!("Cached objects use {} bytes", storage.heap_size());
    Ok(())
}
