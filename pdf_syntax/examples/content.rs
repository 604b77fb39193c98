use std::env::args;
use std::fs;

use pdf_syntax::content::Content;
use pdf_syntax::error::PdfError;
use pdf_syntax::ParseOptions;

/// Prints the operations of a decoded content stream.
fn main() -> Result<(), PdfError> {
    let path = args().nth(1).expect("no file given");
    let data = fs::read(&path)?;

    let content = Content::parse(&data, ParseOptions::default());
    print!("{}", content);

    let images = content.operations.iter().filter_map(|op| op.inline_image()).count();
    println!("{} operations, {} inline images", content.operations.len(), images);
    Ok(())
}
