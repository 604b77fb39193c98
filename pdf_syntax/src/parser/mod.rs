//! Basic functionality for parsing a PDF file.

pub mod lexer;
mod syntax;
mod parse_object;

pub use self::lexer::{Lexer, Substr};
pub use self::syntax::SyntaxParser;

use crate::error::*;
use crate::options::ParseOptions;
use crate::primitive::Primitive;
use crate::object::PlainRef;

/// Parses one value from `data` with the default options.
pub fn parse(data: &[u8]) -> Result<Option<Primitive>> {
    parse_with_options(data, ParseOptions::default())
}

pub fn parse_with_options(data: &[u8], options: ParseOptions) -> Result<Option<Primitive>> {
    SyntaxParser::new(&data, options).get_object()
}

/// Parses `num gen obj ... endobj` from the start of `data`.
pub fn parse_indirect_object(data: &[u8]) -> Result<Option<(PlainRef, Primitive)>> {
    SyntaxParser::new(&data, ParseOptions::default()).get_indirect_object()
}
