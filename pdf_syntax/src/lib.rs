//! Low-level PDF: objects, the syntax of documents and content streams, and
//! the stream filters needed to find where inline data ends.

#[macro_use] extern crate snafu;
#[macro_use] extern crate log;

#[macro_use]
pub mod error;
pub mod options;
pub mod primitive;
pub mod object;
pub mod backend;
pub mod parser;
pub mod enc;
pub mod encoding;
pub mod content;
pub mod file;

pub use crate::error::PdfError;
pub use crate::options::{ParseOptions, ParseType};
