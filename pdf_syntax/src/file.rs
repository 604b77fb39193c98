//! Objects of a document whose offsets are already known.
use std::collections::HashMap;

use crate::error::*;
use crate::backend::Backend;
use crate::object::*;
use crate::options::ParseOptions;
use crate::parser::SyntaxParser;
use crate::primitive::Primitive;

/// Parses indirect objects from a backend at known byte offsets.
///
/// Offsets are relative to the `%PDF-` header, as in a cross-reference table.
/// Finding the offsets is up to the caller.
pub struct OffsetSource<B: Backend> {
    backend: B,
    header_offset: usize,
    offsets: HashMap<ObjNr, usize>,
    options: ParseOptions,
}

impl<B: Backend> OffsetSource<B> {
    /// Locates the header in `backend`. Without one, offsets count from the first byte.
    pub fn new(backend: B, options: ParseOptions) -> Result<Self> {
        let header_offset = match backend.locate_start_offset() {
            Ok(offset) => offset,
            Err(e) if e.is_data_unavailable() => return Err(e),
            Err(e) => {
                debug!("{}, using offset 0", e);
                0
            }
        };
        Ok(OffsetSource::with_header_offset(backend, header_offset, options))
    }

    pub fn with_header_offset(backend: B, header_offset: usize, options: ParseOptions) -> Self {
        OffsetSource {
            backend,
            header_offset,
            offsets: HashMap::new(),
            options,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// Object `num` starts at `pos`. Returns the previous offset.
    pub fn insert_offset(&mut self, num: ObjNr, pos: usize) -> Option<usize> {
        self.offsets.insert(num, pos)
    }
    pub fn offset(&self, num: ObjNr) -> Option<usize> {
        self.offsets.get(&num).copied()
    }
    pub fn remove_offset(&mut self, num: ObjNr) -> Option<usize> {
        self.offsets.remove(&num)
    }
}

impl<B: Backend> ObjectSource for OffsetSource<B> {
    fn parse_indirect_object(&self, num: ObjNr, _resolver: &dyn Resolve) -> Result<Option<(GenNr, Primitive)>> {
        let pos = match self.offset(num) {
            Some(pos) => pos,
            None => return Ok(None),
        };
        let mut parser = SyntaxParser::with_header_offset(&self.backend, self.header_offset, self.options);
        let parsed = parser.parse_indirect_object_at(pos, Some(num))?;
        if parsed.is_none() {
            debug!("no object {} at offset {}", num, pos);
        }
        Ok(parsed.map(|(r, value)| (r.gen, value)))
    }

    fn last_obj_num(&self) -> ObjNr {
        self.offsets.keys().max().copied().unwrap_or(0)
    }
}

/// An object table backed by a document.
pub type Storage<B> = IndirectObjects<OffsetSource<B>>;

/// Builds a table for `backend` from `(object number, offset)` pairs.
pub fn storage_with_offsets<B: Backend>(backend: B, offsets: impl IntoIterator<Item=(ObjNr, usize)>, options: ParseOptions) -> Result<Storage<B>> {
    let mut source = OffsetSource::new(backend, options)?;
    for (num, pos) in offsets {
        source.insert_offset(num, pos);
    }
    Ok(IndirectObjects::with_source(source))
}
