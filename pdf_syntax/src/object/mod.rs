//! References, the indirect object table and graph traversal.

mod table;
mod walker;

pub use self::table::*;
pub use self::walker::*;

use crate::primitive::*;
use crate::error::*;

use std::fmt;
use datasize::DataSize;

pub type ObjNr = u64;
pub type GenNr = u16;

/// Looks up indirect objects by reference.
pub trait Resolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive>;
}

/// Resolves nothing.
pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        Err(PdfError::NullRef { obj_nr: r.id })
    }
}

impl<R: Resolve + ?Sized> Resolve for &R {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        (**self).resolve(r)
    }
}

/// An object number and generation, as written in `12 0 R`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, DataSize)]
pub struct PlainRef {
    pub id:     ObjNr,
    pub gen:    GenNr,
}
impl PlainRef {
    pub fn new(id: ObjNr, gen: GenNr) -> PlainRef {
        PlainRef { id, gen }
    }
}
impl fmt::Debug for PlainRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}
