use crate::error::*;
use crate::primitive::Primitive;
use super::{ObjNr, GenNr, PlainRef, Resolve, collect_references};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Where the table gets objects it does not hold yet, usually the document.
pub trait ObjectSource {
    /// Parse object `num`.
    ///
    /// `Ok(None)` if there is no such object. A `DataUnavailable` error is passed
    /// on to the caller, any other error is treated like `Ok(None)`.
    /// `resolver` is the table itself and may be used to follow references while parsing.
    fn parse_indirect_object(&self, num: ObjNr, resolver: &dyn Resolve) -> Result<Option<(GenNr, Primitive)>>;

    /// The highest object number the source knows of, parsed or not.
    fn last_obj_num(&self) -> ObjNr {
        0
    }
}

/// A source without any objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSource;
impl ObjectSource for NoSource {
    fn parse_indirect_object(&self, _num: ObjNr, _resolver: &dyn Resolve) -> Result<Option<(GenNr, Primitive)>> {
        Ok(None)
    }
}

#[derive(Clone)]
struct Entry {
    gen: GenNr,
    value: Rc<Primitive>,
}

/// Removes `num` from the in-progress set when the parse is over, whichever way it ends.
struct ParseGuard<'a> {
    parsing: &'a RefCell<HashSet<ObjNr>>,
    num: ObjNr,
}
impl<'a> Drop for ParseGuard<'a> {
    fn drop(&mut self) {
        self.parsing.borrow_mut().remove(&self.num);
    }
}

/// Maps object numbers to values for one document, parsing on demand.
pub struct IndirectObjects<S = NoSource> {
    objects: RefCell<HashMap<ObjNr, Entry>>,
    parsing: RefCell<HashSet<ObjNr>>,
    last_obj_num: Cell<ObjNr>,
    source: S,
}

impl IndirectObjects<NoSource> {
    pub fn new() -> Self {
        IndirectObjects::with_source(NoSource)
    }
}
impl Default for IndirectObjects<NoSource> {
    fn default() -> Self {
        IndirectObjects::new()
    }
}

impl<S: ObjectSource> IndirectObjects<S> {
    pub fn with_source(source: S) -> Self {
        IndirectObjects {
            objects: RefCell::new(HashMap::new()),
            parsing: RefCell::new(HashSet::new()),
            last_obj_num: Cell::new(source.last_obj_num()),
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The cached object, without parsing.
    pub fn get_indirect_object(&self, num: ObjNr) -> Option<Rc<Primitive>> {
        self.objects.borrow().get(&num).map(|e| e.value.clone())
    }

    /// The generation the object is stored under.
    pub fn generation(&self, num: ObjNr) -> Option<GenNr> {
        self.objects.borrow().get(&num).map(|e| e.gen)
    }

    /// The cached object, or parse it from the source.
    ///
    /// Returns `Ok(None)` for object 0, for objects the source does not know and for
    /// an object that is requested again while it is being parsed (a cycle).
    /// Only `DataUnavailable` is returned as an error; nothing is cached in that case.
    pub fn get_or_parse_indirect_object(&self, num: ObjNr) -> Result<Option<Rc<Primitive>>> {
        if num == 0 {
            return Ok(None);
        }
        if let Some(value) = self.get_indirect_object(num) {
            return Ok(Some(value));
        }
        if !self.parsing.borrow_mut().insert(num) {
            debug!("object {} requested while being parsed", num);
            return Ok(None);
        }
        let _guard = ParseGuard { parsing: &self.parsing, num };

        let (gen, value) = match self.source.parse_indirect_object(num, self) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(e) if e.is_data_unavailable() => return Err(e),
            Err(e) => {
                debug!("failed to parse object {}: {}", num, e);
                return Ok(None);
            }
        };
        self.store_if_higher_generation(num, gen, value);
        Ok(self.get_indirect_object(num))
    }

    /// Register `value` under the next number unused by both the table and the source.
    pub fn add_indirect_object(&mut self, value: impl Into<Primitive>) -> PlainRef {
        let id = self.last_obj_num() + 1;
        self.last_obj_num.set(id);
        self.objects.get_mut().insert(id, Entry { gen: 0, value: Rc::new(value.into()) });
        PlainRef { id, gen: 0 }
    }

    /// Store `value` under `num` unless an entry with the same or a higher generation exists.
    /// Returns whether `value` was stored.
    pub fn replace_indirect_object_if_higher_generation(&mut self, num: ObjNr, gen: GenNr, value: impl Into<Primitive>) -> bool {
        self.store_if_higher_generation(num, gen, value.into())
    }

    fn store_if_higher_generation(&self, num: ObjNr, gen: GenNr, value: Primitive) -> bool {
        if num == 0 {
            return false;
        }
        let mut objects = self.objects.borrow_mut();
        if let Some(old) = objects.get(&num) {
            if gen <= old.gen {
                return false;
            }
        }
        objects.insert(num, Entry { gen, value: Rc::new(value) });
        self.last_obj_num.set(self.last_obj_num.get().max(num));
        true
    }

    pub fn delete_indirect_object(&mut self, num: ObjNr) -> Option<Rc<Primitive>> {
        self.objects.get_mut().remove(&num).map(|e| e.value)
    }

    /// Mutable access to a cached object. Other holders of the value keep the old version.
    pub fn get_mut(&mut self, num: ObjNr) -> Option<&mut Primitive> {
        self.objects.get_mut().get_mut(&num).map(|e| Rc::make_mut(&mut e.value))
    }

    /// The highest object number in use, cached or known to the source.
    pub fn last_obj_num(&self) -> ObjNr {
        self.last_obj_num.get().max(self.source.last_obj_num())
    }

    /// Numbers of all cached objects, in ascending order.
    pub fn object_numbers(&self) -> Vec<ObjNr> {
        let mut nums: Vec<ObjNr> = self.objects.borrow().keys().cloned().collect();
        nums.sort_unstable();
        nums
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate memory held by the cached objects.
    pub fn heap_size(&self) -> usize {
        self.objects.borrow().values().map(|e| datasize::data_size(&*e.value)).sum()
    }

    /// Copy of object `num`. See [`Primitive::clone_object`]; references back to `num`
    /// itself are omitted as well.
    pub fn clone_indirect_object(&self, num: ObjNr, direct: bool) -> Result<Option<Primitive>> {
        let value = match self.get_or_parse_indirect_object(num)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let mut visited = HashSet::new();
        visited.insert(num);
        Ok(value.clone_with_visited(direct, self, &mut visited))
    }

    /// Numbers of all objects reachable from `num` through references, `num` included.
    /// Missing objects are listed, but not followed.
    pub fn reachable_from(&self, num: ObjNr) -> Result<Vec<ObjNr>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut out = vec![];
        seen.insert(num);
        queue.push_back(num);
        while let Some(num) = queue.pop_front() {
            out.push(num);
            let value = match self.get_or_parse_indirect_object(num)? {
                Some(value) => value,
                None => continue,
            };
            for r in collect_references(&value) {
                if seen.insert(r.id) {
                    queue.push_back(r.id);
                }
            }
        }
        Ok(out)
    }
}

impl<S: ObjectSource> Resolve for IndirectObjects<S> {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        match self.get_or_parse_indirect_object(r.id)? {
            Some(value) => Ok((*value).clone()),
            None => Err(PdfError::NullRef { obj_nr: r.id }),
        }
    }
}
