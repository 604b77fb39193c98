use crate::error::*;
use crate::object::{PlainRef, Resolve, ObjNr};
use crate::parser::lexer::{is_delimiter, hex_value};
use crate::enc;

use std::sync::Arc;
use std::{fmt, io};
use std::ops::{Index, Deref};
use std::hash::{Hash, Hasher};
use std::cmp::Ordering;
use std::borrow::{Borrow, Cow};
use std::collections::HashSet;
use indexmap::IndexMap;
use itertools::Itertools;
use istring::IBytes;
use datasize::DataSize;
use once_cell::unsync::OnceCell;

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Integer (i32),
    Number (f32),
    Boolean (bool),
    String (PdfString),
    Stream (PdfStream),
    Dictionary (Dictionary),
    Array (Array),
    Reference (PlainRef),
    Name (Name),
}
impl DataSize for Primitive {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();

    fn estimate_heap_size(&self) -> usize {
        match self {
            Primitive::String(ref s) => s.estimate_heap_size(),
            Primitive::Stream(ref s) => s.estimate_heap_size(),
            Primitive::Dictionary(ref d) => d.estimate_heap_size(),
            Primitive::Array(ref arr) => arr.estimate_heap_size(),
            Primitive::Name(ref s) => s.estimate_heap_size(),
            _ => 0
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Integer(i) => i.fmt(f),
            Primitive::Number(n) => n.fmt(f),
            Primitive::Boolean(b) => b.fmt(f),
            Primitive::String(ref s) => write!(f, "{:?}", s),
            Primitive::Stream(_) => write!(f, "stream"),
            Primitive::Dictionary(ref d) => d.fmt(f),
            Primitive::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Primitive::Reference(r) => write!(f, "@{}", r.id),
            Primitive::Name(ref s) => s.fmt(f),
        }
    }
}

/// Transforms string and stream payloads while they are written.
pub trait Encryptor {
    fn encrypt(&self, data: &[u8]) -> Vec<u8>;
}

impl Primitive {
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }
    pub fn write_to(&self, out: &mut impl io::Write, encryptor: Option<&dyn Encryptor>) -> Result<()> {
        match self {
            Primitive::Null => write!(out, "null")?,
            Primitive::Integer(i) => write!(out, "{}", i)?,
            Primitive::Number(n) => write_real(*n, out)?,
            Primitive::Boolean(b) => write!(out, "{}", b)?,
            Primitive::String(ref s) => s.write_to(out, encryptor)?,
            Primitive::Stream(ref s) => s.write_to(out, encryptor)?,
            Primitive::Dictionary(ref d) => d.write_to(out, encryptor)?,
            Primitive::Array(ref arr) => arr.write_to(out, encryptor)?,
            Primitive::Reference(r) =>  write!(out, "{} {} R", r.id, r.gen)?,
            Primitive::Name(ref s) => s.serialize(out)?,
        }
        Ok(())
    }
    pub fn name(name: impl Into<Name>) -> Primitive {
        Primitive::Name(name.into())
    }
}

/// Write `value` framed as indirect object `r`.
pub fn write_indirect_object(out: &mut impl io::Write, r: PlainRef, value: &Primitive, encryptor: Option<&dyn Encryptor>) -> Result<()> {
    write!(out, "{} {} obj\r\n", r.id, r.gen)?;
    value.write_to(out, encryptor)?;
    write!(out, "\r\nendobj\r\n")?;
    Ok(())
}

// reals always carry a '.', so they read back as reals
fn write_real(n: f32, out: &mut impl io::Write) -> Result<()> {
    if !n.is_finite() {
        write!(out, "0.0")?;
        return Ok(());
    }
    let s = n.to_string();
    if s.contains('.') {
        out.write_all(s.as_bytes())?;
    } else {
        write!(out, "{}.0", s)?;
    }
    Ok(())
}

/// Primitive Array type.
#[derive(Default)]
pub struct Array {
    items: Vec<Primitive>,
    locks: u32,
}
impl Array {
    pub fn new() -> Array {
        Array::default()
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    /// Appends a new inline value.
    pub fn push(&mut self, val: impl Into<Primitive>) {
        let val = val.into();
        debug_assert!(!matches!(val, Primitive::Stream(_)), "streams are indirect");
        self.items.push(val);
    }
    /// Inserts at `index`. Returns `false` if `index` is past the end.
    pub fn insert(&mut self, index: usize, val: impl Into<Primitive>) -> bool {
        if index > self.items.len() {
            return false;
        }
        let val = val.into();
        debug_assert!(!matches!(val, Primitive::Stream(_)), "streams are indirect");
        self.items.insert(index, val);
        true
    }
    pub fn remove(&mut self, index: usize) -> Option<Primitive> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
    /// Replaces the value at `index`, returning the old one.
    pub fn set(&mut self, index: usize, val: impl Into<Primitive>) -> Option<Primitive> {
        let slot = self.items.get_mut(index)?;
        Some(std::mem::replace(slot, val.into()))
    }
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Primitive> {
        self.items.get_mut(index)
    }
    pub fn clear(&mut self) {
        self.items.clear();
    }
    pub fn into_vec(self) -> Vec<Primitive> {
        self.items
    }
    /// Number of live iteration locks.
    pub fn lock_count(&self) -> u32 {
        self.locks
    }
    /// Lock the array for iteration. Elements can be replaced through the guard,
    /// but not added or removed until it is dropped.
    pub fn lock(&mut self) -> ArrayLock<'_> {
        self.locks += 1;
        ArrayLock { array: self }
    }
    fn write_to(&self, out: &mut impl io::Write, encryptor: Option<&dyn Encryptor>) -> Result<()> {
        let mut parts = self.items.iter();
        write!(out, "[")?;
        if let Some(first) = parts.next() {
            first.write_to(out, encryptor)?;
        }
        for p in parts {
            write!(out, " ")?;
            p.write_to(out, encryptor)?;
        }
        write!(out, "]")?;
        Ok(())
    }
}
impl Clone for Array {
    fn clone(&self) -> Array {
        Array { items: self.items.clone(), locks: 0 }
    }
}
impl PartialEq for Array {
    fn eq(&self, rhs: &Array) -> bool {
        self.items == rhs.items
    }
}
impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
impl DataSize for Array {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();
    fn estimate_heap_size(&self) -> usize {
        self.items.estimate_heap_size()
    }
}
impl Deref for Array {
    type Target = [Primitive];
    fn deref(&self) -> &[Primitive] {
        &self.items
    }
}
impl From<Vec<Primitive>> for Array {
    fn from(items: Vec<Primitive>) -> Array {
        Array { items, locks: 0 }
    }
}
impl FromIterator<Primitive> for Array {
    fn from_iter<I: IntoIterator<Item=Primitive>>(iter: I) -> Array {
        Array::from(iter.into_iter().collect::<Vec<_>>())
    }
}
impl IntoIterator for Array {
    type Item = Primitive;
    type IntoIter = std::vec::IntoIter<Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
impl<'a> IntoIterator for &'a Array {
    type Item = &'a Primitive;
    type IntoIter = std::slice::Iter<'a, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Scoped iteration lock on an [`Array`].
pub struct ArrayLock<'a> {
    array: &'a mut Array,
}
impl<'a> ArrayLock<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, Primitive> {
        self.array.items.iter()
    }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Primitive> {
        self.array.items.iter_mut()
    }
    pub fn set(&mut self, index: usize, val: impl Into<Primitive>) -> Option<Primitive> {
        self.array.set(index, val)
    }
    /// Re-enter the lock, e.g. from a nested traversal.
    pub fn lock(&mut self) -> ArrayLock<'_> {
        self.array.lock()
    }
    pub fn lock_count(&self) -> u32 {
        self.array.locks
    }
}
impl<'a> Deref for ArrayLock<'a> {
    type Target = [Primitive];
    fn deref(&self) -> &[Primitive] {
        &self.array.items
    }
}
impl<'a> Drop for ArrayLock<'a> {
    fn drop(&mut self) {
        self.array.locks -= 1;
    }
}

/// Primitive Dictionary type.
#[derive(Default)]
pub struct Dictionary {
    dict: IndexMap<Name, Primitive>,
    locks: u32,
}
impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }
    pub fn len(&self) -> usize {
        self.dict.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.dict.get(key.as_bytes())
    }
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Primitive> {
        self.dict.get_mut(key.as_bytes())
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.dict.contains_key(key.as_bytes())
    }
    /// Inserts a new inline value, replacing a previous value under the same key.
    pub fn insert(&mut self, key: impl Into<Name>, val: impl Into<Primitive>) -> Option<Primitive> {
        let val = val.into();
        debug_assert!(!matches!(val, Primitive::Stream(_)), "streams are indirect");
        self.dict.insert(key.into(), val)
    }
    pub fn iter(&self) -> indexmap::map::Iter<'_, Name, Primitive> {
        self.dict.iter()
    }
    pub fn keys(&self) -> impl Iterator<Item=&Name> {
        self.dict.keys()
    }
    pub fn remove(&mut self, key: &str) -> Option<Primitive> {
        self.dict.shift_remove(key.as_bytes())
    }
    pub fn clear(&mut self) {
        self.dict.clear();
    }
    /// like remove, but takes the name of the calling type and returns `PdfError::MissingEntry` if the entry is not found
    pub fn require(&mut self, typ: &'static str, key: &str) -> Result<Primitive> {
        self.remove(key).ok_or(
            PdfError::MissingEntry {
                typ,
                field: key.into()
            }
        )
    }
    /// assert that the given key/value pair is in the dictionary (`required=true`),
    /// or the key is not present at all (`required=false`)
    pub fn expect(&self, typ: &'static str, key: &str, value: &str, required: bool) -> Result<()> {
        match self.get(key) {
            Some(ty) => {
                let ty = ty.as_name()?;
                if ty != value {
                    Err(PdfError::KeyValueMismatch {
                        key: key.into(),
                        value: value.into(),
                        found: ty.to_string_lossy().into_owned()
                    })
                } else {
                    Ok(())
                }
            },
            None if required => Err(PdfError::MissingEntry { typ, field: key.into() }),
            None => Ok(())
        }
    }
    pub fn append(&mut self, other: Dictionary) {
        self.dict.extend(other.dict);
    }

    /// Integer under `key`, 0 if missing or not a number.
    pub fn get_integer_for(&self, key: &str) -> i32 {
        self.get(key).map(Primitive::get_integer).unwrap_or(0)
    }
    pub fn get_number_for(&self, key: &str) -> f32 {
        self.get(key).map(Primitive::get_number).unwrap_or(0.0)
    }
    pub fn get_name_for(&self, key: &str) -> Option<&Name> {
        self.get(key)?.as_name().ok()
    }
    pub fn get_dictionary_for(&self, key: &str) -> Option<&Dictionary> {
        match self.get(key)? {
            Primitive::Dictionary(d) => Some(d),
            Primitive::Stream(s) => Some(&s.info),
            _ => None
        }
    }
    pub fn get_array_for(&self, key: &str) -> Option<&Array> {
        self.get(key)?.as_array().ok()
    }
    /// Value under `key` with a reference followed once.
    pub fn get_direct_for<'a>(&'a self, key: &str, r: &impl Resolve) -> Option<Cow<'a, Primitive>> {
        self.get(key)?.get_direct(r)
    }

    /// Number of live iteration locks.
    pub fn lock_count(&self) -> u32 {
        self.locks
    }
    /// Lock the dictionary for iteration. Values can be replaced through the guard,
    /// but keys cannot be added or removed until it is dropped.
    pub fn lock(&mut self) -> DictLock<'_> {
        self.locks += 1;
        DictLock { dict: self }
    }

    fn write_to(&self, out: &mut impl io::Write, encryptor: Option<&dyn Encryptor>) -> Result<()> {
        write!(out, "<<")?;
        for (i, (key, val)) in self.iter().enumerate() {
            if i > 0 {
                write!(out, " ")?;
            }
            key.serialize(out)?;
            write!(out, " ")?;
            val.write_to(out, encryptor)?;
        }
        write!(out, ">>")?;
        Ok(())
    }
}
impl Clone for Dictionary {
    fn clone(&self) -> Dictionary {
        Dictionary { dict: self.dict.clone(), locks: 0 }
    }
}
impl PartialEq for Dictionary {
    fn eq(&self, rhs: &Dictionary) -> bool {
        self.dict == rhs.dict
    }
}
impl DataSize for Dictionary {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();
    fn estimate_heap_size(&self) -> usize {
        self.iter().map(|(k, v)| 16 + k.estimate_heap_size() + v.estimate_heap_size()).sum()
    }
}
impl Deref for Dictionary {
    type Target = IndexMap<Name, Primitive>;
    fn deref(&self) -> &IndexMap<Name, Primitive> {
        &self.dict
    }
}
impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self {
            writeln!(f, "{:>15}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.iter().format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v))))
    }
}
impl<'a> Index<&'a str> for Dictionary {
    type Output = Primitive;
    fn index(&self, idx: &'a str) -> &Primitive {
        self.dict.index(idx.as_bytes())
    }
}
impl FromIterator<(Name, Primitive)> for Dictionary {
    fn from_iter<I: IntoIterator<Item=(Name, Primitive)>>(iter: I) -> Dictionary {
        Dictionary { dict: iter.into_iter().collect(), locks: 0 }
    }
}
impl IntoIterator for Dictionary {
    type Item = (Name, Primitive);
    type IntoIter = indexmap::map::IntoIter<Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.into_iter()
    }
}
impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Primitive);
    type IntoIter = indexmap::map::Iter<'a, Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.iter()
    }
}

/// Scoped iteration lock on a [`Dictionary`].
pub struct DictLock<'a> {
    dict: &'a mut Dictionary,
}
impl<'a> DictLock<'a> {
    pub fn iter(&self) -> indexmap::map::Iter<'_, Name, Primitive> {
        self.dict.dict.iter()
    }
    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Name, Primitive> {
        self.dict.dict.iter_mut()
    }
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.dict.get(key)
    }
    /// Replace the value of an existing key. Returns `None` (and drops `val`) if the key is missing.
    pub fn replace(&mut self, key: &str, val: impl Into<Primitive>) -> Option<Primitive> {
        let slot = self.dict.get_mut(key)?;
        Some(std::mem::replace(slot, val.into()))
    }
    /// Re-enter the lock, e.g. from a nested traversal.
    pub fn lock(&mut self) -> DictLock<'_> {
        self.dict.lock()
    }
    pub fn lock_count(&self) -> u32 {
        self.dict.locks
    }
}
impl<'a> Drop for DictLock<'a> {
    fn drop(&mut self) {
        self.dict.locks -= 1;
    }
}

/// Primitive Stream: a dictionary plus its raw (still encoded) payload.
#[derive(Clone)]
pub struct PdfStream {
    pub info: Dictionary,
    data: Arc<[u8]>,
    decoded: OnceCell<Arc<[u8]>>,
}
impl PdfStream {
    /// Creates a stream and sets `/Length` to match `data`.
    pub fn new(mut info: Dictionary, data: impl Into<Arc<[u8]>>) -> PdfStream {
        let data = data.into();
        info.insert("Length", data.len() as i32);
        PdfStream::from_parts(info, data)
    }
    /// Creates a stream keeping `info` exactly as given.
    pub fn from_parts(info: Dictionary, data: impl Into<Arc<[u8]>>) -> PdfStream {
        PdfStream { info, data: data.into(), decoded: OnceCell::new() }
    }
    /// The raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    pub fn raw_data(&self) -> Arc<[u8]> {
        self.data.clone()
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Replace the payload. `/Length` follows.
    pub fn set_data(&mut self, data: impl Into<Arc<[u8]>>) {
        self.data = data.into();
        self.info.insert("Length", self.data.len() as i32);
        self.decoded = OnceCell::new();
    }
    /// The payload with all non-image filters applied. The result is cached.
    ///
    /// If the pipeline ends in an image filter (see [`PdfStream::image_filter`]),
    /// the data returned is the input to that filter.
    pub fn decoded(&self) -> Result<Arc<[u8]>> {
        self.decoded.get_or_try_init(|| {
            let filters = match enc::decoder_array(&self.info) {
                Some(filters) => filters,
                None => bail!("invalid filter pipeline"),
            };
            let result = enc::decode_pipeline(&self.data, &filters, crate::options::ParseOptions::DEFAULT_MAX_STREAM_SIZE)?;
            Ok(result.data.into())
        }).cloned()
    }
    /// The trailing image filter of the pipeline, if any.
    pub fn image_filter(&self) -> Option<enc::StreamFilter> {
        let filters = enc::decoder_array(&self.info)?;
        let (name, params) = filters.last()?;
        enc::StreamFilter::from_name_and_params(name, params.as_ref())
            .filter(|f| f.is_image())
    }
    fn write_to(&self, out: &mut impl io::Write, encryptor: Option<&dyn Encryptor>) -> Result<()> {
        let encrypted;
        let data: &[u8] = match encryptor {
            Some(e) => {
                encrypted = e.encrypt(&self.data);
                &encrypted
            }
            None => &self.data
        };
        let mut info = self.info.clone();
        info.insert("Length", data.len() as i32);
        info.write_to(out, encryptor)?;
        write!(out, "stream\r\n")?;
        out.write_all(data)?;
        write!(out, "\r\nendstream")?;
        Ok(())
    }
}
impl PartialEq for PdfStream {
    fn eq(&self, rhs: &PdfStream) -> bool {
        self.info == rhs.info && self.data == rhs.data
    }
}
impl fmt::Debug for PdfStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PdfStream")
            .field("info", &self.info)
            .field("len", &self.data.len())
            .finish()
    }
}
impl DataSize for PdfStream {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();
    fn estimate_heap_size(&self) -> usize {
        self.info.estimate_heap_size() + self.data.len()
    }
}

macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => (
        Err(PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found
        })
    )
}

/// A PDF name, stored without the leading `/` and with `#xx` escapes decoded.
#[derive(Clone, PartialEq, Eq, DataSize)]
pub struct Name(pub IBytes);
impl Name {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
    /// `None` if the name is not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
    pub fn to_string_lossy(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.0)
    }
    /// Decode the `#xx` escapes of a raw name token (without the `/`).
    /// A `#` not followed by two hex digits is kept as is.
    pub fn decode(raw: &[u8]) -> Name {
        if !raw.contains(&b'#') {
            return Name(raw.into());
        }
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let b = raw[i];
            if b == b'#' {
                if let (Some(hi), Some(lo)) = (raw.get(i + 1).and_then(|&c| hex_value(c)), raw.get(i + 2).and_then(|&c| hex_value(c))) {
                    out.push(hi << 4 | lo);
                    i += 3;
                    continue;
                }
            }
            out.push(b);
            i += 1;
        }
        Name(out.into())
    }
    /// Escape the name for output (without the `/`).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len());
        for &b in self.as_bytes() {
            if b < 0x21 || b > 0x7e || b == b'#' || is_delimiter(b) {
                out.push(b'#');
                out.push(HEX_UPPER[(b >> 4) as usize]);
                out.push(HEX_UPPER[(b & 0xf) as usize]);
            } else {
                out.push(b);
            }
        }
        out
    }
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        out.write_all(b"/")?;
        out.write_all(&self.encode())?;
        Ok(())
    }
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}
impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Name) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Name {
    fn cmp(&self, other: &Name) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}
impl Deref for Name {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.0
    }
}
impl From<String> for Name {
    #[inline]
    fn from(s: String) -> Name {
        Name(s.as_str().into())
    }
}
impl<'a> From<&'a str> for Name {
    #[inline]
    fn from(s: &'a str) -> Name {
        Name(s.into())
    }
}
impl<'a> From<&'a [u8]> for Name {
    #[inline]
    fn from(s: &'a [u8]) -> Name {
        Name(s.into())
    }
}
impl From<Vec<u8>> for Name {
    #[inline]
    fn from(s: Vec<u8>) -> Name {
        Name(s.into())
    }
}
impl PartialEq<str> for Name {
    #[inline]
    fn eq(&self, rhs: &str) -> bool {
        self.as_bytes() == rhs.as_bytes()
    }
}
impl<'a> PartialEq<&'a str> for Name {
    #[inline]
    fn eq(&self, rhs: &&'a str) -> bool {
        self.as_bytes() == rhs.as_bytes()
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.encode()))
    }
}
impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
impl Borrow<[u8]> for Name {
    #[inline]
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}
#[test]
fn test_name() {
    use std::collections::hash_map::DefaultHasher;

    let s = "Hello World!";
    let hasher = DefaultHasher::new();

    fn hash(hasher: &DefaultHasher, value: impl Hash) -> u64 {
        let mut hasher = hasher.clone();
        value.hash(&mut hasher);
        hasher.finish()
    }
    assert_eq!(hash(&hasher, Name::from(s)), hash(&hasher, s.as_bytes()));
}

/// Primitive String type.
#[derive(Clone, PartialEq, Eq, Hash, DataSize)]
pub struct PdfString {
    pub data: IBytes,
    /// written as `<..>` instead of `(..)`
    pub hex: bool,
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in self.data.as_slice() {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' ' ..= b'~' => write!(f, "{}", b as char)?,
                o @ 0 ..= 7  => write!(f, "\\{}", o)?,
                x => write!(f, "\\x{:02x}", x)?
            }
        }
        write!(f, "\"")
    }
}

impl PdfString {
    pub fn write_to(&self, out: &mut impl io::Write, encryptor: Option<&dyn Encryptor>) -> Result<()> {
        let encrypted;
        let data: &[u8] = match encryptor {
            Some(e) => {
                encrypted = e.encrypt(&self.data);
                &encrypted
            }
            None => &self.data
        };
        if self.hex {
            write!(out, "<")?;
            for &b in data {
                out.write_all(&[HEX_UPPER[(b >> 4) as usize], HEX_UPPER[(b & 0xf) as usize]])?;
            }
            write!(out, ">")?;
        } else {
            write!(out, r"(")?;
            for &b in data {
                match b {
                    b'\\' | b'(' | b')' => out.write_all(&[b'\\', b])?,
                    b'\n' => write!(out, r"\n")?,
                    b'\r' => write!(out, r"\r")?,
                    _ => out.write_all(&[b])?,
                }
            }
            write!(out, r")")?;
        }
        Ok(())
    }
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }
}
impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PdfString {
    pub fn new(data: IBytes) -> PdfString {
        PdfString {
            data,
            hex: false,
        }
    }
    pub fn new_hex(data: IBytes) -> PdfString {
        PdfString {
            data,
            hex: true,
        }
    }
    /// Encode `text` as PDFDocEncoding if possible, UTF-16BE otherwise.
    pub fn from_text(text: &str) -> PdfString {
        PdfString::new(crate::encoding::encode_text(text).into())
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn into_bytes(self) -> IBytes {
        self.data
    }
    pub fn is_hex(&self) -> bool {
        self.hex
    }
    /// Decode as a text string (UTF-16 and UTF-8 with byte order mark, PDFDocEncoding otherwise).
    /// Undefined characters are replaced.
    pub fn to_string_lossy(&self) -> String {
        crate::encoding::decode_text(&self.data)
    }
    /// Like `to_string_lossy`, but fails on malformed or undefined characters.
    pub fn to_string(&self) -> Result<String> {
        crate::encoding::decode_text_strict(&self.data)
    }
}
impl<'a> From<&'a str> for PdfString {
    fn from(value: &'a str) -> Self {
        PdfString::new(value.into())
    }
}
impl<'a> From<&'a [u8]> for PdfString {
    fn from(value: &'a [u8]) -> Self {
        PdfString::new(value.into())
    }
}

impl Primitive {
    /// For debugging / error messages: get the name of the variant
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Primitive::Null => "Null",
            Primitive::Integer (..) => "Integer",
            Primitive::Number (..) => "Number",
            Primitive::Boolean (..) => "Boolean",
            Primitive::String (..) => "String",
            Primitive::Stream (..) => "Stream",
            Primitive::Dictionary (..) => "Dictionary",
            Primitive::Array (..) => "Array",
            Primitive::Reference (..) => "Reference",
            Primitive::Name (..) => "Name",
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Primitive::Null)
    }
    pub fn is_stream(&self) -> bool {
        matches!(self, Primitive::Stream(_))
    }
    /// resolve the primitive if it is a refernce, otherwise do nothing
    pub fn resolve(self, r: &impl Resolve) -> Result<Primitive> {
        match self {
            Primitive::Reference(id) => r.resolve(id),
            _ => Ok(self)
        }
    }
    /// Follow one reference. `None` if it cannot be resolved, for whatever reason.
    pub fn get_direct<'a>(&'a self, r: &impl Resolve) -> Option<Cow<'a, Primitive>> {
        match *self {
            Primitive::Reference(id) => match r.resolve(id) {
                Ok(p) => Some(Cow::Owned(p)),
                Err(e) => {
                    debug!("unresolved reference {} {} R: {}", id.id, id.gen, e);
                    None
                }
            },
            _ => Some(Cow::Borrowed(self))
        }
    }
    /// Integer value, truncating reals. 0 for anything else.
    pub fn get_integer(&self) -> i32 {
        match *self {
            Primitive::Integer(n) => n,
            Primitive::Number(f) => f as i32,
            _ => 0
        }
    }
    /// Numeric value. 0.0 for anything else.
    pub fn get_number(&self) -> f32 {
        match *self {
            Primitive::Integer(n) => n as f32,
            Primitive::Number(f) => f,
            _ => 0.0
        }
    }
    pub fn get_name(&self) -> Option<&Name> {
        match self {
            Primitive::Name(ref name) => Some(name),
            _ => None
        }
    }
    pub fn get_string(&self) -> Option<&PdfString> {
        match self {
            Primitive::String(ref s) => Some(s),
            _ => None
        }
    }
    pub fn as_integer(&self) -> Result<i32> {
        match *self {
            Primitive::Integer(n) => Ok(n),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_u32(&self) -> Result<u32> {
        match *self {
            Primitive::Integer(n) if n >= 0 => Ok(n as u32),
            Primitive::Integer(_) => bail!("negative integer"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_usize(&self) -> Result<usize> {
        match *self {
            Primitive::Integer(n) if n >= 0 => Ok(n as usize),
            Primitive::Integer(_) => bail!("negative integer"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_number(&self) -> Result<f32> {
        match *self {
            Primitive::Integer(n) => Ok(n as f32),
            Primitive::Number(f) => Ok(f),
            ref p => unexpected_primitive!(Number, p.get_debug_name())
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Primitive::Boolean (b) => Ok(b),
            ref p => unexpected_primitive!(Boolean, p.get_debug_name())
        }
    }
    pub fn as_name(&self) -> Result<&Name> {
        match self {
            Primitive::Name(ref name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Primitive::String(ref data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Primitive::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn as_dictionary(&self) -> Result<&Dictionary> {
        match self {
            Primitive::Dictionary(ref d) => Ok(d),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            Primitive::Stream(ref s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
    pub fn as_reference(&self) -> Result<PlainRef> {
        match *self {
            Primitive::Reference(id) => Ok(id),
            ref p => unexpected_primitive!(Reference, p.get_debug_name())
        }
    }
    pub fn into_array(self) -> Result<Array> {
        match self {
            Primitive::Array(v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn into_dictionary(self) -> Result<Dictionary> {
        match self {
            Primitive::Dictionary(dict) => Ok(dict),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Primitive::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Primitive::String(data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Primitive::Stream (s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }

    /// Structurally independent copy.
    ///
    /// With `direct = false` references are copied as references. With `direct = true` they are
    /// replaced by a copy of the object they point to; a reference back into an object that is
    /// already being copied on the current path is omitted, as are references that cannot be
    /// resolved. Returns `None` only if `self` is such a reference.
    pub fn clone_object(&self, direct: bool, r: &impl Resolve) -> Option<Primitive> {
        let mut visited = HashSet::new();
        self.clone_with_visited(direct, r, &mut visited)
    }

    pub(crate) fn clone_with_visited(&self, direct: bool, r: &impl Resolve, visited: &mut HashSet<ObjNr>) -> Option<Primitive> {
        match *self {
            Primitive::Reference(id) if direct => {
                if !visited.insert(id.id) {
                    debug!("clone: cycle through object {}", id.id);
                    return None;
                }
                let copy = match r.resolve(id) {
                    Ok(p) => p.clone_with_visited(direct, r, visited),
                    Err(_) => None
                };
                visited.remove(&id.id);
                copy
            }
            Primitive::Array(ref arr) => Some(Primitive::Array(
                arr.iter().filter_map(|p| p.clone_with_visited(direct, r, visited)).collect()
            )),
            Primitive::Dictionary(ref dict) => Some(Primitive::Dictionary(
                dict.clone_with_visited(direct, r, visited)
            )),
            Primitive::Stream(ref s) => Some(Primitive::Stream(
                PdfStream::from_parts(s.info.clone_with_visited(direct, r, visited), s.raw_data())
            )),
            ref p => Some(p.clone())
        }
    }
}

impl Dictionary {
    fn clone_with_visited(&self, direct: bool, r: &impl Resolve, visited: &mut HashSet<ObjNr>) -> Dictionary {
        self.iter()
            .filter_map(|(k, v)| Some((k.clone(), v.clone_with_visited(direct, r, visited)?)))
            .collect()
    }
}

impl From<i32> for Primitive {
    fn from(x: i32) -> Primitive {
        Primitive::Integer(x)
    }
}
impl From<f32> for Primitive {
    fn from(x: f32) -> Primitive {
        Primitive::Number(x)
    }
}
impl From<bool> for Primitive {
    fn from(x: bool) -> Primitive {
        Primitive::Boolean(x)
    }
}
impl From<Name> for Primitive {
    fn from(x: Name) -> Primitive {
        Primitive::Name(x)
    }
}
impl From<PdfString> for Primitive {
    fn from(x: PdfString) -> Primitive {
        Primitive::String (x)
    }
}
impl From<PdfStream> for Primitive {
    fn from(x: PdfStream) -> Primitive {
        Primitive::Stream (x)
    }
}
impl From<Dictionary> for Primitive {
    fn from(x: Dictionary) -> Primitive {
        Primitive::Dictionary (x)
    }
}
impl From<Array> for Primitive {
    fn from(x: Array) -> Primitive {
        Primitive::Array (x)
    }
}
impl From<Vec<Primitive>> for Primitive {
    fn from(x: Vec<Primitive>) -> Primitive {
        Primitive::Array (x.into())
    }
}
impl From<PlainRef> for Primitive {
    fn from(x: PlainRef) -> Primitive {
        Primitive::Reference (x)
    }
}
