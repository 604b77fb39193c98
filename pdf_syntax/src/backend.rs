use crate::error::*;

use std::cell::RefCell;
use std::ops::{
    Deref,
    RangeFull,
    RangeFrom,
    RangeTo,
    Range,
};

/// Random access to the bytes of a document.
pub trait Backend: Sized {
    /// Fails with `DataUnavailable` if (part of) the range has not arrived yet.
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the offset of the beginning of the file, i.e., where the `%PDF-1.5` header is.
    fn locate_start_offset(&self) -> Result<usize> {
        // Implementation note 13 in version 1.7 of the PDF reference says that Acrobat viewers
        // expect the header to be within the first 1KB of the file, so we do the same here.
        const HEADER: &[u8] = b"%PDF-";
        let buf = self.read(..std::cmp::min(1024, self.len()))?;
        buf
            .windows(HEADER.len())
            .position(|window| window == HEADER)
            .ok_or_else(|| PdfError::Other{ msg: "file header is missing".to_string() })
    }
}

impl<T> Backend for T where T: Deref<Target=[u8]> {
    fn read<R: IndexRange>(&self, range: R) -> Result<&[u8]> {
        let r = range.to_range(self.len())?;
        Ok(&self[r])
    }
    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Memory-map the file at `path`.
#[cfg(feature = "mmap")]
pub fn map_file(path: impl AsRef<std::path::Path>) -> Result<memmap2::Mmap> {
    let file = std::fs::File::open(path)?;
    // the mapping is read-only; the file must not be truncated while it is in use
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(mmap)
}

/// Progressive loading: wraps a backend whose content arrives piecemeal.
///
/// Reads touching bytes that were not announced through `add_range` fail with
/// `DataUnavailable`, and the range is remembered until `take_missing` is called.
pub struct ReadValidator<B> {
    inner: B,
    // sorted and non-overlapping
    available: RefCell<Vec<Range<usize>>>,
    missing: RefCell<Option<Range<usize>>>,
}
impl<B: Backend> ReadValidator<B> {
    pub fn new(inner: B) -> Self {
        ReadValidator {
            inner,
            available: RefCell::new(vec![]),
            missing: RefCell::new(None),
        }
    }
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Mark `range` as arrived.
    pub fn add_range(&self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let mut available = self.available.borrow_mut();
        available.push(range);
        available.sort_by_key(|r| r.start);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(available.len());
        for r in available.drain(..) {
            match merged.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => merged.push(r),
            }
        }
        *available = merged;
    }

    pub fn is_range_available(&self, range: Range<usize>) -> bool {
        if range.start >= range.end {
            return true;
        }
        self.available.borrow().iter().any(|r| r.start <= range.start && range.end <= r.end)
    }

    /// The range of the last read that failed.
    pub fn take_missing(&self) -> Option<Range<usize>> {
        self.missing.borrow_mut().take()
    }
}
impl<B: Backend> Backend for ReadValidator<B> {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]> {
        let r = range.to_range(self.len())?;
        if !self.is_range_available(r.clone()) {
            trace!("bytes {:?} not available yet", r);
            *self.missing.borrow_mut() = Some(r.clone());
            return Err(PdfError::DataUnavailable { pos: r.start, len: r.len() });
        }
        self.inner.read(r)
    }
    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// `IndexRange` is implemented by Rust's built-in range types, produced
/// by range syntax like `..`, `a..`, `..b` or `c..d`.
pub trait IndexRange
{
    /// Start index (inclusive)
    fn start(&self) -> Option<usize>;

    /// End index (exclusive)
    fn end(&self) -> Option<usize>;

    /// `len`: the size of whatever container that is being indexed
    fn to_range(&self, len: usize) -> Result<Range<usize>> {
        match (self.start(), self.end()) {
            (None, None) => Ok(0 .. len),
            (Some(start), None) if start <= len => Ok(start .. len),
            (None, Some(end)) if end <= len => Ok(0 .. end),
            (Some(start), Some(end)) if start <= end && end <= len => Ok(start .. end),
            (start, end) => Err(PdfError::ContentReadPastBoundary {
                start: start.unwrap_or(0),
                end: end.unwrap_or(len),
                len
            })
        }
    }
}


impl IndexRange for RangeFull {
    #[inline]
    fn start(&self) -> Option<usize> { None }
    #[inline]
    fn end(&self) -> Option<usize> { None }

}

impl IndexRange for RangeFrom<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { Some(self.start) }
    #[inline]
    fn end(&self) -> Option<usize> { None }
}

impl IndexRange for RangeTo<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { None }
    #[inline]
    fn end(&self) -> Option<usize> { Some(self.end) }
}

impl IndexRange for Range<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { Some(self.start) }
    #[inline]
    fn end(&self) -> Option<usize> { Some(self.end) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_backend() {
        let data = b"garbage%PDF-1.7\n".to_vec();
        assert_eq!(data.locate_start_offset().unwrap(), 7);
        assert_eq!(data.read(7..10).unwrap(), b"%PD");
        assert!(matches!(data.read(10..100), Err(PdfError::ContentReadPastBoundary { .. })));
    }

    #[test]
    fn validator_reports_missing_ranges() {
        let validator = ReadValidator::new(b"0123456789".to_vec());
        validator.add_range(0..3);
        validator.add_range(5..8);
        assert_eq!(validator.read(1..3).unwrap(), b"12");

        let err = validator.read(2..6).unwrap_err();
        assert!(err.is_data_unavailable());
        assert_eq!(validator.take_missing(), Some(2..6));
        assert_eq!(validator.take_missing(), None);

        validator.add_range(3..5);
        assert!(validator.is_range_available(0..8));
        assert_eq!(validator.read(2..6).unwrap(), b"2345");
        assert!(!validator.is_range_available(7..9));
    }
}
