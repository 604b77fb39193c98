use std::io;
use std::error::Error;

#[derive(Debug, Snafu)]
pub enum PdfError {
    // Syntax / parsing
    #[snafu(display("Invalid UTF-8: {}", source))]
    Utf8 { source: Box<dyn Error> },

    /// The byte source does not (yet) hold the requested range.
    /// Progressive loading: retry once more data has arrived.
    #[snafu(display("Data not available: {} bytes at {}", len, pos))]
    DataUnavailable { pos: usize, len: usize },

    #[snafu(display("Read past the end of the data ({}..{} of {})", start, end, len))]
    ContentReadPastBoundary { start: usize, end: usize, len: usize },

    //////////////////
    // Encode/decode
    #[snafu(display("Failed to convert '{}' into PredictorType", n))]
    IncorrectPredictorType {n: u8},

    #[snafu(display("Unknown filter /{}", name))]
    UnknownFilter { name: String },

    #[snafu(display("Decoded data exceeds the limit of {} bytes", limit))]
    DecodeLimit { limit: usize },

    //////////////////
    // Dictionary
    #[snafu(display("Field /{} is missing in dictionary for type {}.", field, typ))]
    MissingEntry {
        typ: &'static str,
        field: String
    },

    #[snafu(display("Expected to find value {} for key {}. Found {} instead.", value, key, found))]
    KeyValueMismatch {
        key: String,
        value: String,
        found: String,
    },

    //////////////////
    // Misc
    #[snafu(display("Tried to dereference non-existing object nr {}.", obj_nr))]
    NullRef {obj_nr: u64},

    #[snafu(display("Expected primitive {}, found primive {} instead.", expected, found))]
    UnexpectedPrimitive {expected: &'static str, found: &'static str},

    #[snafu(display("IO Error"))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Other { msg: String },

    #[snafu(display("NoneError at {}:{}:{}", file, line, column))]
    NoneError { file: &'static str, line: u32, column: u32 }
}
impl PdfError {
    /// `true` if the operation failed only because the bytes have not arrived yet.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, PdfError::DataUnavailable { .. })
    }
}

pub type Result<T, E=PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Other { msg }
    }
}

#[macro_export]
macro_rules! try_opt {
    ($e:expr) => (
        match $e {
            Some(v) => v,
            None => return Err($crate::PdfError::NoneError {
                file: file!(),
                line: line!(),
                column: column!()
            })
        }
    )
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error => Utf8);

macro_rules! err {
    ($e: expr) => ({
        return Err($e);
    })
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Other { msg: format!($($t)*) })
    }
}

/// Write `data` to a fresh file below the system temp dir and log its path.
#[cfg(feature = "dump")]
pub fn dump_data(data: &[u8]) -> Result<()> {
    use std::io::Write;
    let dir = std::env::temp_dir().join("pdf");
    std::fs::create_dir_all(&dir)?;
    let (mut file, path) = tempfile::Builder::new()
        .prefix("")
        .tempfile_in(&dir)?
        .keep()
        .map_err(|e| PdfError::Io { source: e.error })?;
    file.write_all(data)?;
    info!("data written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_unavailable_is_distinct() {
        let e = PdfError::DataUnavailable { pos: 10, len: 4 };
        assert!(e.is_data_unavailable());
        assert!(!PdfError::DecodeLimit { limit: 4 }.is_data_unavailable());
        assert_eq!(e.to_string(), "Data not available: 4 bytes at 10");
    }

    #[test]
    fn try_opt_reports_location() {
        fn f(o: Option<u8>) -> Result<u8> {
            Ok(try_opt!(o))
        }
        assert_eq!(f(Some(3)).unwrap(), 3);
        assert!(matches!(f(None), Err(PdfError::NoneError { .. })));
    }
}
