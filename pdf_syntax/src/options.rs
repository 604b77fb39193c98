//! Parser configuration.

/// How tolerant the syntax parser is towards malformed dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseType {
    /// A bad key or value fails the whole dictionary.
    Strict,
    /// Bad keys and values are skipped, unterminated arrays are accepted.
    Loose,
}

/// Limits and modes shared by the document and content parsers.
///
/// `Default` is the lenient configuration, which is what real-world files need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub parse_type: ParseType,

    /// Nesting ceiling of the document-level parser.
    pub max_depth: usize,

    /// Nesting ceiling of the content stream parser.
    pub content_max_depth: usize,

    /// Longest literal or hex string the content parser keeps; excess bytes are dropped.
    pub max_string_len: usize,

    /// Number of bytes the syntax parser fetches from its backend at once.
    pub window_size: usize,

    /// Upper bound for decoded stream data.
    pub max_stream_size: usize,
}

impl ParseOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 64;
    pub const DEFAULT_CONTENT_MAX_DEPTH: usize = 512;
    pub const DEFAULT_MAX_STRING_LEN: usize = 32767;
    pub const DEFAULT_WINDOW_SIZE: usize = 4096;
    pub const DEFAULT_MAX_STREAM_SIZE: usize = 20 * 1024 * 1024;

    pub fn lenient() -> Self {
        ParseOptions {
            parse_type: ParseType::Loose,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            content_max_depth: Self::DEFAULT_CONTENT_MAX_DEPTH,
            max_string_len: Self::DEFAULT_MAX_STRING_LEN,
            window_size: Self::DEFAULT_WINDOW_SIZE,
            max_stream_size: Self::DEFAULT_MAX_STREAM_SIZE,
        }
    }

    pub fn strict() -> Self {
        ParseOptions {
            parse_type: ParseType::Strict,
            ..Self::lenient()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.parse_type == ParseType::Strict
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        // a zero sized window could never make progress
        self.window_size = size.max(1);
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lenient() {
        let opts = ParseOptions::default();
        assert_eq!(opts.parse_type, ParseType::Loose);
        assert_eq!(opts.max_depth, 64);
        assert_eq!(opts.content_max_depth, 512);
        assert!(!opts.is_strict());
    }

    #[test]
    fn strict_keeps_limits() {
        let opts = ParseOptions::strict();
        assert!(opts.is_strict());
        assert_eq!(opts.max_string_len, ParseOptions::lenient().max_string_len);
    }

    #[test]
    fn window_never_zero() {
        assert_eq!(ParseOptions::default().with_window_size(0).window_size, 1);
    }
}
