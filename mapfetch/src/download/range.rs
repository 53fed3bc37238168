//! Half-open byte ranges within the downloaded file.

use std::fmt;

/// A half-open byte range `[begin, end)` measured from the start of the file.
///
/// Ranges handed out by the scheduler always satisfy `begin < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    /// First byte of the range (inclusive).
    pub begin: u64,
    /// One past the last byte of the range (exclusive).
    pub end: u64,
}

impl ByteRange {
    /// Create a new range.
    ///
    /// # Panics
    ///
    /// Panics if `begin >= end`; an empty range is never a unit of transfer.
    pub fn new(begin: u64, end: u64) -> Self {
        assert!(begin < end, "empty byte range [{}, {})", begin, end);
        Self { begin, end }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    /// Always false for ranges built through [`ByteRange::new`].
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// Check whether `offset` falls inside the range.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.begin && offset < self.end
    }

    /// Value of the HTTP `Range` header requesting exactly this range.
    ///
    /// HTTP byte ranges are inclusive on both ends, so `[0, 250)` becomes
    /// `bytes=0-249`.
    pub fn http_range_header(&self) -> String {
        format!("bytes={}-{}", self.begin, self.end - 1)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}
