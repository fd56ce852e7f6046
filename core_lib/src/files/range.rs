//! `Range` request header parsing for partial-content previews.

use std::fmt;
use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// An inclusive byte range over a resource of known length.
///
/// Values produced by [`parse_range`] always satisfy
/// `start <= end < size` for the `size` they were parsed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Starting byte position (inclusive)
    pub start: u64,
    /// Ending byte position (inclusive)
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered by the range.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range, e.g. `bytes 0-99/1000`.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("range header must start with 'bytes=', got: {0:?}")]
    InvalidUnit(String),

    #[error("no satisfiable range in {header:?} for {size} byte resource")]
    NoValidRanges { header: String, size: u64 },
}

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Accepts a comma-separated list of `start-end`, `start-` and `-suffix`
/// specs. Entries that are malformed or fall outside `0..size` are skipped;
/// the call fails only when the prefix is not `bytes=` or no entry survives.
/// Ranges are returned in header order.
pub fn parse_range(header: &str, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    let Some(specs) = header.strip_prefix(BYTES_UNIT) else {
        return Err(RangeError::InvalidUnit(header.to_string()));
    };

    let ranges: Vec<ByteRange> = specs
        .split(',')
        .map(str::trim)
        .filter(|spec| !spec.is_empty())
        .filter_map(|spec| parse_spec(spec, size))
        .collect();

    if ranges.is_empty() {
        return Err(RangeError::NoValidRanges {
            header: header.to_string(),
            size,
        });
    }

    Ok(ranges)
}

fn parse_spec(spec: &str, size: u64) -> Option<ByteRange> {
    let parts: Vec<&str> = spec.split('-').collect();
    let [first, second] = parts.as_slice() else {
        return None;
    };

    let (start, end) = if first.is_empty() {
        let last = size.checked_sub(1)?;
        if second.is_empty() {
            (last, last)
        } else {
            let suffix: u64 = second.parse().ok()?;
            (size.checked_sub(suffix)?, last)
        }
    } else {
        let start: u64 = first.parse().ok()?;
        let end = if second.is_empty() {
            size.checked_sub(1)?
        } else {
            second.parse().ok()?
        };
        (start, end)
    };

    if start > end || end >= size {
        return None;
    }

    Some(ByteRange::new(start, end))
}
