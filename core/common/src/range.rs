//! Byte ranges for partial reads.
//!
//! Internally a range is `[begin, end)`: the end is exclusive, unlike the
//! HTTP `Range` header whose last byte position is inclusive. A missing end
//! means "to the end of the content".

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const UNIT: &str = "bytes";

/// A `[begin, end)` byte range with an optionally unbounded end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub begin: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Bounded range `[begin, end)`.
    pub fn new(begin: u64, end: u64) -> Self {
        Self {
            begin,
            end: Some(end),
        }
    }

    /// Range from `begin` to the end of the content.
    pub fn from_offset(begin: u64) -> Self {
        Self { begin, end: None }
    }

    /// Number of bytes covered, `None` when unbounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.begin))
    }

    /// Whether the range is degenerate (`begin == end`).
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Check slice semantics: `begin <= end`, empty ranges allowed.
    pub fn check_slice(&self) -> Result<()> {
        match self.end {
            Some(end) if self.begin > end => Err(Error::InvalidRange(format!(
                "begin {} is past end {}",
                self.begin, end
            ))),
            _ => Ok(()),
        }
    }

    /// Render as a `Range` header value.
    ///
    /// Zero-length ranges are rejected since the header form cannot express
    /// them.
    pub fn to_header_value(&self) -> Result<String> {
        match self.end {
            None => Ok(format!("{}={}-", UNIT, self.begin)),
            Some(end) if self.begin >= end => Err(Error::InvalidRange(format!(
                "[{}, {}) is empty or reversed",
                self.begin, end
            ))),
            Some(end) => Ok(format!("{}={}-{}", UNIT, self.begin, end - 1)),
        }
    }

    /// Parse a `Range` header value of the form `bytes=<begin>-[<end>]`.
    ///
    /// Only the single-range subset this crate emits is understood; it is not
    /// a general parser for third-party headers.
    pub fn from_header_value(header: &str) -> Result<Self> {
        let header = header.to_ascii_lowercase();
        let (unit, ranges) = header
            .split_once('=')
            .ok_or_else(|| Error::InvalidRange(format!("Missing '=' in range header: {}", header)))?;

        if unit.trim() != UNIT {
            return Err(Error::InvalidRange(
                "Missing \"bytes\" in range header".to_string(),
            ));
        }

        let mut parts = ranges.trim().splitn(2, '-');
        let begin = parts.next().and_then(leading_number).unwrap_or(0);
        let end = parts
            .next()
            .and_then(leading_number)
            .and_then(|last| last.checked_add(1));

        Ok(Self { begin, end })
    }
}

/// Parse the leading decimal digits of `s`, ignoring anything after them.
fn leading_number(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s, |(idx, _)| &s[..idx]);
    digits.parse().ok()
}

impl From<std::ops::Range<u64>> for ByteRange {
    fn from(range: std::ops::Range<u64>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<std::ops::RangeFrom<u64>> for ByteRange {
    fn from(range: std::ops::RangeFrom<u64>) -> Self {
        Self::from_offset(range.start)
    }
}

impl FromStr for ByteRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_header_value(s)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.begin, end),
            None => write!(f, "[{}, ..)", self.begin),
        }
    }
}
