//! Range parsing and clamping
//!
//! A client asks for `bytes=<start>-` or `bytes=<start>-<end>`. The range that
//! is actually served is clamped to the end of the file and to the chunk
//! ceiling, so a client pulls a large file by re-requesting with an advanced
//! start.

use super::error::TransferError;

/// Default chunk ceiling: 10 MiB
pub const DEFAULT_CHUNK_CEILING: u64 = 10 * 1024 * 1024;

/// Parsed `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Parse a single `bytes` range.
    ///
    /// Suffix ranges (`bytes=-500`) and multiple ranges are rejected.
    pub fn parse(value: &str) -> Result<Self, TransferError> {
        let malformed = |reason: &str| TransferError::MalformedRange(format!("{value:?}: {reason}"));

        let (unit, spec) = value
            .trim()
            .split_once('=')
            .ok_or_else(|| malformed("expected bytes=<start>-[<end>]"))?;

        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return Err(malformed("unit must be bytes"));
        }

        if spec.contains(',') {
            return Err(malformed("multiple ranges are not supported"));
        }

        let (start, end) = spec
            .trim()
            .split_once('-')
            .ok_or_else(|| malformed("missing '-'"))?;

        let start = parse_offset(start.trim()).ok_or_else(|| malformed("invalid start"))?;
        let end = match end.trim() {
            "" => None,
            end => Some(parse_offset(end).ok_or_else(|| malformed("invalid end"))?),
        };

        if let Some(end) = end {
            if end < start {
                return Err(malformed("end before start"));
            }
        }

        Ok(Self { start, end })
    }
}

/// Digits only; `u64::from_str` would also take a leading `+`
fn parse_offset(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// The inclusive byte range a response will carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceableRange {
    pub start: u64,
    pub end: u64,
    /// Full size of the file
    pub total: u64,
}

impl ServiceableRange {
    /// Clamp `request` against a file of `size` bytes and the chunk ceiling.
    ///
    /// `end = min(requested end, start + ceiling - 1, size - 1)`
    pub fn resolve(request: RangeRequest, size: u64, chunk_ceiling: u64) -> Result<Self, TransferError> {
        if size == 0 {
            return Err(TransferError::EmptyFile);
        }

        if request.start >= size {
            return Err(TransferError::RangeNotSatisfiable {
                start: request.start,
                size,
            });
        }

        let ceiling_end = request.start.saturating_add(chunk_ceiling.max(1) - 1);
        let mut end = ceiling_end.min(size - 1);
        if let Some(requested) = request.end {
            end = end.min(requested);
        }

        Ok(Self {
            start: request.start,
            end,
            total: size,
        })
    }

    /// Number of bytes in the range
    pub fn chunk_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}
