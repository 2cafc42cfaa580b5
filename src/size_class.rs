//! Size-class bucketing.
//!
//! Requests are rounded up to a multiple of the pool alignment and grouped
//! into buckets: bucket `i` serves nodes of exactly `(i + 1) * align` bytes.
//! Anything above `max_bytes` is oversized and bypasses the pool.

use crate::align_to;

/// Where a request of a given byte count is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
  /// Served from the free list of the given bucket.
  Bucket(usize),
  /// Forwarded to the system allocator.
  Oversized,
}

/// Least multiple of `align` that is `>= bytes`.
#[inline]
pub const fn round_up(
  bytes: usize,
  align: usize,
) -> usize {
  align_to!(bytes, align)
}

/// Bucket index for a request of `bytes`.
///
/// A zero-byte request maps to bucket 0. The caller is responsible for
/// checking `bytes` against `max_bytes` first.
#[inline]
pub const fn bucket_index(
  bytes: usize,
  align: usize,
) -> usize {
  let bytes = if bytes == 0 { 1 } else { bytes };
  round_up(bytes, align) / align - 1
}

/// Node size served by bucket `index`.
#[inline]
pub const fn bucket_size(
  index: usize,
  align: usize,
) -> usize {
  (index + 1) * align
}

/// Classifies a request against the pooled/direct boundary.
#[inline]
pub const fn classify(
  bytes: usize,
  align: usize,
  max_bytes: usize,
) -> SizeClass {
  if bytes > max_bytes {
    SizeClass::Oversized
  } else {
    SizeClass::Bucket(bucket_index(bytes, align))
  }
}
