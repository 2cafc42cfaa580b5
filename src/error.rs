use thiserror::Error;

/// Failures surfaced by `allocate`/`reallocate`.
///
/// `deallocate` never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("out of memory: system allocator refused {bytes} bytes and no handler is registered")]
  OutOfMemory { bytes: usize },
  #[error("out-of-memory handler gave up on {bytes} bytes after {attempts} attempt(s)")]
  HandlerFailure { bytes: usize, attempts: usize },
  #[error("requested size overflows the address space")]
  CapacityOverflow,
  #[error("type alignment {align} exceeds the pool alignment {pool_align}")]
  UnsupportedAlignment { align: usize, pool_align: usize },
}

/// Rejected [`PoolConfig`](crate::PoolConfig) tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("align {0} is not a power of two")]
  AlignNotPowerOfTwo(usize),
  #[error("align {align} is outside {min}..={max}")]
  AlignOutOfRange { align: usize, min: usize, max: usize },
  #[error("max_bytes {max_bytes} must be a non-zero multiple of align {align}")]
  MaxBytesNotMultiple { max_bytes: usize, align: usize },
  #[error("refill batch must hold at least one node")]
  EmptyRefillBatch,
}
