use crate::{
  error::ConfigError,
  size_class::{self, SizeClass},
};

/// Default node granularity in bytes.
pub const DEFAULT_ALIGN: usize = 8;
/// Default pooled/direct boundary: requests above this go to the system allocator.
pub const DEFAULT_MAX_BYTES: usize = 128;
/// Default number of nodes a refill asks the arena for.
pub const DEFAULT_REFILL_BATCH: usize = 20;

/// Largest accepted `align`.
const MAX_ALIGN: usize = 4096;

/// Tunables of a [`Pool`](crate::Pool).
///
/// ```rust
/// use rpool::PoolConfig;
///
/// let config = PoolConfig::default().with_align(16).with_max_bytes(256);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.num_buckets(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
  align: usize,
  max_bytes: usize,
  refill_batch: usize,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      align: DEFAULT_ALIGN,
      max_bytes: DEFAULT_MAX_BYTES,
      refill_batch: DEFAULT_REFILL_BATCH,
    }
  }
}

impl PoolConfig {
  /// Builds and validates a configuration.
  pub fn new(
    align: usize,
    max_bytes: usize,
    refill_batch: usize,
  ) -> Result<Self, ConfigError> {
    let config = Self {
      align,
      max_bytes,
      refill_batch,
    };
    config.validate()?;
    Ok(config)
  }

  pub fn with_align(
    mut self,
    align: usize,
  ) -> Self {
    self.align = align;
    self
  }

  pub fn with_max_bytes(
    mut self,
    max_bytes: usize,
  ) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  pub fn with_refill_batch(
    mut self,
    refill_batch: usize,
  ) -> Self {
    self.refill_batch = refill_batch;
    self
  }

  /// Checks the invariants the pool relies on.
  ///
  /// A node must be able to hold the free-list link, so `align` is at least
  /// one machine word.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.align.is_power_of_two() {
      return Err(ConfigError::AlignNotPowerOfTwo(self.align));
    }

    let min = size_of::<*mut u8>();
    if self.align < min || self.align > MAX_ALIGN {
      return Err(ConfigError::AlignOutOfRange {
        align: self.align,
        min,
        max: MAX_ALIGN,
      });
    }

    if self.max_bytes == 0 || self.max_bytes % self.align != 0 {
      return Err(ConfigError::MaxBytesNotMultiple {
        max_bytes: self.max_bytes,
        align: self.align,
      });
    }

    if self.refill_batch == 0 {
      return Err(ConfigError::EmptyRefillBatch);
    }

    Ok(())
  }

  pub fn align(&self) -> usize {
    self.align
  }

  pub fn max_bytes(&self) -> usize {
    self.max_bytes
  }

  pub fn refill_batch(&self) -> usize {
    self.refill_batch
  }

  pub fn num_buckets(&self) -> usize {
    self.max_bytes / self.align
  }

  pub fn round_up(
    &self,
    bytes: usize,
  ) -> usize {
    size_class::round_up(bytes, self.align)
  }

  pub fn bucket_index(
    &self,
    bytes: usize,
  ) -> usize {
    size_class::bucket_index(bytes, self.align)
  }

  pub fn bucket_size(
    &self,
    index: usize,
  ) -> usize {
    size_class::bucket_size(index, self.align)
  }

  pub fn classify(
    &self,
    bytes: usize,
  ) -> SizeClass {
    size_class::classify(bytes, self.align, self.max_bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = PoolConfig::default();

    assert_eq!(config.align(), 8);
    assert_eq!(config.max_bytes(), 128);
    assert_eq!(config.refill_batch(), 20);
    assert_eq!(config.num_buckets(), 16);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_rejects_bad_align() {
    assert_eq!(PoolConfig::new(12, 120, 20), Err(ConfigError::AlignNotPowerOfTwo(12)));
    assert!(matches!(
      PoolConfig::new(1, 128, 20),
      Err(ConfigError::AlignOutOfRange { align: 1, .. })
    ));
    assert!(matches!(
      PoolConfig::new(8192, 8192, 20),
      Err(ConfigError::AlignOutOfRange { .. })
    ));
  }

  #[test]
  fn test_rejects_bad_max_bytes() {
    assert_eq!(
      PoolConfig::new(8, 100, 20),
      Err(ConfigError::MaxBytesNotMultiple {
        max_bytes: 100,
        align: 8
      })
    );
    assert!(PoolConfig::new(8, 0, 20).is_err());
  }

  #[test]
  fn test_rejects_empty_batch() {
    assert_eq!(PoolConfig::new(8, 128, 0), Err(ConfigError::EmptyRefillBatch));
  }

  #[test]
  fn test_classify_uses_configured_boundary() {
    let config = PoolConfig::new(16, 64, 4).unwrap();

    assert_eq!(config.classify(64), SizeClass::Bucket(3));
    assert_eq!(config.classify(65), SizeClass::Oversized);
    assert_eq!(config.bucket_size(3), 64);
    assert_eq!(config.round_up(33), 48);
  }
}
