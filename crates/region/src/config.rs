//! Pool configuration

use crate::error::{PoolError, PoolResult};
use crate::types::MIN_POOL_SIZE;
use crate::types::size::DEFAULT_POOL_SIZE;

/// Configuration for a region pool
///
/// `size` is the byte size of every block in the chain; it is clamped up to
/// [`MIN_POOL_SIZE`] when the pool is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of the first block and of every block added by growth
    pub size: usize,

    /// Fill pattern byte for newly carved small memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for block memory reclaimed by reset (for debugging)
    pub reset_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            reset_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Creates a config for blocks of `size` bytes without debug patterns
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            alloc_pattern: None,
            reset_pattern: None,
        }
    }

    /// Production configuration - no fill passes
    #[must_use]
    pub fn production() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }

    /// Debug configuration - poison fresh and reclaimed memory
    #[must_use]
    pub fn debug() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            alloc_pattern: Some(0xBB),
            reset_pattern: Some(0xDD),
        }
    }

    /// Set the block size
    #[must_use = "builder methods must be chained or built"]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the fill pattern for newly carved small memory
    #[must_use = "builder methods must be chained or built"]
    pub fn with_alloc_pattern(mut self, pattern: Option<u8>) -> Self {
        self.alloc_pattern = pattern;
        self
    }

    /// Set the fill pattern for memory reclaimed by reset
    #[must_use = "builder methods must be chained or built"]
    pub fn with_reset_pattern(mut self, pattern: Option<u8>) -> Self {
        self.reset_pattern = pattern;
        self
    }

    /// Block size after clamping to [`MIN_POOL_SIZE`]
    #[must_use]
    pub fn effective_size(&self) -> usize {
        self.size.max(MIN_POOL_SIZE)
    }

    /// Validates the configuration
    ///
    /// Sizes below [`MIN_POOL_SIZE`] are accepted (they are clamped); a size
    /// that cannot form a heap layout is not.
    pub fn validate(&self) -> PoolResult<()> {
        if self.effective_size() > isize::MAX as usize / 2 {
            return Err(PoolError::invalid_config("block size exceeds addressable range"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = PoolConfig::new(512)
            .with_alloc_pattern(Some(0xAA))
            .with_reset_pattern(None)
            .with_size(1024);

        assert_eq!(config.size, 1024);
        assert_eq!(config.alloc_pattern, Some(0xAA));
        assert_eq!(config.reset_pattern, None);
    }

    #[test]
    fn small_sizes_are_clamped() {
        assert_eq!(PoolConfig::new(0).effective_size(), MIN_POOL_SIZE);
        assert_eq!(PoolConfig::new(4096).effective_size(), 4096);
    }

    #[test]
    fn validation() {
        assert!(PoolConfig::production().validate().is_ok());
        assert!(PoolConfig::debug().validate().is_ok());
        assert!(PoolConfig::new(usize::MAX).validate().is_err());
    }
}
