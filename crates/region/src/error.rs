//! Standalone error types for nebula-region
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use core::alloc::Layout;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::warn;

// ============================================================================
// Main Error Types
// ============================================================================

/// Region pool errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Invalid memory layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Unsupported alignment: {align} (pool carves at most {max} byte alignment)")]
    UnsupportedAlignment { align: usize, max: usize },

    // --- Configuration Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl PoolError {
    /// Check if error is retryable
    ///
    /// Heap exhaustion leaves the pool usable; a smaller request or a retry
    /// after the process frees memory may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "REGION:ALLOC:FAILED",
            Self::InvalidLayout { .. } => "REGION:ALLOC:LAYOUT",
            Self::UnsupportedAlignment { .. } => "REGION:ALLOC:ALIGN",
            Self::InvalidConfig { .. } => "REGION:CONFIG:INVALID",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(size, align, "region heap allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create allocation failed error from layout
    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    /// Create invalid layout error
    pub fn invalid_layout(reason: &str) -> Self {
        Self::InvalidLayout {
            reason: reason.to_string(),
        }
    }

    /// Create unsupported alignment error
    pub fn unsupported_alignment(align: usize, max: usize) -> Self {
        Self::UnsupportedAlignment { align, max }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failed_mentions_size() {
        let error = PoolError::allocation_failed(1024, 16);
        assert!(error.to_string().contains("1024"));
        assert!(error.to_string().contains("16"));
    }

    #[test]
    fn error_with_layout() {
        let layout = Layout::new::<u64>();
        let error = PoolError::allocation_failed_with_layout(layout);
        assert_eq!(
            error,
            PoolError::AllocationFailed {
                size: 8,
                align: layout.align()
            }
        );
    }

    #[test]
    fn error_codes() {
        assert_eq!(PoolError::allocation_failed(1, 1).code(), "REGION:ALLOC:FAILED");
        assert_eq!(PoolError::invalid_layout("x").code(), "REGION:ALLOC:LAYOUT");
        assert_eq!(
            PoolError::unsupported_alignment(64, 8).code(),
            "REGION:ALLOC:ALIGN"
        );
        assert_eq!(PoolError::invalid_config("x").code(), "REGION:CONFIG:INVALID");
    }

    #[test]
    fn retryable() {
        assert!(PoolError::allocation_failed(1, 1).is_retryable());
        assert!(!PoolError::unsupported_alignment(64, 8).is_retryable());
        assert!(!PoolError::invalid_config("size").is_retryable());
    }
}
