//! Alignment helpers shared by the block chain and the pool

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use nebula_region::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline]
#[must_use]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
///
/// # Examples
/// ```
/// use nebula_region::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(12, 8));
/// ```
#[inline]
#[must_use]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Checks if a pointer is aligned to the given alignment
#[inline]
#[must_use]
pub fn is_aligned_ptr<T>(ptr: *const T, alignment: usize) -> bool {
    is_aligned(ptr as usize, alignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(60, 8), 64);
        assert_eq!(align_up(97, 8), 104);
    }

    #[test]
    fn pointer_alignment() {
        let value = 0u64;
        assert!(is_aligned_ptr(&raw const value, core::mem::align_of::<u64>()));
    }
}
