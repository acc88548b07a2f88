//! Small utilities used in other parts of the crate.
//!
//! Mainly page alignment arithmetic.

use mirai_annotations::checked_precondition;

/// Round `n` up to the smallest multiple of `page_size` which is at least `n`.
///
/// # Panics
/// Panics if `page_size` is zero or not a power of two, or if the aligned
/// value does not fit a `u64`. Both are programmer errors: page sizes are
/// validated when a region is created and sizes are bounded by the region
/// maximum.
#[must_use]
pub fn align_up(n: u64, page_size: u64) -> u64 {
    match checked_align_up(n, page_size) {
        Some(aligned) => aligned,
        None => panic!("aligning {n} up to {page_size} bytes overflows a u64"),
    }
}

/// Round `n` up to a multiple of `page_size`, returning `None` if the result
/// does not fit a `u64`.
///
/// # Panics
/// Panics if `page_size` is zero or not a power of two.
#[must_use]
pub fn checked_align_up(n: u64, page_size: u64) -> Option<u64> {
    checked_precondition!(
        page_size.is_power_of_two(),
        "page size must be a non-zero power of two"
    );
    // `page_size - 1` doesn't wrap as `page_size` is a power of 2, so >= 1
    let mask = page_size - 1;
    n.checked_add(mask).map(|n| n & !mask)
}

/// Round `n` down to a multiple of `page_size`.
///
/// # Panics
/// Panics if `page_size` is zero or not a power of two.
#[must_use]
pub fn align_down(n: u64, page_size: u64) -> u64 {
    checked_precondition!(
        page_size.is_power_of_two(),
        "page size must be a non-zero power of two"
    );
    n & !(page_size - 1)
}

/// Returns `true` iff `n` is a multiple of `page_size`.
pub(crate) fn is_aligned(n: u64, page_size: u64) -> bool {
    n & (page_size - 1) == 0
}

/// Convert a region size to a `usize`, if it fits the address space of the
/// running process.
pub(crate) fn size_to_usize(size: u64) -> Option<usize> {
    usize::try_from(size).ok()
}
