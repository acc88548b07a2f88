//! Growth and retry policies.
//!
//! [`GrowthPolicy`] decides how large a region should become when a caller
//! requests more memory than is currently backed. Growing by exactly the
//! requested amount makes a sequence of `n` small growths cost `O(n^2)` in
//! copies, so the policy *overgrows*: geometrically (a fraction of the old
//! size, optionally capped) or linearly (a fixed step).
//!
//! When the backing allocator refuses a target size, the region retries with
//! a smaller overgrowth. [`RetryPolicy`] produces the schedule of cut-down
//! factors the overgrowth is divided by: `1, 2, 4, ...`.

use crate::config::{GrowthMode, ValidatedConfig};
use crate::macros::{debug_precondition_growth, debug_precondition_page_size};
use crate::util::checked_align_up;

/// Computes target sizes for growing a region. See the module level
/// documentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPolicy {
    mode: GrowthMode,
    /// Floor for the target of the first growth of a region.
    min_first_growth: u64,
}

impl GrowthPolicy {
    pub fn new(mode: GrowthMode, min_first_growth: u64) -> Self {
        Self {
            mode,
            min_first_growth,
        }
    }

    pub fn mode(&self) -> GrowthMode {
        self.mode
    }

    pub fn min_first_growth(&self) -> u64 {
        self.min_first_growth
    }

    /// Size of the region after overgrowing from `old_size`, before the
    /// requested size, the first growth floor, alignment and the maximum are
    /// taken into account.
    fn overgrown_size(&self, old_size: u64, requested_size: u64, cut_down: u64) -> u64 {
        match self.mode {
            GrowthMode::Linear { step } => old_size.saturating_add(step / cut_down),
            GrowthMode::Geometric { factor, cap } => {
                // float to int casts saturate, and the factor is finite and
                // non-negative so this never produces garbage
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let overgrowth = (old_size as f64 * (factor / cut_down as f64)) as u64;
                let candidate = old_size.saturating_add(overgrowth);
                match cap {
                    Some(cap) => candidate.min(requested_size.saturating_add(cap)),
                    None => candidate,
                }
            }
        }
    }

    /// Compute the target size for growing a region of `old_size` bytes to
    /// fit `requested_size` bytes.
    ///
    /// `cut_down` divides the overgrowth; it is `1` on the first attempt and
    /// doubled on every retry. `first_growth` applies the first growth floor.
    ///
    /// Returns `None` iff `requested_size > max_size`. Otherwise the result is
    /// a multiple of `page_size`, at most `max_size` and at least
    /// `requested_size` rounded up to the page size (given that `max_size` is
    /// page aligned).
    ///
    /// `requested_size` must exceed `old_size`, `page_size` must be a power of
    /// two and `cut_down` must be non-zero.
    pub fn compute(
        &self,
        old_size: u64,
        requested_size: u64,
        max_size: u64,
        page_size: u64,
        cut_down: u64,
        first_growth: bool,
    ) -> Option<u64> {
        debug_precondition_growth!(old_size, requested_size);
        debug_precondition_page_size!(page_size);
        mirai_annotations::debug_checked_precondition!(cut_down != 0);

        if requested_size > max_size {
            return None;
        }

        let floor = if first_growth { self.min_first_growth } else { 0 };
        let target = floor
            .max(requested_size)
            .max(self.overgrown_size(old_size, requested_size, cut_down));
        // a target too large to align is certainly above the maximum
        let target = checked_align_up(target, page_size).map_or(max_size, |t| t.min(max_size));
        Some(target)
    }
}

impl From<&ValidatedConfig> for GrowthPolicy {
    fn from(config: &ValidatedConfig) -> Self {
        Self::new(config.growth_mode(), config.min_first_growth())
    }
}

/// Bounded retry schedule for allocation attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of allocation attempts; at least 1 and at most 63.
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a retry policy making `max_attempts` attempts.
    ///
    /// # Panics
    /// Panics if `max_attempts` is zero or above 63; validated configurations
    /// never are.
    pub fn new(max_attempts: u32) -> Self {
        mirai_annotations::checked_precondition!(
            (1..=63).contains(&max_attempts),
            "between 1 and 63 allocation attempts are supported"
        );
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The cut-down factors for each attempt, in order: `1, 2, 4, ...`.
    pub fn cut_down_factors(&self) -> CutDownFactors {
        CutDownFactors {
            next_attempt: 0,
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Iterator over the cut-down factors of a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct CutDownFactors {
    next_attempt: u32,
    max_attempts: u32,
}

impl Iterator for CutDownFactors {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next_attempt >= self.max_attempts {
            return None;
        }
        // `next_attempt < max_attempts <= 63` so the shift doesn't overflow
        let factor = 1_u64 << self.next_attempt;
        self.next_attempt += 1;
        Some(factor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.max_attempts - self.next_attempt) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CutDownFactors {}
