//! Configuration of a growable memory region.
//!
//! A [`GrowthConfig`] collects every recognised option. It is plain data (and
//! (de)serialisable with the `serde` feature); [`GrowthConfig::validate`]
//! checks it once and produces a [`ValidatedConfig`], the only form a
//! [`MemoryRegion`](crate::region::MemoryRegion) accepts internally.

use crate::util::{align_down, is_aligned};
use thiserror::Error;

/// 1 KiB.
pub const KIB: u64 = 1024;
/// 1 MiB.
pub const MIB: u64 = 1024 * KIB;
/// 1 GiB.
pub const GIB: u64 = 1024 * MIB;

/// Size of a WebAssembly page, the default region page size.
pub const WASM_PAGE_SIZE: u64 = 64 * KIB;

/// Upper bound used for regions configured without a maximum: the size of a
/// 32-bit sandbox address space.
pub const ADDRESS_SPACE_LIMIT: u64 = 4 * GIB;

/// How the overgrowth of a region is computed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GrowthMode {
    /// Grow by a fixed number of bytes beyond the old size.
    Linear {
        /// Overgrowth in bytes, divided by the cut-down factor on retries.
        step: u64,
    },
    /// Grow proportionally to the old size.
    Geometric {
        /// Fraction of the old size to overgrow by, e.g. `0.2` for 20%.
        factor: f64,
        /// Maximal overgrowth beyond the requested size, if any.
        cap: Option<u64>,
    },
}

impl Default for GrowthMode {
    fn default() -> Self {
        Self::Geometric {
            factor: 0.2,
            cap: Some(96 * MIB),
        }
    }
}

/// What to do when every allocation attempt of a resize failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OnFailure {
    /// Log a diagnostic and abort the process.
    Abort,
    /// Return [`GrowthError::AllocationFailed`](crate::GrowthError) to the
    /// caller.
    #[default]
    ReturnError,
}

/// Recognised configuration options of a memory region.
///
/// All sizes are in bytes. Use [`Default::default`] and the `with_*` methods
/// to build one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GrowthConfig {
    /// Alignment granularity of the region size; a power of two.
    pub page_size: u64,
    /// Size of the region at creation; page aligned.
    pub initial_size: u64,
    /// Hard ceiling, page aligned. `None` means unbounded, which is capped to
    /// [`ADDRESS_SPACE_LIMIT`].
    pub max_size: Option<u64>,
    /// Overgrowth strategy.
    pub growth_mode: GrowthMode,
    /// Floor for the target size of the first growth only.
    pub min_first_growth: u64,
    /// Number of allocation attempts per resize.
    pub max_retries: u32,
    /// Behaviour once all attempts are exhausted.
    pub on_failure: OnFailure,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            page_size: WASM_PAGE_SIZE,
            initial_size: 16 * MIB,
            max_size: Some(2 * GIB - WASM_PAGE_SIZE),
            growth_mode: GrowthMode::default(),
            min_first_growth: 0,
            max_retries: 4,
            on_failure: OnFailure::ReturnError,
        }
    }
}

impl GrowthConfig {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_initial_size(mut self, initial_size: u64) -> Self {
        self.initial_size = initial_size;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_growth_mode(mut self, growth_mode: GrowthMode) -> Self {
        self.growth_mode = growth_mode;
        self
    }

    /// Use linear growth with the given step.
    #[must_use]
    pub fn linear(self, step: u64) -> Self {
        self.with_growth_mode(GrowthMode::Linear { step })
    }

    /// Use geometric growth with the given factor and cap.
    #[must_use]
    pub fn geometric(self, factor: f64, cap: Option<u64>) -> Self {
        self.with_growth_mode(GrowthMode::Geometric { factor, cap })
    }

    #[must_use]
    pub fn with_min_first_growth(mut self, min_first_growth: u64) -> Self {
        self.min_first_growth = min_first_growth;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let page_size = self.page_size;
        if !page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo { page_size });
        }
        if page_size > ADDRESS_SPACE_LIMIT {
            return Err(ConfigError::PageSizeTooLarge { page_size });
        }
        let max_size = match self.max_size {
            Some(max_size) if !is_aligned(max_size, page_size) => {
                return Err(ConfigError::MaxNotAligned {
                    max_size,
                    page_size,
                });
            }
            Some(max_size) => max_size,
            None => align_down(ADDRESS_SPACE_LIMIT, page_size),
        };
        if !is_aligned(self.initial_size, page_size) {
            return Err(ConfigError::InitialNotAligned {
                initial_size: self.initial_size,
                page_size,
            });
        }
        if self.initial_size > max_size {
            return Err(ConfigError::InitialExceedsMax {
                initial_size: self.initial_size,
                max_size,
            });
        }
        match self.growth_mode {
            GrowthMode::Linear { step: 0 } => return Err(ConfigError::ZeroLinearStep),
            GrowthMode::Geometric { factor, .. } if !factor.is_finite() || factor < 0.0 => {
                return Err(ConfigError::InvalidFactor { factor });
            }
            _ => {}
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        // cut-down factors are powers of two, computed as `1 << attempt`
        if self.max_retries > 63 {
            return Err(ConfigError::TooManyRetries {
                max_retries: self.max_retries,
            });
        }

        Ok(ValidatedConfig {
            page_size,
            initial_size: self.initial_size,
            max_size,
            growth_mode: self.growth_mode,
            min_first_growth: self.min_first_growth,
            max_retries: self.max_retries,
            on_failure: self.on_failure,
        })
    }
}

/// A [`GrowthConfig`] which passed validation, with the maximum size
/// resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    page_size: u64,
    initial_size: u64,
    max_size: u64,
    growth_mode: GrowthMode,
    min_first_growth: u64,
    max_retries: u32,
    on_failure: OnFailure,
}

impl ValidatedConfig {
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn initial_size(&self) -> u64 {
        self.initial_size
    }

    /// Resolved ceiling; always page aligned.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn growth_mode(&self) -> GrowthMode {
        self.growth_mode
    }

    pub fn min_first_growth(&self) -> u64 {
        self.min_first_growth
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}

/// Invalid region configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("page size {page_size} is not a power of two")]
    PageSizeNotPowerOfTwo { page_size: u64 },
    #[error("page size {page_size} exceeds the address space limit")]
    PageSizeTooLarge { page_size: u64 },
    #[error("initial size {initial_size} is not a multiple of the page size {page_size}")]
    InitialNotAligned { initial_size: u64, page_size: u64 },
    #[error("maximum size {max_size} is not a multiple of the page size {page_size}")]
    MaxNotAligned { max_size: u64, page_size: u64 },
    #[error("initial size {initial_size} exceeds the maximum size {max_size}")]
    InitialExceedsMax { initial_size: u64, max_size: u64 },
    #[error("linear growth step must be non-zero")]
    ZeroLinearStep,
    #[error("geometric growth factor {factor} must be finite and non-negative")]
    InvalidFactor { factor: f64 },
    #[error("at least one allocation attempt is required")]
    ZeroRetries,
    #[error("{max_retries} allocation attempts exceed the supported maximum of 63")]
    TooManyRetries { max_retries: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GrowthConfig::default()
            .validate()
            .expect("default configuration rejected");
        assert_eq!(config.page_size(), WASM_PAGE_SIZE);
        assert_eq!(config.max_size(), 2 * GIB - WASM_PAGE_SIZE);
        assert_eq!(config.max_retries(), 4);
        assert_eq!(config.on_failure(), OnFailure::ReturnError);
    }

    #[test]
    fn unbounded_max_is_capped() {
        let config = GrowthConfig::default()
            .with_max_size(None)
            .validate()
            .expect("unbounded configuration rejected");
        assert_eq!(config.max_size(), ADDRESS_SPACE_LIMIT);
    }

    #[test]
    fn rejects_bad_page_size() {
        let err = GrowthConfig::default()
            .with_page_size(3000)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::PageSizeNotPowerOfTwo { page_size: 3000 });

        let err = GrowthConfig::default()
            .with_page_size(0)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::PageSizeNotPowerOfTwo { page_size: 0 });
    }

    #[test]
    fn rejects_unaligned_sizes() {
        let err = GrowthConfig::default()
            .with_initial_size(WASM_PAGE_SIZE + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InitialNotAligned { .. }));

        let err = GrowthConfig::default()
            .with_max_size(Some(GIB + 12))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MaxNotAligned { .. }));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = GrowthConfig::default()
            .with_initial_size(4 * MIB)
            .with_max_size(Some(2 * MIB))
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InitialExceedsMax {
                initial_size: 4 * MIB,
                max_size: 2 * MIB
            }
        );
    }

    #[test]
    fn rejects_bad_growth_parameters() {
        let err = GrowthConfig::default().linear(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroLinearStep);

        let err = GrowthConfig::default()
            .geometric(f64::NAN, None)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFactor { .. }));

        let err = GrowthConfig::default()
            .geometric(-0.5, None)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFactor { .. }));
    }

    #[test]
    fn rejects_bad_retry_count() {
        let err = GrowthConfig::default()
            .with_max_retries(0)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroRetries);

        let err = GrowthConfig::default()
            .with_max_retries(64)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::TooManyRetries { max_retries: 64 });
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_partial_config() {
        let json = r#"{
            "page_size": 4096,
            "initial_size": 8192,
            "growth_mode": { "linear": { "step": 16384 } },
            "on_failure": "abort"
        }"#;
        let config: GrowthConfig = serde_json::from_str(json).expect("invalid json config");
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.initial_size, 8192);
        assert_eq!(config.growth_mode, GrowthMode::Linear { step: 16384 });
        assert_eq!(config.on_failure, OnFailure::Abort);
        // unspecified options fall back to the defaults
        assert_eq!(config.max_retries, 4);
        assert!(config.validate().is_ok());
    }
}
