//! Growable linear memory regions.
//!
//! A [`MemoryRegion`] is a single contiguous byte buffer which code inside a
//! sandbox addresses by offset. It only ever grows, always in whole pages,
//! and never beyond its configured maximum.
//!
//! # Growing
//! [`MemoryRegion::resize`] is the growth controller. For a request above the
//! current size it asks the [`GrowthPolicy`] for a target size, generously
//! overgrown to amortise the cost of copying, and tries to allocate it. When
//! the [`BackingAllocator`] refuses, the overgrowth is cut down (halved) and
//! the allocation retried, up to the configured number of attempts. The
//! target never drops below the requested size rounded up to the page size.
//!
//! On success the region copies its old contents into the prefix of the new
//! buffer, drops the old buffer, commits the new size and finally rebinds its
//! views. On failure nothing changes at all.
//!
//! # Views
//! See [`crate::view`]. Handles acquired before a successful growth are
//! rejected afterwards.

use crate::backing::{AllocFailure, BackingAllocator, HeapBacking};
use crate::config::{GrowthConfig, OnFailure, ValidatedConfig};
use crate::error::{CreateError, GrowthError};
use crate::policy::{GrowthPolicy, RetryPolicy};
use crate::view::{element_range, Element, ViewError, ViewHandle, ViewKind, ViewRegistry};

/// Growth state of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthState {
    /// Not growing; the last growth (if any) succeeded.
    Stable,
    /// A growth is in progress. Never observable from outside `resize`.
    Growing,
    /// The last growth exhausted its allocation attempts. The region is
    /// unchanged and may be grown again later.
    Failed,
}

/// Counters describing the growth history of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthStats {
    /// Successful growths.
    pub growths: u64,
    /// Rejected allocation attempts, including those of successful growths.
    pub failed_attempts: u64,
    /// Growths which exhausted all allocation attempts.
    pub failed_growths: u64,
    /// Bytes copied from old buffers into new ones.
    pub bytes_copied: u64,
}

/// A growable linear memory region. See the module level documentation.
pub struct MemoryRegion<B: BackingAllocator = HeapBacking> {
    config: ValidatedConfig,
    policy: GrowthPolicy,
    retry: RetryPolicy,
    backing: B,
    // INVARIANT: `buffer.len() == current_size`
    buffer: B::Buffer,
    // INVARIANT: multiple of the page size, at most the maximum size, never
    // decreases
    current_size: u64,
    /// Whether the region ever grew; the first growth floor applies until it
    /// did.
    has_grown: bool,
    state: GrowthState,
    views: ViewRegistry,
    stats: GrowthStats,
}

impl MemoryRegion<HeapBacking> {
    /// Create a heap backed region.
    ///
    /// # Errors
    /// See [`MemoryRegion::new`].
    pub fn on_heap(config: &GrowthConfig) -> Result<Self, CreateError> {
        Self::new(config, HeapBacking::new())
    }
}

impl<B: BackingAllocator> MemoryRegion<B> {
    /// Create a region of `config.initial_size` bytes, allocated by
    /// `backing`.
    ///
    /// # Errors
    /// Returns [`CreateError::InvalidConfiguration`] if the configuration does
    /// not validate, and [`CreateError::Allocation`] if `backing` cannot
    /// provide the initial buffer.
    pub fn new(config: &GrowthConfig, mut backing: B) -> Result<Self, CreateError> {
        let config = config.validate()?;
        let initial_size = config.initial_size();
        let buffer = backing
            .try_allocate(initial_size)
            .and_then(|buffer| check_buffer_len(buffer, initial_size))
            .map_err(CreateError::Allocation)?;
        let views = ViewRegistry::new(&buffer);
        log::debug!(
            "created linear memory region of {} bytes (maximum {} bytes, page size {})",
            initial_size,
            config.max_size(),
            config.page_size()
        );

        Ok(Self {
            policy: GrowthPolicy::from(&config),
            retry: RetryPolicy::new(config.max_retries()),
            config,
            backing,
            buffer,
            current_size: initial_size,
            has_grown: false,
            state: GrowthState::Stable,
            views,
            stats: GrowthStats::default(),
        })
    }

    /// Number of bytes currently backed.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Hard ceiling of the region in bytes.
    pub fn max_size(&self) -> u64 {
        self.config.max_size()
    }

    pub fn page_size(&self) -> u64 {
        self.config.page_size()
    }

    /// Number of pages currently backed.
    pub fn size_in_pages(&self) -> u64 {
        self.current_size / self.page_size()
    }

    pub fn state(&self) -> GrowthState {
        self.state
    }

    pub fn stats(&self) -> GrowthStats {
        self.stats
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn backing_mut(&mut self) -> &mut B {
        &mut self.backing
    }

    /// Make sure the region is at least `requested_size` bytes large.
    ///
    /// Requests not above the current size succeed without doing anything.
    /// Otherwise the region grows to a page aligned target size of at least
    /// `requested_size`, typically more. See the module level documentation.
    ///
    /// Handles acquired before this call must not be used afterwards; they are
    /// rejected if the region grew.
    ///
    /// # Errors
    /// - [`GrowthError::RequestExceedsMax`] if `requested_size` exceeds the
    ///   maximum size.
    /// - [`GrowthError::AllocationFailed`] if every allocation attempt failed
    ///   and the region is configured with [`OnFailure::ReturnError`]. With
    ///   [`OnFailure::Abort`] the process is aborted instead.
    ///
    /// In both cases the region is left unchanged.
    pub fn resize(&mut self, requested_size: u64) -> Result<(), GrowthError> {
        if requested_size <= self.current_size {
            log::trace!(
                "resize to {} bytes is a no-op, region has {} bytes",
                requested_size,
                self.current_size
            );
            return Ok(());
        }
        let max_size = self.max_size();
        if requested_size > max_size {
            log::warn!(
                "refusing to grow region to {} bytes, maximum is {} bytes",
                requested_size,
                max_size
            );
            return Err(GrowthError::RequestExceedsMax {
                requested: requested_size,
                max: max_size,
            });
        }

        self.state = GrowthState::Growing;
        let mut attempts = 0_u32;
        for cut_down in self.retry.cut_down_factors() {
            attempts += 1;
            let Some(target) = self.policy.compute(
                self.current_size,
                requested_size,
                max_size,
                self.page_size(),
                cut_down,
                !self.has_grown,
            ) else {
                // unreachable since the request is checked against the maximum
                self.state = GrowthState::Stable;
                return Err(GrowthError::RequestExceedsMax {
                    requested: requested_size,
                    max: max_size,
                });
            };
            log::debug!(
                "growing region from {} to {} bytes (requested {}), attempt {} with cut-down {}",
                self.current_size,
                target,
                requested_size,
                attempts,
                cut_down
            );

            match self
                .backing
                .try_allocate(target)
                .and_then(|buffer| check_buffer_len(buffer, target))
            {
                Ok(buffer) => {
                    self.commit(buffer, target);
                    return Ok(());
                }
                Err(failure) => {
                    self.stats.failed_attempts += 1;
                    log::warn!("allocation attempt {attempts} failed: {failure}");
                }
            }
        }

        self.state = GrowthState::Failed;
        self.stats.failed_growths += 1;
        let err = GrowthError::AllocationFailed {
            requested: requested_size,
            current: self.current_size,
            attempts,
        };
        match self.config.on_failure() {
            OnFailure::ReturnError => Err(err),
            OnFailure::Abort => abort_on_failure(&err),
        }
    }

    /// Replace the buffer by `buffer` of `new_size` bytes, carrying over the
    /// old contents, and rebind the views.
    fn commit(&mut self, mut buffer: B::Buffer, new_size: u64) {
        let old: &[u8] = &self.buffer;
        let new: &mut [u8] = &mut buffer;
        new[..old.len()].copy_from_slice(old);
        let copied = old.len() as u64;

        // drops (releases) the old buffer
        self.buffer = buffer;
        self.current_size = new_size;
        self.views.rebind(&self.buffer);

        self.has_grown = true;
        self.state = GrowthState::Stable;
        self.stats.growths += 1;
        self.stats.bytes_copied += copied;
        log::debug!(
            "region grew to {} bytes ({} pages), copied {} bytes",
            new_size,
            self.size_in_pages(),
            copied
        );
    }

    /// Grow the region by at least `delta_pages` pages, like WebAssembly's
    /// `memory.grow`.
    ///
    /// Returns the size in pages *before* growing. The region may grow by more
    /// than `delta_pages` due to overgrowth.
    ///
    /// # Errors
    /// See [`Self::resize`]. Requests overflowing a `u64` are reported as
    /// [`GrowthError::RequestExceedsMax`].
    pub fn grow_pages(&mut self, delta_pages: u64) -> Result<u64, GrowthError> {
        let previous = self.size_in_pages();
        let requested = delta_pages
            .checked_mul(self.page_size())
            .and_then(|delta| delta.checked_add(self.current_size))
            .ok_or(GrowthError::RequestExceedsMax {
                requested: u64::MAX,
                max: self.max_size(),
            })?;
        self.resize(requested)?;
        Ok(previous)
    }

    /// Like [`Self::grow_pages`], but failure is reported as `-1`, as a
    /// native allocator reports failure with a null pointer.
    pub fn grow_pages_or_sentinel(&mut self, delta_pages: u64) -> i64 {
        match self.grow_pages(delta_pages) {
            Ok(previous) => i64::try_from(previous).unwrap_or(-1),
            Err(err) => {
                log::debug!("reporting failed growth to the sandbox: {err}");
                -1
            }
        }
    }

    /// Acquire a byte view of the whole region, valid until the next resize.
    pub fn acquire_view(&self) -> ViewHandle {
        self.views.issue(ViewKind::U8)
    }

    /// Acquire a typed view of the region, valid until the next resize.
    pub fn acquire_typed_view(&self, kind: ViewKind) -> ViewHandle {
        self.views.issue(kind)
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// The bytes covered by `view`.
    ///
    /// # Errors
    /// Returns [`ViewError::Stale`] if the region grew since `view` was
    /// acquired.
    pub fn view_bytes(&self, view: &ViewHandle) -> Result<&[u8], ViewError> {
        self.views.validate(view)?;
        Ok(&self.buffer[..view.byte_len()])
    }

    /// The bytes covered by `view`, mutably.
    ///
    /// # Errors
    /// Returns [`ViewError::Stale`] if the region grew since `view` was
    /// acquired.
    pub fn view_bytes_mut(&mut self, view: &ViewHandle) -> Result<&mut [u8], ViewError> {
        self.views.validate(view)?;
        Ok(&mut self.buffer[..view.byte_len()])
    }

    /// Read element `index` of the typed view `view`.
    ///
    /// # Errors
    /// Returns a [`ViewError`] if `view` is stale, is not a view of `T`, or
    /// `index` is out of bounds.
    pub fn load<T: Element>(&self, view: &ViewHandle, index: usize) -> Result<T, ViewError> {
        self.views.validate(view)?;
        check_kind::<T>(view)?;
        let range = element_range(view, index)?;
        Ok(T::read_le(&self.buffer[range]))
    }

    /// Write `value` to element `index` of the typed view `view`.
    ///
    /// # Errors
    /// Returns a [`ViewError`] if `view` is stale, is not a view of `T`, or
    /// `index` is out of bounds.
    pub fn store<T: Element>(
        &mut self,
        view: &ViewHandle,
        index: usize,
        value: T,
    ) -> Result<(), ViewError> {
        self.views.validate(view)?;
        check_kind::<T>(view)?;
        let range = element_range(view, index)?;
        value.write_le(&mut self.buffer[range]);
        Ok(())
    }
}

impl<B: BackingAllocator> core::fmt::Debug for MemoryRegion<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("current_size", &self.current_size)
            .field("max_size", &self.max_size())
            .field("page_size", &self.page_size())
            .field("state", &self.state)
            .field("generation", &self.views.generation())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Reject buffers which are not exactly `size` bytes: partial success is
/// failure.
fn check_buffer_len<T>(buffer: T, size: u64) -> Result<T, AllocFailure>
where
    T: core::ops::Deref<Target = [u8]>,
{
    let len = buffer.len() as u64;
    if len == size {
        Ok(buffer)
    } else {
        Err(AllocFailure::ShortBuffer { size, len })
    }
}

fn check_kind<T: Element>(view: &ViewHandle) -> Result<(), ViewError> {
    if view.kind() == T::KIND {
        Ok(())
    } else {
        Err(ViewError::KindMismatch {
            expected: T::KIND,
            actual: view.kind(),
        })
    }
}

#[cold]
fn abort_on_failure(err: &GrowthError) -> ! {
    if let GrowthError::AllocationFailed {
        requested,
        current,
        attempts,
    } = *err
    {
        log::error!(
            "out of memory: cannot grow linear memory to {requested} bytes, \
             {current} bytes available, {attempts} attempts made; aborting"
        );
    } else {
        log::error!("{err}; aborting");
    }
    std::process::abort()
}

#[cfg(test)]
impl<B: BackingAllocator> MemoryRegion<B> {
    /// Panic on inconsistent internal state.
    pub(crate) fn consistency_check(&self) {
        assert!(
            self.current_size % self.page_size() == 0,
            "MemoryRegion invariant: size page alignment"
        );
        assert!(
            self.current_size <= self.max_size(),
            "MemoryRegion invariant: size within maximum"
        );
        assert_eq!(
            self.buffer.len() as u64,
            self.current_size,
            "MemoryRegion invariant: buffer length matches size"
        );
        assert_eq!(
            self.views.byte_len() as u64,
            self.current_size,
            "MemoryRegion invariant: views bound to the current buffer"
        );
        assert!(
            self.state != GrowthState::Growing,
            "MemoryRegion consistency: no growth in progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::FaultyBacking;
    use crate::config::KIB;

    const PAGE: u64 = 4 * KIB;

    fn linear_config() -> GrowthConfig {
        GrowthConfig::default()
            .with_page_size(PAGE)
            .with_initial_size(4 * PAGE)
            .with_max_size(Some(64 * PAGE))
            .linear(4 * PAGE)
    }

    fn faulty_region(config: &GrowthConfig) -> MemoryRegion<FaultyBacking> {
        MemoryRegion::new(config, FaultyBacking::new(HeapBacking::new()))
            .expect("region creation failed")
    }

    #[test]
    fn create_consistency() {
        let region = MemoryRegion::on_heap(&linear_config()).expect("region creation failed");
        region.consistency_check();
        assert_eq!(region.current_size(), 4 * PAGE);
        assert_eq!(region.size_in_pages(), 4);
        assert_eq!(region.max_size(), 64 * PAGE);
        assert_eq!(region.state(), GrowthState::Stable);
    }

    #[test]
    fn create_rejects_invalid_config() {
        let config = linear_config().with_initial_size(PAGE + 1);
        let err = MemoryRegion::on_heap(&config).unwrap_err();
        assert!(matches!(err, CreateError::InvalidConfiguration(_)));
    }

    #[test]
    fn create_reports_initial_allocation_failure() {
        let mut backing = FaultyBacking::new(HeapBacking::new());
        backing.fail_always();
        let err = MemoryRegion::new(&linear_config(), backing).unwrap_err();
        assert!(matches!(
            err,
            CreateError::Allocation(AllocFailure::Injected { .. })
        ));
    }

    #[test]
    fn linear_growth_overgrows_by_step() {
        let mut region = faulty_region(&linear_config());
        region.resize(5 * PAGE).expect("resize failed");
        region.consistency_check();
        // 4 pages + 4 page step
        assert_eq!(region.current_size(), 8 * PAGE);
        assert_eq!(region.stats().growths, 1);
        assert_eq!(region.stats().bytes_copied, 4 * PAGE);
    }

    #[test]
    fn no_op_resize_does_not_allocate() {
        let mut region = faulty_region(&linear_config());
        region.backing_mut().clear_attempts();
        let generation = region.views().generation();
        for requested in [0, 1, 3 * PAGE, 4 * PAGE] {
            region.resize(requested).expect("no-op resize failed");
            region.consistency_check();
        }
        assert!(region.backing().attempts().is_empty());
        assert_eq!(region.current_size(), 4 * PAGE);
        assert_eq!(region.views().generation(), generation);
    }

    #[test]
    fn contents_survive_growth() {
        let mut region = faulty_region(&linear_config());
        let view = region.acquire_view();
        let bytes = region.view_bytes_mut(&view).expect("fresh view rejected");
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }

        region.resize(20 * PAGE).expect("resize failed");
        region.consistency_check();
        let view = region.acquire_view();
        let bytes = region.view_bytes(&view).expect("fresh view rejected");
        assert_eq!(bytes.len() as u64, region.current_size());
        for (i, &byte) in bytes[..(4 * PAGE) as usize].iter().enumerate() {
            assert_eq!(byte, (i % 251) as u8);
        }
        assert!(bytes[(4 * PAGE) as usize..].iter().all(|&b| b == 0));
    }

    #[test]
    fn retries_with_cut_down_overgrowth() {
        let config = linear_config().linear(16 * PAGE);
        let mut region = faulty_region(&config);
        region.backing_mut().clear_attempts();
        region.backing_mut().fail_next(2);

        region.resize(5 * PAGE).expect("resize failed");
        region.consistency_check();
        // 4 + 16, 4 + 8, 4 + 4 pages
        assert_eq!(
            region.backing().attempted_sizes(),
            vec![20 * PAGE, 12 * PAGE, 8 * PAGE]
        );
        assert_eq!(region.current_size(), 8 * PAGE);
        assert_eq!(region.stats().failed_attempts, 2);
        assert_eq!(region.state(), GrowthState::Stable);
    }

    #[test]
    fn exhausted_retries_leave_region_unchanged() {
        let mut region = faulty_region(&linear_config());
        region.backing_mut().clear_attempts();
        region.backing_mut().fail_always();
        let view = region.acquire_view();

        let err = region.resize(5 * PAGE).unwrap_err();
        assert_eq!(
            err,
            GrowthError::AllocationFailed {
                requested: 5 * PAGE,
                current: 4 * PAGE,
                attempts: 4
            }
        );
        assert!(err.is_recoverable());
        region.consistency_check();
        assert_eq!(region.current_size(), 4 * PAGE);
        assert_eq!(region.state(), GrowthState::Failed);
        assert_eq!(region.backing().attempts().len(), 4);
        // views were not rebound
        assert!(region.view_bytes(&view).is_ok());
        assert_eq!(region.stats().failed_growths, 1);
    }

    #[test]
    fn failed_region_can_grow_later() {
        let mut region = faulty_region(&linear_config());
        region.backing_mut().fail_always();
        assert!(region.resize(5 * PAGE).is_err());
        assert_eq!(region.state(), GrowthState::Failed);

        region.backing_mut().heal();
        region.resize(5 * PAGE).expect("resize after healing failed");
        region.consistency_check();
        assert_eq!(region.state(), GrowthState::Stable);
        assert!(region.current_size() >= 5 * PAGE);
    }

    #[test]
    fn request_above_max_is_fatal() {
        let mut region = faulty_region(&linear_config());
        region.backing_mut().clear_attempts();
        let err = region.resize(64 * PAGE + 1).unwrap_err();
        assert_eq!(
            err,
            GrowthError::RequestExceedsMax {
                requested: 64 * PAGE + 1,
                max: 64 * PAGE
            }
        );
        assert!(!err.is_recoverable());
        assert!(region.backing().attempts().is_empty());
        assert_eq!(region.state(), GrowthState::Stable);
        region.consistency_check();
    }

    #[test]
    fn growth_is_clamped_to_max() {
        let mut region = faulty_region(&linear_config().linear(64 * PAGE));
        region.resize(60 * PAGE).expect("resize failed");
        assert_eq!(region.current_size(), 64 * PAGE);
        region.consistency_check();
    }

    #[test]
    fn first_growth_floor() {
        let config = linear_config().with_min_first_growth(32 * PAGE);
        let mut region = faulty_region(&config);
        region.resize(5 * PAGE).expect("resize failed");
        assert_eq!(region.current_size(), 32 * PAGE);
        region.resize(33 * PAGE).expect("resize failed");
        // floor no longer applies: 32 + 4 pages
        assert_eq!(region.current_size(), 36 * PAGE);
        region.consistency_check();
    }

    /// Backing allocator handing out buffers one byte short.
    struct ShortBacking;

    impl BackingAllocator for ShortBacking {
        type Buffer = std::vec::Vec<u8>;

        fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure> {
            Ok(vec![0; (size as usize).saturating_sub(1)])
        }
    }

    #[test]
    fn short_buffers_count_as_failures() {
        let config = linear_config().with_initial_size(0);
        let mut region = MemoryRegion::new(&config, ShortBacking).expect("region creation failed");
        let err = region.resize(PAGE).unwrap_err();
        assert!(matches!(err, GrowthError::AllocationFailed { attempts: 4, .. }));
        assert_eq!(region.current_size(), 0);
        region.consistency_check();
    }

    #[test]
    fn stale_views_are_rejected() {
        let mut region = faulty_region(&linear_config());
        let old = region.acquire_typed_view(ViewKind::U32);
        region.resize(5 * PAGE).expect("resize failed");
        assert!(matches!(
            region.load::<u32>(&old, 0),
            Err(ViewError::Stale { .. })
        ));
        assert!(matches!(
            region.view_bytes(&old),
            Err(ViewError::Stale { .. })
        ));

        let fresh = region.acquire_typed_view(ViewKind::U32);
        assert_eq!(fresh.byte_len() as u64, region.current_size());
        assert!(region.load::<u32>(&fresh, 0).is_ok());
    }

    #[test]
    fn views_of_other_regions_are_rejected() {
        let mut large = faulty_region(&linear_config().with_initial_size(16 * PAGE));
        let mut small = faulty_region(&linear_config().with_initial_size(PAGE));
        // both regions are in their first generation
        assert_eq!(large.views().generation(), small.views().generation());

        let bytes = large.acquire_view();
        assert!(matches!(
            small.view_bytes(&bytes),
            Err(ViewError::Foreign { .. })
        ));
        assert!(matches!(
            small.view_bytes_mut(&bytes),
            Err(ViewError::Foreign { .. })
        ));
        assert!(matches!(
            small.load::<u8>(&bytes, 10_000),
            Err(ViewError::Foreign { .. })
        ));
        assert!(matches!(
            small.store(&bytes, 10_000, 1_u8),
            Err(ViewError::Foreign { .. })
        ));
        small.consistency_check();

        large.store(&bytes, 10_000, 1_u8).expect("view is fresh");
        assert_eq!(large.load::<u8>(&bytes, 10_000), Ok(1));
    }

    #[test]
    fn typed_access() {
        let mut region = faulty_region(&linear_config());
        let words = region.acquire_typed_view(ViewKind::I32);
        region.store(&words, 3, -7_i32).expect("store failed");
        assert_eq!(region.load::<i32>(&words, 3), Ok(-7));

        let bytes = region.acquire_view();
        assert_eq!(region.load::<u8>(&bytes, 12), Ok(0xF9));
        assert_eq!(
            region.load::<u16>(&bytes, 0),
            Err(ViewError::KindMismatch {
                expected: ViewKind::U16,
                actual: ViewKind::U8
            })
        );
        let len = words.len();
        assert_eq!(
            region.store(&words, len, 1_i32),
            Err(ViewError::OutOfBounds { index: len, len })
        );
    }

    #[test]
    fn grow_pages_reports_previous_size() {
        let mut region = faulty_region(&linear_config());
        assert_eq!(region.grow_pages(0), Ok(4));
        assert_eq!(region.grow_pages(1), Ok(4));
        assert_eq!(region.size_in_pages(), 8);
        assert_eq!(region.grow_pages_or_sentinel(100), -1);
        assert_eq!(
            region.grow_pages(u64::MAX),
            Err(GrowthError::RequestExceedsMax {
                requested: u64::MAX,
                max: 64 * PAGE
            })
        );
        region.backing_mut().fail_always();
        assert_eq!(region.grow_pages_or_sentinel(1), -1);
        assert_eq!(region.size_in_pages(), 8);
        region.consistency_check();
    }
}
