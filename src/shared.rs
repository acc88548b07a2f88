//! Memory regions shared between threads.
//!
//! When several sandboxed threads share one linear memory, growth must be
//! serialised: only one allocate, copy, commit and rebind sequence may be in
//! flight at a time. [`SharedRegion`] puts the region behind a mutex and
//! mirrors its size in an atomic, so the size can be observed (and no-op
//! resizes answered) without taking the lock.

use crate::backing::{BackingAllocator, HeapBacking};
use crate::error::GrowthError;
use crate::region::MemoryRegion;
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use thiserror::Error;

/// A [`MemoryRegion`] shared between threads. See the module level
/// documentation.
pub struct SharedRegion<B: BackingAllocator = HeapBacking> {
    region: Mutex<MemoryRegion<B>>,
    /// Mirror of `region.current_size()`, only updated while holding the lock.
    size: AtomicU64,
    max_size: u64,
}

/// A non-blocking resize which could not be performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryResizeError {
    /// Another thread is growing the region; retry later.
    #[error("another growth of the region is in flight")]
    Contended,
    #[error(transparent)]
    Growth(#[from] GrowthError),
}

impl<B: BackingAllocator> SharedRegion<B> {
    pub fn new(region: MemoryRegion<B>) -> Self {
        Self {
            size: AtomicU64::new(region.current_size()),
            max_size: region.max_size(),
            region: Mutex::new(region),
        }
    }

    /// Number of bytes currently backed.
    ///
    /// Growth by other threads may make this outdated immediately, but it
    /// never overestimates the size.
    pub fn current_size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Make sure the region is at least `requested_size` bytes large.
    ///
    /// If another thread is growing the region, this blocks until that growth
    /// completed and then re-checks whether growing is still needed.
    ///
    /// # Errors
    /// See [`MemoryRegion::resize`].
    pub fn resize(&self, requested_size: u64) -> Result<(), GrowthError> {
        if requested_size <= self.current_size() {
            return Ok(());
        }
        let mut region = self.region.lock();
        self.resize_locked(&mut region, requested_size)
    }

    /// Like [`Self::resize`], but fail with [`TryResizeError::Contended`]
    /// instead of blocking if another growth is in flight.
    ///
    /// # Errors
    /// Returns [`TryResizeError::Contended`] if the region is locked by
    /// another thread, and [`TryResizeError::Growth`] if growing failed.
    pub fn try_resize(&self, requested_size: u64) -> Result<(), TryResizeError> {
        if requested_size <= self.current_size() {
            return Ok(());
        }
        let Some(mut region) = self.region.try_lock() else {
            return Err(TryResizeError::Contended);
        };
        Ok(self.resize_locked(&mut region, requested_size)?)
    }

    fn resize_locked(
        &self,
        region: &mut MemoryRegion<B>,
        requested_size: u64,
    ) -> Result<(), GrowthError> {
        let observed = region.current_size();
        region.resize(requested_size)?;
        let committed = region.current_size();
        if committed != observed {
            // the mirror is only written under the lock, so it still holds
            // the size observed above
            let published = self.size.compare_exchange(
                observed,
                committed,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            debug_assert_eq!(published, Ok(observed), "region size mirror out of sync");
        }
        Ok(())
    }

    /// Run `f` with shared access to the region, blocking growth meanwhile.
    pub fn with_region<R>(&self, f: impl FnOnce(&MemoryRegion<B>) -> R) -> R {
        f(&self.region.lock())
    }

    /// Run `f` with exclusive access to the region.
    ///
    /// `f` may resize the region; the size mirror is updated afterwards.
    pub fn with_region_mut<R>(&self, f: impl FnOnce(&mut MemoryRegion<B>) -> R) -> R {
        let mut region = self.region.lock();
        let result = f(&mut region);
        self.size.store(region.current_size(), Ordering::Release);
        result
    }

    /// Unwrap the shared region.
    pub fn into_inner(self) -> MemoryRegion<B> {
        self.region.into_inner()
    }
}

impl<B: BackingAllocator> core::fmt::Debug for SharedRegion<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("current_size", &self.current_size())
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
