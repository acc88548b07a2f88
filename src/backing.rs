//! Allocators materialising the backing buffer of a memory region.
//!
//! A [`BackingAllocator`] hands out fresh, zero filled buffers of an exact
//! size. It never resizes in place and never copies: when a region grows, the
//! region itself copies the old contents into the prefix of the new buffer
//! and then drops the old one.
//!
//! Allocation may fail at any time, for any size, without leaving a trace.
//! Regions react to failure by retrying with smaller sizes, see
//! [`crate::policy`].
//!
//! Provided implementations:
//! - [`HeapBacking`]: heap memory from an [`Allocator`] (the global allocator
//!   by default).
//! - [`MmapBacking`]: private anonymous page mappings, optionally locked into
//!   physical memory.
//! - [`FaultyBacking`]: wraps another backing allocator and injects failures,
//!   for tests and for simulating engine limits.

use crate::allocator_api::{Allocator, Global, Vec};
use crate::internals::mem;
use crate::util::size_to_usize;
use core::ops::{Deref, DerefMut};
use thiserror::Error;

pub mod faulty;
pub use faulty::{AllocAttempt, FaultyBacking};

pub use mem::{page_size as system_page_size, MappedPages, PageAllocError};

/// Source of backing buffers for a memory region. See the module level
/// documentation.
pub trait BackingAllocator {
    /// An owned, contiguous byte buffer.
    type Buffer: Deref<Target = [u8]> + DerefMut;

    /// Allocate a zero filled buffer of exactly `size` bytes.
    ///
    /// # Errors
    /// Returns an [`AllocFailure`] if the buffer cannot be provided. A failed
    /// call has no persistent side effect; in particular it is fine to retry
    /// with a different size.
    fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure>;
}

impl<B: BackingAllocator + ?Sized> BackingAllocator for &mut B {
    type Buffer = B::Buffer;

    fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure> {
        (**self).try_allocate(size)
    }
}

/// A single failed allocation attempt.
#[derive(Debug, Clone, Error)]
pub enum AllocFailure {
    #[error("{size} bytes do not fit the address space of this process")]
    ExceedsAddressSpace { size: u64 },
    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: u64 },
    #[error("could not map {size} bytes")]
    Map {
        size: u64,
        #[source]
        source: PageAllocError,
    },
    #[error("allocation of {size} bytes rejected by fault injection")]
    Injected { size: u64 },
    #[error("allocator returned {len} bytes instead of {size}")]
    ShortBuffer { size: u64, len: u64 },
}

impl AllocFailure {
    /// Size of the rejected allocation in bytes.
    pub fn size(&self) -> u64 {
        match *self {
            Self::ExceedsAddressSpace { size }
            | Self::OutOfMemory { size }
            | Self::Map { size, .. }
            | Self::Injected { size }
            | Self::ShortBuffer { size, .. } => size,
        }
    }
}

/// Backing buffers on the heap, allocated with `A`.
///
/// The default allocator is the global allocator. With the
/// `nightly_allocator_api` feature, any `core::alloc::Allocator` works.
#[derive(Debug, Clone, Default)]
pub struct HeapBacking<A: Allocator + Clone = Global> {
    alloc: A,
}

impl HeapBacking {
    /// Heap backing using the global allocator.
    pub const fn new() -> Self {
        Self { alloc: Global }
    }
}

impl<A: Allocator + Clone> HeapBacking<A> {
    /// Heap backing using `alloc` for every buffer.
    pub fn new_in(alloc: A) -> Self {
        Self { alloc }
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }
}

impl<A: Allocator + Clone> BackingAllocator for HeapBacking<A> {
    type Buffer = Vec<u8, A>;

    fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure> {
        let len = size_to_usize(size).ok_or(AllocFailure::ExceedsAddressSpace { size })?;
        let mut buffer = Vec::new_in(self.alloc.clone());
        buffer
            .try_reserve_exact(len)
            .map_err(|_| AllocFailure::OutOfMemory { size })?;
        // capacity is reserved, so this doesn't reallocate
        buffer.resize(len, 0);
        Ok(buffer)
    }
}

/// Backing buffers in private anonymous page mappings.
///
/// Each buffer is its own mapping, rounded up to the system page size. Large
/// regions thus never touch the heap, and their memory is returned to the
/// operating system as soon as the region outgrows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmapBacking {
    /// Lock mappings into physical memory.
    lock: bool,
}

impl MmapBacking {
    pub const fn new() -> Self {
        Self { lock: false }
    }

    /// Backing whose mappings are locked into physical memory, so sandbox
    /// memory is never written to swap (except possibly on hibernation).
    ///
    /// The amount of memory unprivileged processes may lock is very limited
    /// on Linux; exceeding it makes allocations fail, which growing regions
    /// handle like any other allocation failure.
    pub const fn locked() -> Self {
        Self { lock: true }
    }

    pub fn is_locked(&self) -> bool {
        self.lock
    }
}

impl BackingAllocator for MmapBacking {
    type Buffer = MappedPages;

    fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure> {
        let len = size_to_usize(size).ok_or(AllocFailure::ExceedsAddressSpace { size })?;
        MappedPages::map_zeroed(len, self.lock)
            .map_err(|source| AllocFailure::Map { size, source })
    }
}
