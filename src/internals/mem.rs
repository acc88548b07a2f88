//! Helper functions for mapping memory pages and working with them.

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// A contiguous run of anonymous, zero initialised memory pages.
///
/// The mapping covers `len` rounded up to the system page size, but only the
/// first `len` bytes are exposed.
pub struct MappedPages {
    /// Pointer to the start of the mapping; dangling iff `len == 0`.
    ptr: NonNull<u8>,
    /// Number of bytes exposed through `Deref`.
    len: usize,
    /// Number of bytes actually mapped. Zero iff nothing was mapped.
    mapped_len: usize,
    /// This type owns the mapped memory as raw bytes
    _phantom_pagemem: core::marker::PhantomData<[u8]>,
}

// SAFETY: `MappedPages` exclusively owns its mapping, like a `Box<[u8]>`.
unsafe impl Send for MappedPages {}
// SAFETY: shared references only permit reads of the mapping.
unsafe impl Sync for MappedPages {}

impl MappedPages {
    /// An empty run of pages; maps nothing.
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            mapped_len: 0,
            _phantom_pagemem: core::marker::PhantomData,
        }
    }

    /// Map `len` bytes of zeroed memory, rounded up to whole system pages.
    /// If `lock` is set, the pages are additionally locked into physical
    /// memory.
    ///
    /// # Errors
    /// Returns a [`PageAllocError`] if the pages could not be mapped or
    /// locked. Nothing stays mapped on error.
    pub fn map_zeroed(len: usize, lock: bool) -> Result<Self, PageAllocError> {
        if len == 0 {
            return Ok(Self::empty());
        }
        let page_size = page_size();
        // `page_size` is a power of two; a length which cannot be rounded up
        // cannot be mapped either
        let mapped_len = len
            .checked_add(page_size - 1)
            .map(|l| l & !(page_size - 1))
            .ok_or(PageAllocError::TooLarge)?;
        let ptr = map_anonymous(mapped_len)?;
        let mut pages = Self {
            ptr,
            len,
            mapped_len,
            _phantom_pagemem: core::marker::PhantomData,
        };
        if lock {
            // if this fails then `pages` is unmapped by its drop implementation
            pages.lock()?;
        }
        Ok(pages)
    }

    /// Get a mutable pointer to the start of the mapping.
    pub fn as_ptr_mut(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Get a non-mutable pointer to the start of the mapping.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr() as *const u8
    }

    /// Number of bytes mapped, a multiple of the system page size.
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }

    fn lock(&mut self) -> Result<(), PageAllocError> {
        // SAFETY: `self.ptr` points to `self.mapped_len` mapped bytes
        unsafe { lock_pages(self.ptr, self.mapped_len) }
    }
}

impl Deref for MappedPages {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for reads of `len <= mapped_len` bytes (or
        // dangling with `len == 0`) for the lifetime of `self`; anonymous
        // mappings are zero initialised
        unsafe { core::slice::from_raw_parts(self.as_ptr(), self.len) }
    }
}

impl DerefMut for MappedPages {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for `deref`, and `&mut self` guaranties exclusive access
        unsafe { core::slice::from_raw_parts_mut(self.as_ptr_mut(), self.len) }
    }
}

impl Drop for MappedPages {
    fn drop(&mut self) {
        if self.mapped_len != 0 {
            // SAFETY: we mapped `mapped_len` bytes at `ptr` in the constructor
            // and they are not yet unmapped
            unsafe { unmap(self.ptr, self.mapped_len) }
        }
    }
}

impl core::fmt::Debug for MappedPages {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MappedPages")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("mapped_len", &self.mapped_len)
            .finish()
    }
}

cfg_if::cfg_if! {
    if #[cfg(miri)] {
        mod miri;
        pub use miri::{page_size, PageAllocError};
        use miri::{lock_pages, map_anonymous, unmap};
    } else if #[cfg(unix)] {
        mod unix;
        pub use unix::{page_size, PageAllocError};
        use unix::{lock_pages, map_anonymous, unmap};
    } else if #[cfg(windows)] {
        mod windows;
        pub use windows::{page_size, PageAllocError};
        use windows::{lock_pages, map_anonymous, unmap};
    }
}
