//! Miri shims for memory mapping. Not accurate, but better than nothing.

use core::ptr::NonNull;
use std::alloc::Layout;

/// Page size shim for miri.
#[cfg(not(tarpaulin_include))]
pub fn page_size() -> usize {
    4096
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PageAllocError {
    #[error("mapping length exceeds the address space")]
    TooLarge,
    #[error("could not allocate memory pages")]
    Alloc,
}

fn layout(len: usize) -> Result<Layout, PageAllocError> {
    Layout::from_size_align(len, page_size()).map_err(|_| PageAllocError::TooLarge)
}

#[cfg(not(tarpaulin_include))]
pub(super) fn map_anonymous(len: usize) -> Result<NonNull<u8>, PageAllocError> {
    let layout = layout(len)?;
    // SAFETY: `len` is non-zero
    let ptr: *mut u8 = unsafe { std::alloc::alloc_zeroed(layout) };
    NonNull::new(ptr).ok_or(PageAllocError::Alloc)
}

#[cfg(not(tarpaulin_include))]
pub(super) unsafe fn lock_pages(_ptr: NonNull<u8>, _len: usize) -> Result<(), PageAllocError> {
    Ok(())
}

#[cfg(not(tarpaulin_include))]
pub(super) unsafe fn unmap(ptr: NonNull<u8>, len: usize) {
    // the layout was valid when allocating so it still is
    if let Ok(layout) = layout(len) {
        // SAFETY: we allocated this memory with the same layout in
        // `map_anonymous`
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}
