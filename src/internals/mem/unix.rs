//! Unix `mmap` private anonymous memory pages.

use core::ffi::c_void;
use core::ptr::NonNull;

/// Return the page size on the running system using the `rustix` crate.
pub fn page_size() -> usize {
    rustix::param::page_size()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PageAllocError {
    #[error("mapping length exceeds the address space")]
    TooLarge,
    #[error("could not map memory pages: {0}")]
    Mmap(rustix::io::Errno),
    #[error("could not lock memory pages: {0}")]
    Mlock(rustix::io::Errno),
}

/// Map `len` bytes of private anonymous memory. `len` must be a non-zero
/// multiple of the page size.
///
/// Unlike locked secret pages these mappings are reserved normally (no
/// `MAP_NORESERVE`): linear memory is written to immediately and must not be
/// reclaimed from under the sandbox.
///
/// # Errors
/// The function returns an `PageAllocError` if the `mmap` call fails.
pub(super) fn map_anonymous(len: usize) -> Result<NonNull<u8>, PageAllocError> {
    use rustix::mm::{MapFlags, ProtFlags};

    let addr: *mut c_void = core::ptr::null_mut();
    let prot = ProtFlags::READ | ProtFlags::WRITE;
    // FreeBSD and DragonflyBSD have a NOCORE flag, which hides the pages from
    // core dumps. Sandbox memory tends to be large so we don't dump it there.
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))] {
            let flags = MapFlags::PRIVATE | MapFlags::NOCORE;
        } else {
            let flags = MapFlags::PRIVATE;
        }
    }

    let ptr: *mut c_void = unsafe { rustix::mm::mmap_anonymous(addr, len, prot, flags) }
        .map_err(PageAllocError::Mmap)?;

    // SAFETY: if `mmap` is successful, the result is non-zero
    Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
}

/// Lock `len` bytes at `ptr` to physical memory.
///
/// # Safety
/// `ptr` must point to `len` bytes mapped by [`map_anonymous`].
pub(super) unsafe fn lock_pages(ptr: NonNull<u8>, len: usize) -> Result<(), PageAllocError> {
    unsafe { rustix::mm::mlock(ptr.as_ptr() as *mut c_void, len) }.map_err(PageAllocError::Mlock)
}

/// Unmap `len` bytes at `ptr`.
///
/// # Safety
/// `ptr` must point to `len` bytes mapped by [`map_anonymous`], which are not
/// used afterwards.
pub(super) unsafe fn unmap(ptr: NonNull<u8>, len: usize) {
    // SAFETY: caller guaranties we mapped these pages. `munmap` also unlocks
    // pages if they were locked so it is not necessary to `munlock` them.
    let res = unsafe { rustix::mm::munmap(ptr.as_ptr() as *mut c_void, len) };
    if let Err(errno) = res {
        // unmapping a mapping we own can only fail on kernel resource
        // exhaustion; leaking it is the only option left
        log::error!("could not unmap {len} bytes of linear memory: {errno}");
    }
}
