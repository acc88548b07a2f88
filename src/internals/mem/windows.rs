//! Windows `VirtualAlloc` memory page allocation.

use core::ffi::c_void;
use core::ptr::NonNull;

/// Return the page size on the running system by querying kernel32.lib.
pub fn page_size() -> usize {
    use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    let mut sysinfo = SYSTEM_INFO::default();
    let sysinfo_ptr = &mut sysinfo as *mut SYSTEM_INFO;
    // SAFETY: `sysinfo_ptr` points to a valid (empty/all zeros) `SYSTEM_INFO`
    unsafe { GetSystemInfo(sysinfo_ptr) };
    // the pagesize must always fit in a `usize` (on windows it is a `u32`)
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        sysinfo.dwPageSize as usize
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PageAllocError {
    #[error("mapping length exceeds the address space")]
    TooLarge,
    #[error("could not map memory pages")]
    VirtualAlloc,
    #[error("could not lock memory pages: {0}")]
    VirtualLock(windows::core::Error),
}

/// Reserve and commit `len` bytes of zeroed memory using `VirtualAlloc`.
///
/// # Errors
/// The function returns an `PageAllocError` if the `VirtualAlloc` call
/// fails.
pub(super) fn map_anonymous(len: usize) -> Result<NonNull<u8>, PageAllocError> {
    use windows::Win32::System::Memory::{
        VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_PROTECTION_FLAGS, PAGE_READWRITE,
        VIRTUAL_ALLOCATION_TYPE,
    };

    let alloc_type: VIRTUAL_ALLOCATION_TYPE = MEM_RESERVE | MEM_COMMIT;
    let protect: PAGE_PROTECTION_FLAGS = PAGE_READWRITE;

    let ptr: *mut c_void = unsafe { VirtualAlloc(None, len, alloc_type, protect) };
    NonNull::new(ptr as *mut u8).ok_or(PageAllocError::VirtualAlloc)
}

/// Lock `len` bytes at `ptr` to physical memory.
///
/// # Safety
/// `ptr` must point to `len` bytes mapped by [`map_anonymous`].
pub(super) unsafe fn lock_pages(ptr: NonNull<u8>, len: usize) -> Result<(), PageAllocError> {
    use windows::Win32::System::Memory::VirtualLock;

    unsafe { VirtualLock(ptr.as_ptr() as *const c_void, len) }.map_err(PageAllocError::VirtualLock)
}

/// Release the mapping at `ptr`.
///
/// # Safety
/// `ptr` must be the start of a mapping created by [`map_anonymous`], which
/// is not used afterwards.
pub(super) unsafe fn unmap(ptr: NonNull<u8>, len: usize) {
    use windows::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

    // SAFETY: caller guaranties we allocated this mapping; `MEM_RELEASE`
    // requires a size of 0 and releases the whole reservation
    if let Err(err) = unsafe { VirtualFree(ptr.as_ptr() as *mut c_void, 0, MEM_RELEASE) } {
        log::error!("could not release {len} bytes of linear memory: {err}");
    }
}
