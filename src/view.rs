//! Views aliasing the backing buffer of a memory region.
//!
//! A [`ViewHandle`] is a small `Copy` token describing a typed window onto
//! the buffer of a region: its element kind, its length in elements and the
//! *generation* it was issued in. Handles never own or point to memory; all
//! access goes through the region, which checks the generation first.
//!
//! Every time the region replaces its buffer, the [`ViewRegistry`] is rebound:
//! the generation is bumped and the element counts are re-derived from the
//! new buffer length. Handles from older generations are rejected with
//! [`ViewError::Stale`], so no view ever observes a buffer whose length
//! disagrees with the region size. Each registry also carries an id unique
//! within the process; handles issued by another region are rejected with
//! [`ViewError::Foreign`].
//!
//! Consumers should acquire a fresh handle after *any* resize call, even one
//! which did not grow the region.

use crate::macros::impl_element;
use core::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Element type of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ViewKind {
    /// Every view kind, in declaration order.
    pub const ALL: [ViewKind; 10] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::F32,
        Self::F64,
    ];

    /// Size of a single element in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Non-owning handle to a typed view of a region buffer. See the module level
/// documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle {
    kind: ViewKind,
    /// Id of the issuing registry.
    registry: u64,
    generation: u64,
    /// Length in elements.
    len: usize,
}

impl ViewHandle {
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Generation of the buffer this handle was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes covered by the view.
    pub fn byte_len(&self) -> usize {
        self.len * self.kind.width()
    }
}

/// Invalid access through a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(
        "view from generation {handle} used after the buffer was replaced \
         (generation {current})"
    )]
    Stale { handle: u64, current: u64 },
    #[error("view issued by region {handle} used on region {region}")]
    Foreign { handle: u64, region: u64 },
    #[error("view of {handle} elements does not match the {current} elements of the buffer")]
    LengthMismatch { handle: usize, current: usize },
    #[error("{expected:?} access through a {actual:?} view")]
    KindMismatch { expected: ViewKind, actual: ViewKind },
    #[error("index {index} out of bounds for a view of {len} elements")]
    OutOfBounds { index: usize, len: usize },
}

/// Registry of the typed views onto a region buffer.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    id: u64,
    generation: u64,
    byte_len: usize,
    /// Element count per [`ViewKind`], indexed by `ViewKind::index`.
    lens: [usize; ViewKind::ALL.len()],
}

impl ViewRegistry {
    /// Registry for the initial buffer of a region; generation 0.
    pub(crate) fn new(buffer: &[u8]) -> Self {
        let mut registry = Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            byte_len: 0,
            lens: [0; ViewKind::ALL.len()],
        };
        registry.derive(buffer);
        registry
    }

    fn derive(&mut self, buffer: &[u8]) {
        self.byte_len = buffer.len();
        for kind in ViewKind::ALL {
            self.lens[kind.index()] = buffer.len() / kind.width();
        }
    }

    /// Invalidate every handle issued so far and re-derive the views over
    /// `buffer`.
    pub(crate) fn rebind(&mut self, buffer: &[u8]) {
        self.generation += 1;
        self.derive(buffer);
        log::trace!(
            "rebound views to {} bytes, generation {}",
            self.byte_len,
            self.generation
        );
    }

    /// Current generation; bumped by every rebind.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Process-wide unique id of this registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length in bytes of the buffer the views are bound to.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Issue a handle for a view of `kind` over the current buffer.
    pub fn issue(&self, kind: ViewKind) -> ViewHandle {
        ViewHandle {
            kind,
            registry: self.id,
            generation: self.generation,
            len: self.lens[kind.index()],
        }
    }

    /// Check that `handle` was issued by this registry for the current
    /// buffer.
    ///
    /// # Errors
    /// Returns [`ViewError::Foreign`] for handles of another registry,
    /// [`ViewError::Stale`] for handles issued before the last rebind and
    /// [`ViewError::LengthMismatch`] for handles not covering the current
    /// buffer.
    pub fn validate(&self, handle: &ViewHandle) -> Result<(), ViewError> {
        if handle.registry != self.id {
            return Err(ViewError::Foreign {
                handle: handle.registry,
                region: self.id,
            });
        }
        if handle.generation != self.generation {
            return Err(ViewError::Stale {
                handle: handle.generation,
                current: self.generation,
            });
        }
        let current = self.lens[handle.kind.index()];
        if handle.len != current {
            return Err(ViewError::LengthMismatch {
                handle: handle.len,
                current,
            });
        }
        Ok(())
    }
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Element types readable and writable through a view. Elements are stored
/// little-endian, like in WebAssembly linear memory.
pub trait Element: sealed::Sealed + Copy {
    /// The view kind for this element type.
    const KIND: ViewKind;

    /// Decode from exactly `KIND.width()` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `KIND.width()` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

impl_element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

/// Byte range of element `index` of `handle`.
pub(crate) fn element_range(
    handle: &ViewHandle,
    index: usize,
) -> Result<core::ops::Range<usize>, ViewError> {
    if index >= handle.len {
        return Err(ViewError::OutOfBounds {
            index,
            len: handle.len,
        });
    }
    let width = handle.kind.width();
    // `index < len` and `len * width <= buffer length` so this doesn't overflow
    let start = index * width;
    Ok(start..start + width)
}
