// https://github.com/rust-lang/rust/issues/32838
#![cfg_attr(feature = "nightly_allocator_api", feature(allocator_api))]
#![forbid(rust_2018_compatibility, unsafe_op_in_unsafe_fn)]
#![deny(future_incompatible, rust_2018_idioms)]
#![warn(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
//! `linmem` manages growable linear memory: the single contiguous byte region
//! backing the address space of a sandboxed program, such as a WebAssembly
//! instance. Code inside the sandbox addresses the region by offset; when it
//! needs more memory, the region grows.
//!
//! Growing is the hard part. This crate decides
//! - *whether* to grow: never shrink, never beyond a hard maximum,
//! - *by how much*: geometric or linear overgrowth, capped, in whole pages,
//! - *how safely*: allocation may fail at any time, in which case the
//!   overgrowth is cut down and the allocation retried a bounded number of
//!   times. Views onto the old buffer are invalidated on every successful
//!   growth and left untouched by failed ones.
//!
//! # Examples
//! ```
//! use linmem::config::{GrowthConfig, MIB};
//! use linmem::region::MemoryRegion;
//! use linmem::view::ViewKind;
//!
//! let config = GrowthConfig::default()
//!     .with_initial_size(MIB)
//!     .with_max_size(Some(64 * MIB));
//! let mut region = MemoryRegion::on_heap(&config).expect("could not create region");
//!
//! let words = region.acquire_typed_view(ViewKind::U32);
//! region.store(&words, 0, 0xC0FFEE_u32).expect("view is fresh");
//!
//! // the sandbox touched an address beyond the current size
//! region.resize(3 * MIB).expect("could not grow");
//! assert!(region.current_size() >= 3 * MIB);
//!
//! // `words` is stale now, acquire a new view
//! assert!(region.load::<u32>(&words, 0).is_err());
//! let words = region.acquire_typed_view(ViewKind::U32);
//! assert_eq!(region.load::<u32>(&words, 0), Ok(0xC0FFEE));
//! ```
//!
//! Allocation failure can be simulated with
//! [`FaultyBacking`](backing::FaultyBacking):
//!
//! ```
//! use linmem::backing::{FaultyBacking, HeapBacking};
//! use linmem::config::{GrowthConfig, MIB};
//! use linmem::region::MemoryRegion;
//! use linmem::GrowthError;
//!
//! let config = GrowthConfig::default().with_initial_size(MIB);
//! let backing = FaultyBacking::new(HeapBacking::new());
//! let mut region = MemoryRegion::new(&config, backing).expect("could not create region");
//!
//! region.backing_mut().fail_always();
//! assert!(matches!(
//!     region.resize(2 * MIB),
//!     Err(GrowthError::AllocationFailed { attempts: 4, .. })
//! ));
//! assert_eq!(region.current_size(), MIB);
//! ```
//!
//! # Cargo features
//! - `serde`: Implement `Serialize` and `Deserialize` for the configuration
//!   types in [`config`].
//! - `nightly_allocator_api` (requires nightly): Use the nightly allocator api
//!   from the standard library (actually the `core` crate), gated behind the
//!   nightly-only feature `allocator_api`, so [`backing::HeapBacking`] works
//!   with any `core::alloc::Allocator`. When disabled, the copy of the
//!   allocator api from the `allocator-api2` crate is used, available through
//!   `linmem::allocator_api`.
//! - `nightly` (requires nightly): Enable all nightly-only features.
//! - `dev`: This feature enables all features required to run the full
//!   test-suite, and should only be enabled for that purpose.
//!
//! # Logging
//! Growth decisions are logged through the [`log`](https://crates.io/crates/log)
//! facade; no logger is installed by this crate.

/// Re-exports the most important items of the [`allocator-api2` crate].
///
/// [`allocator-api2` crate]: https://crates.io/crates/allocator-api2
pub mod allocator_api {
    pub use allocator_api2::alloc::{Allocator, Global};
    pub use allocator_api2::vec::Vec;
}

mod internals;
mod macros;
mod util;

pub mod backing;
pub mod config;
pub mod error;
pub mod policy;
pub mod region;
pub mod shared;
pub mod view;

pub use error::{CreateError, GrowthError};
pub use region::MemoryRegion;
pub use util::{align_down, align_up, checked_align_up};
