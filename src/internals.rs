//! Platform specific internals.

pub mod mem;
