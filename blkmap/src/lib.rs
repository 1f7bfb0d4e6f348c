//! Composable virtual block devices.
//!
//! A blkmap device presents a logical block address space assembled from
//! disjoint, caller-declared slices. Each slice redirects a contiguous run
//! of logical blocks to a backing target: a region of memory, or a window
//! into another device. Reads and writes are gathered and scattered across
//! whichever slices cover the requested range; a range with any gap in its
//! coverage fails as a whole.
//!
//! Devices live in a [`DeviceRegistry`] keyed by [`DeviceId`]. Mapping
//! calls populate a device's [`SliceTable`]; [`DeviceRegistry::read`] and
//! [`DeviceRegistry::write`] run the I/O engine over it. Device-backed
//! slices hold registry ids, never direct references, so destroying a
//! referenced device degrades to a clean [`BlkmapError::NotFound`] on the
//! next transfer through it instead of a dangling pointer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod adapter;
pub mod backing;
pub mod device;
pub mod error;
pub mod registry;
pub mod slice;

mod io;

pub use adapter::ByteAdapter;
pub use backing::BackingTarget;
pub use device::{Blkmap, DeviceId};
pub use error::BlkmapError;
pub use registry::DeviceRegistry;
pub use slice::{BlockRange, Slice, SliceTable};

/// Size of one logical block in bytes, shared by every device and backing.
pub const BLOCK_SIZE: usize = 512;
