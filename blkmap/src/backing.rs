//! Backing targets: where a slice's blocks physically live.
//!
//! The set of backing kinds is small and fixed, so it is a closed tagged
//! variant matched exhaustively at the copy site rather than a trait
//! object. Variant fields stay private: a memory backing can only be
//! produced through the `unsafe` constructor that states the address
//! contract, which is what lets the I/O engine copy through the raw
//! address later without further checks.

use core::fmt;

use crate::device::DeviceId;

/// The physical or logical location a slice's blocks are redirected to.
#[derive(Debug, Clone)]
pub struct BackingTarget(BackingKind);

#[derive(Debug, Clone)]
pub(crate) enum BackingKind {
    /// Raw memory: slice block `k` lives at `addr + k * BLOCK_SIZE`.
    Memory { addr: usize },
    /// Another device's blocks, starting at `blknr`.
    Device { device: DeviceId, blknr: u64 },
}

impl BackingTarget {
    /// Creates a memory backing rooted at byte address `addr`.
    ///
    /// The backing holds the address only; the memory is neither owned
    /// nor freed by the mapping layer.
    ///
    /// # Safety
    ///
    /// For every slice built over this backing, `addr` must point at
    /// memory valid for reads and writes of the slice's full byte extent,
    /// must stay valid for as long as the mapping is in use, and must not
    /// alias the buffers handed to the I/O entry points.
    #[must_use]
    pub unsafe fn memory(addr: usize) -> Self {
        Self(BackingKind::Memory { addr })
    }

    /// Creates a backing that delegates to `device`, starting at its
    /// block `blknr`.
    #[must_use]
    pub fn device(device: DeviceId, blknr: u64) -> Self {
        Self(BackingKind::Device { device, blknr })
    }

    pub(crate) fn kind(&self) -> &BackingKind {
        &self.0
    }

    /// The delegated-to device id, `None` for memory backings.
    pub(crate) fn target_device(&self) -> Option<DeviceId> {
        match self.0 {
            BackingKind::Device { device, .. } => Some(device),
            BackingKind::Memory { .. } => None,
        }
    }
}

impl fmt::Display for BackingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BackingKind::Memory { addr } => write!(f, "mem {addr:#x}"),
            BackingKind::Device { device, blknr } => {
                write!(f, "device {device} block {blknr:#x}")
            }
        }
    }
}
