//! The id-keyed table of live devices.
//!
//! All device lifecycle and mapping operations go through the registry.
//! Device-backed slices store [`DeviceId`]s and are resolved against the
//! registry on every transfer, so the reference graph between devices is
//! explicit and cycle detection is a walk over ids — never a call-stack
//! overflow.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;

use crate::backing::BackingTarget;
use crate::device::{Blkmap, DeviceId};
use crate::error::BlkmapError;
use crate::slice::Slice;

/// The table of live virtual devices.
///
/// Owned plainly by the caller; mutating operations take `&mut self` and
/// transfers take `&self`, so a multi-threaded embedding needs exactly
/// one exclusive lock around the registry and nothing finer.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Blkmap>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }

    /// Registers a new empty device under `id`.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::AlreadyExists`] if `id` is currently live.
    pub fn create(&mut self, id: DeviceId) -> Result<(), BlkmapError> {
        if self.devices.contains_key(&id) {
            return Err(BlkmapError::AlreadyExists);
        }
        self.devices.insert(id, Blkmap::new(id));
        log::info!("blkmap: created device {id}");
        Ok(())
    }

    /// Registers a new empty device under the lowest free id and
    /// returns it.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::AlreadyExists`] if the id space is exhausted.
    pub fn create_auto(&mut self) -> Result<DeviceId, BlkmapError> {
        let mut free = 0u32;
        for id in self.devices.keys() {
            if id.as_u32() != free {
                break;
            }
            free = free.checked_add(1).ok_or(BlkmapError::AlreadyExists)?;
        }
        let id = DeviceId::new(free);
        self.create(id)?;
        Ok(id)
    }

    /// Removes the device under `id`, discarding its slice table and all
    /// backing references.
    ///
    /// Backing memory and referenced devices are untouched; another
    /// device still mapping onto `id` sees [`BlkmapError::NotFound`] on
    /// its next transfer through it.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::NotFound`] if `id` is not live.
    pub fn destroy(&mut self, id: DeviceId) -> Result<(), BlkmapError> {
        match self.devices.remove(&id) {
            Some(_) => {
                log::info!("blkmap: destroyed device {id}");
                Ok(())
            }
            None => Err(BlkmapError::NotFound),
        }
    }

    /// Looks up a live device.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::NotFound`] if `id` is not live.
    pub fn device(&self, id: DeviceId) -> Result<&Blkmap, BlkmapError> {
        self.devices.get(&id).ok_or(BlkmapError::NotFound)
    }

    /// Number of live devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True if no device is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates live devices in ascending id order.
    pub fn devices(&self) -> impl Iterator<Item = &Blkmap> {
        self.devices.values()
    }

    /// Creates `id`, runs `f`, and destroys `id` again, propagating
    /// `f`'s value.
    ///
    /// The scoped form of the lifecycle: the device is released on every
    /// non-panicking exit path, including when `f` reports failure
    /// through its return value.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::AlreadyExists`] if `id` is live on entry;
    /// [`BlkmapError::NotFound`] if `f` itself destroyed the device.
    pub fn with_device<R>(
        &mut self,
        id: DeviceId,
        f: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, BlkmapError> {
        self.create(id)?;
        let result = f(self);
        self.destroy(id)?;
        Ok(result)
    }

    /// Maps `[blknr, blknr + blkcnt)` of device `id` onto the memory at
    /// byte address `addr`.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::NotFound`] if `id` is not live, plus the
    /// [`SliceTable::insert`](crate::slice::SliceTable::insert) errors.
    ///
    /// # Safety
    ///
    /// `addr` must point at memory valid for reads and writes of
    /// `blkcnt * BLOCK_SIZE` bytes, staying valid for as long as the
    /// mapping is in use, and must not alias buffers handed to
    /// [`read`](Self::read) or [`write`](Self::write).
    pub unsafe fn map_mem(
        &mut self,
        id: DeviceId,
        blknr: u64,
        blkcnt: u64,
        addr: usize,
    ) -> Result<(), BlkmapError> {
        // SAFETY: forwarded — the caller vouches for the address range.
        let backing = unsafe { BackingTarget::memory(addr) };
        self.map(id, blknr, blkcnt, backing)
    }

    /// Maps `[blknr, blknr + blkcnt)` of device `id` onto `target`'s
    /// blocks starting at `target_blknr`.
    ///
    /// Whether the window stays inside `target`'s own mapped extent is
    /// not policed here; an out-of-bounds window surfaces as
    /// [`BlkmapError::UnmappedRange`] on first use.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::NotFound`] if either device is not live;
    /// [`BlkmapError::CyclicMapping`] if `target` already reaches `id`
    /// through device-backed slices (including `target == id`); plus the
    /// [`SliceTable::insert`](crate::slice::SliceTable::insert) errors.
    pub fn map_device(
        &mut self,
        id: DeviceId,
        blknr: u64,
        blkcnt: u64,
        target: DeviceId,
        target_blknr: u64,
    ) -> Result<(), BlkmapError> {
        self.device(target)?;
        self.device(id)?;
        if self.reaches(target, id) {
            return Err(BlkmapError::CyclicMapping);
        }
        self.map(id, blknr, blkcnt, BackingTarget::device(target, target_blknr))
    }

    fn map(
        &mut self,
        id: DeviceId,
        blknr: u64,
        blkcnt: u64,
        backing: BackingTarget,
    ) -> Result<(), BlkmapError> {
        log::debug!("blkmap: device {id}: map {blknr:#x}+{blkcnt:#x} -> {backing}");
        let device = self.devices.get_mut(&id).ok_or(BlkmapError::NotFound)?;
        device.table_mut().insert(Slice::new(blknr, blkcnt, backing))
    }

    /// True if `needle` is reachable from `from` over device-backed
    /// slices. Ids of already-destroyed devices dead-end the walk.
    fn reaches(&self, from: DeviceId, needle: DeviceId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == needle {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(device) = self.devices.get(&current) {
                stack.extend(
                    device
                        .table()
                        .iter()
                        .filter_map(|s| s.backing().target_device()),
                );
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
