//! The I/O engine: gather/scatter transfers across a device's slices.
//!
//! A transfer resolves the requested range against the slice table and
//! walks the intersections in ascending block order — the order fixes
//! where each piece lands in the caller's buffer, so no reordering is
//! permitted. The union of intersections must equal the requested range
//! exactly; a gap anywhere, including at either end, fails the whole
//! operation with [`BlkmapError::UnmappedRange`] (bytes copied before the
//! gap was discovered are not a partial success).
//!
//! Memory backings copy directly through the mapped address; device
//! backings recurse into the target device's own transfer at the mapped
//! offset. Recursion terminates because cyclic mappings are rejected at
//! insert time.

use crate::BLOCK_SIZE;
use crate::backing::BackingKind;
use crate::device::DeviceId;
use crate::error::BlkmapError;
use crate::registry::DeviceRegistry;

/// Converts a buffer length into a whole number of blocks.
fn buffer_blocks(len: usize) -> Result<u64, BlkmapError> {
    if len % BLOCK_SIZE != 0 {
        return Err(BlkmapError::InvalidBuffer);
    }
    Ok((len / BLOCK_SIZE) as u64)
}

impl DeviceRegistry {
    /// Reads `buf.len() / BLOCK_SIZE` blocks starting at logical block
    /// `blknr` of device `id` into `buf`.
    ///
    /// Returns the number of blocks transferred — always the full count
    /// on success.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::InvalidBuffer`] if `buf` is not a whole number of
    /// blocks, [`BlkmapError::NotFound`] if `id` (or a device a slice
    /// delegates to) is not live, [`BlkmapError::UnmappedRange`] if the
    /// requested range is not completely covered by slices, and
    /// [`BlkmapError::InvalidRange`] if the range end overflows.
    pub fn read(
        &self,
        id: DeviceId,
        blknr: u64,
        buf: &mut [u8],
    ) -> Result<u64, BlkmapError> {
        let blkcnt = buffer_blocks(buf.len())?;
        let end = blknr
            .checked_add(blkcnt)
            .ok_or(BlkmapError::InvalidRange)?;
        let device = self.device(id)?;

        let mut cursor = blknr;
        for (slice, span) in device.table().resolve(blknr, blkcnt) {
            if span.blknr != cursor {
                return Err(BlkmapError::UnmappedRange);
            }
            let off = (span.blknr - blknr) as usize * BLOCK_SIZE;
            let len = span.blkcnt as usize * BLOCK_SIZE;
            let chunk = &mut buf[off..off + len];
            // Position of the intersection inside the slice.
            let skip = span.blknr - slice.blknr();
            match *slice.backing().kind() {
                BackingKind::Memory { addr } => {
                    let src = (addr + skip as usize * BLOCK_SIZE) as *const u8;
                    // SAFETY: the mapping contract (`BackingTarget::memory`)
                    // guarantees this range is valid and disjoint from `buf`.
                    unsafe {
                        core::ptr::copy_nonoverlapping(src, chunk.as_mut_ptr(), len);
                    }
                }
                BackingKind::Device { device: target, blknr: base } => {
                    let target_blknr = base
                        .checked_add(skip)
                        .ok_or(BlkmapError::InvalidRange)?;
                    self.read(target, target_blknr, chunk)?;
                }
            }
            cursor = span.end();
        }

        if cursor != end {
            return Err(BlkmapError::UnmappedRange);
        }
        Ok(blkcnt)
    }

    /// Writes `buf.len() / BLOCK_SIZE` blocks from `buf` into device
    /// `id` starting at logical block `blknr`.
    ///
    /// Returns the number of blocks transferred — always the full count
    /// on success. Same coverage requirement and failure modes as
    /// [`read`](Self::read).
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn write(
        &self,
        id: DeviceId,
        blknr: u64,
        buf: &[u8],
    ) -> Result<u64, BlkmapError> {
        let blkcnt = buffer_blocks(buf.len())?;
        let end = blknr
            .checked_add(blkcnt)
            .ok_or(BlkmapError::InvalidRange)?;
        let device = self.device(id)?;

        let mut cursor = blknr;
        for (slice, span) in device.table().resolve(blknr, blkcnt) {
            if span.blknr != cursor {
                return Err(BlkmapError::UnmappedRange);
            }
            let off = (span.blknr - blknr) as usize * BLOCK_SIZE;
            let len = span.blkcnt as usize * BLOCK_SIZE;
            let chunk = &buf[off..off + len];
            let skip = span.blknr - slice.blknr();
            match *slice.backing().kind() {
                BackingKind::Memory { addr } => {
                    let dst = (addr + skip as usize * BLOCK_SIZE) as *mut u8;
                    // SAFETY: the mapping contract (`BackingTarget::memory`)
                    // guarantees this range is valid and disjoint from `buf`.
                    unsafe {
                        core::ptr::copy_nonoverlapping(chunk.as_ptr(), dst, len);
                    }
                }
                BackingKind::Device { device: target, blknr: base } => {
                    let target_blknr = base
                        .checked_add(skip)
                        .ok_or(BlkmapError::InvalidRange)?;
                    self.write(target, target_blknr, chunk)?;
                }
            }
            cursor = span.end();
        }

        if cursor != end {
            return Err(BlkmapError::UnmappedRange);
        }
        Ok(blkcnt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
