//! Byte-oriented access to a device through `hadris_io` traits.
//!
//! [`ByteAdapter`] pairs a registry handle with a device id, a byte
//! cursor, and a block-sized scratch buffer, translating byte-oriented
//! I/O into block transfers. Each `read`/`write` call processes at most
//! one block's worth of data; the `read_exact`/`write_all` default
//! methods in `hadris_io` loop as needed. Writes are read-modify-write
//! at block granularity.

use alloc::vec;
use alloc::vec::Vec;

use hadris_io::{Error, ErrorKind, Read, Result as IoResult, Seek, SeekFrom, Write};

use crate::BLOCK_SIZE;
use crate::device::DeviceId;
use crate::error::BlkmapError;
use crate::registry::DeviceRegistry;

/// Adapts a device to `hadris_io::Read + Seek + Write`.
///
/// Capacity is snapshotted at construction from the device's mapped
/// extent; slices added afterwards are not visible through an existing
/// adapter. Byte ranges over unmapped parts of the device surface as
/// I/O errors, matching the underlying coverage rule.
pub struct ByteAdapter<'a> {
    registry: &'a DeviceRegistry,
    id: DeviceId,
    /// Current byte position within the device.
    position: u64,
    /// Scratch buffer for single-block reads and read-modify-write.
    block_buf: Vec<u8>,
    /// Device size in bytes at construction.
    total_size: u64,
}

impl<'a> ByteAdapter<'a> {
    /// Creates an adapter over device `id`.
    ///
    /// # Errors
    ///
    /// [`BlkmapError::NotFound`] if `id` is not live.
    pub fn new(
        registry: &'a DeviceRegistry,
        id: DeviceId,
    ) -> Result<Self, BlkmapError> {
        let device = registry.device(id)?;
        let total_size = device.block_count().saturating_mul(BLOCK_SIZE as u64);
        Ok(Self {
            registry,
            id,
            position: 0,
            block_buf: vec![0u8; BLOCK_SIZE],
            total_size,
        })
    }
}

impl Read for ByteAdapter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if buf.is_empty() || self.position >= self.total_size {
            return Ok(0);
        }

        let blknr = self.position / BLOCK_SIZE as u64;
        let offset = (self.position % BLOCK_SIZE as u64) as usize;

        self.registry
            .read(self.id, blknr, &mut self.block_buf)
            .map_err(|_| Error::from_kind(ErrorKind::Other))?;

        let available = BLOCK_SIZE - offset;
        let remaining = (self.total_size - self.position) as usize;
        let to_copy = buf.len().min(available).min(remaining);

        buf[..to_copy].copy_from_slice(&self.block_buf[offset..offset + to_copy]);
        self.position += to_copy as u64;

        Ok(to_copy)
    }
}

impl Seek for ByteAdapter<'_> {
    fn seek(&mut self, pos: SeekFrom) -> IoResult<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.total_size as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "seek to negative position",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl Write for ByteAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        if buf.is_empty() || self.position >= self.total_size {
            return Ok(0);
        }

        let blknr = self.position / BLOCK_SIZE as u64;
        let offset = (self.position % BLOCK_SIZE as u64) as usize;

        // Read-modify-write: fetch the block, overlay, write back.
        self.registry
            .read(self.id, blknr, &mut self.block_buf)
            .map_err(|_| Error::from_kind(ErrorKind::Other))?;

        let available = BLOCK_SIZE - offset;
        let remaining = (self.total_size - self.position) as usize;
        let to_write = buf.len().min(available).min(remaining);

        self.block_buf[offset..offset + to_write].copy_from_slice(&buf[..to_write]);

        self.registry
            .write(self.id, blknr, &self.block_buf)
            .map_err(|_| Error::from_kind(ErrorKind::Other))?;

        self.position += to_write as u64;
        Ok(to_write)
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DEV0: DeviceId = DeviceId::new(0);

    /// Device whose two blocks swap the two blocks of `region`.
    fn swapped_device(registry: &mut DeviceRegistry, base: usize) {
        registry.create(DEV0).expect("create");
        // SAFETY: the region at `base` covers 2 blocks and outlives the
        // registry use in each test.
        unsafe {
            registry
                .map_mem(DEV0, 0, 1, base + BLOCK_SIZE)
                .expect("map block 0");
            registry.map_mem(DEV0, 1, 1, base).expect("map block 1");
        }
    }

    #[test]
    fn read_across_slice_boundary_at_byte_offset() {
        let mut region = vec![0u8; 2 * BLOCK_SIZE];
        region[..BLOCK_SIZE].fill(0x11);
        region[BLOCK_SIZE..].fill(0x22);
        let mut registry = DeviceRegistry::new();
        swapped_device(&mut registry, region.as_ptr() as usize);

        let mut adapter = ByteAdapter::new(&registry, DEV0).expect("adapter");
        adapter
            .seek(SeekFrom::Start(BLOCK_SIZE as u64 / 2))
            .expect("seek");
        let mut buf = [0u8; BLOCK_SIZE];
        adapter.read_exact(&mut buf).expect("read_exact");
        // Device block 0 is region block 1 (0x22) and vice versa.
        assert!(buf[..BLOCK_SIZE / 2].iter().all(|&b| b == 0x22));
        assert!(buf[BLOCK_SIZE / 2..].iter().all(|&b| b == 0x11));
    }

    #[test]
    fn read_stops_at_device_end() {
        let region = vec![0x33u8; 2 * BLOCK_SIZE];
        let mut registry = DeviceRegistry::new();
        swapped_device(&mut registry, region.as_ptr() as usize);

        let mut adapter = ByteAdapter::new(&registry, DEV0).expect("adapter");
        adapter.seek(SeekFrom::End(-10)).expect("seek");
        let mut buf = [0u8; 100];
        assert_eq!(adapter.read(&mut buf).expect("read"), 10);
        assert_eq!(adapter.read(&mut buf).expect("read at end"), 0);
    }

    #[test]
    fn write_is_read_modify_write() {
        let mut region = vec![0x44u8; 2 * BLOCK_SIZE];
        let mut registry = DeviceRegistry::new();
        swapped_device(&mut registry, region.as_mut_ptr() as usize);

        {
            let mut adapter = ByteAdapter::new(&registry, DEV0).expect("adapter");
            adapter.seek(SeekFrom::Start(100)).expect("seek");
            adapter.write_all(&[0xAA; 4]).expect("write_all");
        }

        // Device block 0 lives in region block 1.
        let block1 = &region[BLOCK_SIZE..];
        assert!(block1[..100].iter().all(|&b| b == 0x44));
        assert!(block1[100..104].iter().all(|&b| b == 0xAA));
        assert!(block1[104..].iter().all(|&b| b == 0x44));
        assert!(region[..BLOCK_SIZE].iter().all(|&b| b == 0x44));
    }

    #[test]
    fn seek_before_start_rejected() {
        let region = vec![0u8; 2 * BLOCK_SIZE];
        let mut registry = DeviceRegistry::new();
        swapped_device(&mut registry, region.as_ptr() as usize);

        let mut adapter = ByteAdapter::new(&registry, DEV0).expect("adapter");
        assert!(adapter.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn unmapped_byte_range_is_io_error() {
        let mut registry = DeviceRegistry::new();
        registry.create(DEV0).expect("create");
        registry.create(DeviceId::new(1)).expect("create window");
        // A hole: the window device claims 4 blocks but its target maps
        // nothing underneath.
        registry
            .map_device(DeviceId::new(1), 0, 4, DEV0, 0)
            .expect("window");

        let mut adapter =
            ByteAdapter::new(&registry, DeviceId::new(1)).expect("adapter");
        let mut buf = [0u8; 16];
        assert!(adapter.read(&mut buf).is_err());
    }

    #[test]
    fn adapter_requires_live_device() {
        let registry = DeviceRegistry::new();
        assert_eq!(
            ByteAdapter::new(&registry, DEV0).err(),
            Some(BlkmapError::NotFound)
        );
    }
}
