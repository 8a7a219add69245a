//! Locked DMX universe buffers
//!
//! Each interface keeps one receive and one transmit buffer. Every access
//! holds that buffer's own lock for the whole read-modify-write, so the
//! network receive thread and the kernel never see a half-applied frame.

use parking_lot::Mutex;

use crate::{error::BridgeError, Result};

/// Channels in one DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// One 512-byte universe guarded by its own lock
#[derive(Debug)]
pub struct DmxBuffer {
    data: Mutex<[u8; UNIVERSE_SIZE]>,
}

impl Default for DmxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DmxBuffer {
    pub fn new() -> Self {
        Self {
            data: Mutex::new([0u8; UNIVERSE_SIZE]),
        }
    }

    /// Merge an incoming frame and return the `(channel, value)` pairs that
    /// differed from the buffer, in channel order
    ///
    /// The lock is released before the caller sees the changes, so it may
    /// read the buffer again while handling them. Bytes past the universe end
    /// are ignored.
    pub fn apply_frame(&self, frame: &[u8]) -> Vec<(usize, u8)> {
        let mut data = self.data.lock();
        let mut changes = Vec::new();

        for (channel, (slot, &value)) in data.iter_mut().zip(frame).enumerate() {
            if *slot != value {
                *slot = value;
                changes.push((channel, value));
            }
        }

        changes
    }

    /// Copy `count` channels starting at `offset`
    pub fn read_range(&self, offset: usize, count: usize) -> Result<Vec<u8>> {
        check_range(offset, count)?;
        let data = self.data.lock();
        Ok(data[offset..offset + count].to_vec())
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        check_range(offset, 1)?;
        Ok(self.data.lock()[offset])
    }

    /// Overwrite channels starting at `offset`
    pub fn write(&self, offset: usize, values: &[u8]) -> Result<()> {
        check_range(offset, values.len())?;
        let mut data = self.data.lock();
        data[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Copy of the whole universe
    pub fn snapshot(&self) -> [u8; UNIVERSE_SIZE] {
        *self.data.lock()
    }
}

fn check_range(offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= UNIVERSE_SIZE => Ok(()),
        _ => Err(BridgeError::ChannelRange { offset, len }),
    }
}
