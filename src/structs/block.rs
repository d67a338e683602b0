use std::fmt::Display;

use bytemuck::Pod;

use super::*;
use crate::device::{read_block, write_block};

impl Block {
    /// Zero-filled block, not yet read from nor written to the device
    pub fn empty(index: u32) -> Self {
        Self {
            index,
            data: [0; BLOCK_SIZE],
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Deserialize a record starting at `position`
    pub(crate) fn read_any<T: Pod>(&self, position: usize) -> T {
        bytemuck::pod_read_unaligned(&self.data[position..position + size_of::<T>()])
    }

    /// Serialize a record starting at `position`
    pub(crate) fn write_any<T: Pod>(&mut self, position: usize, value: &T) {
        let raw = bytemuck::bytes_of(value);
        self.data[position..position + raw.len()].copy_from_slice(raw);
    }

    /// Copy bytes into the block and return ones exceeding its capacity
    pub(crate) fn write_bytes<'a>(&mut self, position: usize, data: &'a [u8]) -> &'a [u8] {
        let fits = usize::min(data.len(), BLOCK_SIZE - position);
        let (head, rest) = data.split_at(fits);
        self.data[position..position + fits].copy_from_slice(head);
        rest
    }

    /// Fill `buffer` from the block and return the number of bytes copied
    pub(crate) fn read_bytes(&self, position: usize, buffer: &mut [u8]) -> usize {
        let fits = usize::min(buffer.len(), BLOCK_SIZE - position);
        buffer[..fits].copy_from_slice(&self.data[position..position + fits]);
        fits
    }
}

impl PermanentIndexed for Block {
    fn load(
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<Self, Error> {
        if index >= superblock.total_blocks {
            return Err(Error::CorruptVolume);
        }
        let mut block = Self::empty(index);
        read_block(device, index, &mut block.data)?;
        Ok(block)
    }

    fn flush(
        &self,
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<(), Error> {
        if index >= superblock.total_blocks {
            return Err(Error::CorruptVolume);
        }
        write_block(device, index, &self.data)
    }
}

impl Display for Block {
    /// Hex dump, 16 bytes per row
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "block {}", self.index)?;
        for (row, chunk) in self.data.chunks(16).enumerate() {
            write!(f, "{:04x} ", row * 16)?;
            for byte in chunk {
                write!(f, " {byte:02x}")?;
            }
            write!(f, "  ")?;
            for &byte in chunk {
                let shown = if byte.is_ascii_graphic() { byte as char } else { '.' };
                write!(f, "{shown}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
