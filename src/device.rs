//! Block device adapter.
//!
//! The underlying device only knows 512-byte sectors. Every filesystem block is
//! two consecutive sectors, `2 * index` and `2 * index + 1`.

use std::fmt::Debug;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::trace;

use crate::structs::{BLOCK_SIZE, SECTORS_PER_BLOCK, SECTOR_SIZE};
use crate::Error;

pub trait SectorDevice: Read + Write + Seek + Debug + Send {
    /// Read sector at `lba` into the first [`SECTOR_SIZE`] bytes of `buffer`
    fn read_sector(&mut self, lba: u64, buffer: &mut [u8]) -> Result<(), Error> {
        self.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
        self.read_exact(&mut buffer[..SECTOR_SIZE])?;
        Ok(())
    }

    /// Write the first [`SECTOR_SIZE`] bytes of `buffer` to sector at `lba`
    fn write_sector(&mut self, lba: u64, buffer: &[u8]) -> Result<(), Error> {
        self.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
        self.write_all(&buffer[..SECTOR_SIZE])?;
        Ok(())
    }
}

impl SectorDevice for std::fs::File {}

impl SectorDevice for Cursor<Vec<u8>> {}

/// Read filesystem block `index`; a failing sector aborts the whole block
pub fn read_block(
    device: &mut dyn SectorDevice,
    index: u32,
    buffer: &mut [u8; BLOCK_SIZE],
) -> Result<(), Error> {
    trace!("Read block {index}");
    let lba = index as u64 * SECTORS_PER_BLOCK;
    let (first, second) = buffer.split_at_mut(SECTOR_SIZE);
    device.read_sector(lba, first)?;
    device.read_sector(lba + 1, second)?;
    Ok(())
}

/// Write filesystem block `index`; a failing sector aborts the whole block
pub fn write_block(
    device: &mut dyn SectorDevice,
    index: u32,
    buffer: &[u8; BLOCK_SIZE],
) -> Result<(), Error> {
    trace!("Write block {index}");
    let lba = index as u64 * SECTORS_PER_BLOCK;
    let (first, second) = buffer.split_at(SECTOR_SIZE);
    device.write_sector(lba, first)?;
    device.write_sector(lba + 1, second)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{read_block, write_block, SectorDevice};
    use crate::structs::{BLOCK_SIZE, SECTOR_SIZE};
    use crate::testing::FailingDevice;
    use crate::Error;

    #[test]
    fn block_spans_two_sectors() {
        let mut dev = Cursor::new(vec![0u8; 4 * BLOCK_SIZE]);
        let mut block = [0u8; BLOCK_SIZE];
        block[..SECTOR_SIZE].fill(0xAA);
        block[SECTOR_SIZE..].fill(0xBB);
        write_block(&mut dev, 2, &block).unwrap();
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_sector(4, &mut sector).unwrap();
        assert_eq!(sector, [0xAA; SECTOR_SIZE]);
        dev.read_sector(5, &mut sector).unwrap();
        assert_eq!(sector, [0xBB; SECTOR_SIZE]);
        let mut back = [0u8; BLOCK_SIZE];
        read_block(&mut dev, 2, &mut back).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn read_past_device_end() {
        let mut dev = Cursor::new(vec![0u8; BLOCK_SIZE + SECTOR_SIZE]);
        let mut block = [0u8; BLOCK_SIZE];
        assert!(matches!(
            read_block(&mut dev, 1, &mut block),
            Err(Error::Device(_))
        ));
    }

    #[test]
    fn failed_sector_propagates() {
        let (mut dev, switch) = FailingDevice::new(4 * BLOCK_SIZE);
        let block = [7u8; BLOCK_SIZE];
        write_block(&mut dev, 1, &block).unwrap();
        switch.fail();
        let mut back = [0u8; BLOCK_SIZE];
        assert!(matches!(
            read_block(&mut dev, 1, &mut back),
            Err(Error::Device(_))
        ));
        assert!(matches!(
            write_block(&mut dev, 1, &block),
            Err(Error::Device(_))
        ));
    }
}
