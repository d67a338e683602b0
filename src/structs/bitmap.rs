use std::fmt::Display;

use super::*;

impl AsBitmap for Inode {
    fn bitmap_region(superblock: &Superblock) -> (u32, u32) {
        (superblock.inode_bitmap_start, superblock.total_inodes)
    }

    fn label() -> &'static str {
        "inodes"
    }
}

impl AsBitmap for Block {
    fn bitmap_region(superblock: &Superblock) -> (u32, u32) {
        (superblock.block_bitmap_start, superblock.total_blocks)
    }

    fn label() -> &'static str {
        "blocks"
    }
}

impl<T: AsBitmap> Bitmap<T> {
    /// Return bitmap with every index free
    pub(crate) fn new(superblock: &Superblock) -> Self {
        let (position, count) = T::bitmap_region(superblock);
        Self {
            bitfield: Block::empty(position),
            count,
            __type: PhantomData,
        }
    }

    /// Load bitmap from block device
    pub(crate) fn load(
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
    ) -> Result<Self, Error> {
        let (position, count) = T::bitmap_region(superblock);
        Ok(Self {
            bitfield: Block::load(device, superblock, position)?,
            count,
            __type: PhantomData,
        })
    }

    /// Flush bitmap to block device
    pub(crate) fn flush(
        &self,
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
    ) -> Result<(), Error> {
        self.bitfield
            .flush(device, superblock, self.bitfield.index)
    }

    /// Get occupancy, indexes past the end are never occupied
    pub fn get(&self, index: u32) -> bool {
        if index >= self.count {
            return false;
        }
        let row = (index / 8) as usize;
        let col = index % 8;
        self.bitfield.data[row] & (1u8 << col) != 0
    }

    /// Modify occupancy
    pub(crate) fn set(&mut self, index: u32, value: bool) -> Result<(), Error> {
        if index >= self.count {
            return Err(Error::NotFound);
        }
        let row = (index / 8) as usize;
        let col = index % 8;
        if value {
            self.bitfield.data[row] |= 1u8 << col;
        } else {
            self.bitfield.data[row] &= !(1u8 << col);
        }
        Ok(())
    }

    /// First free index at or after `start`, lowest index wins
    pub(crate) fn next_free(&self, start: u32) -> Option<u32> {
        (start..self.count).find(|&index| !self.get(index))
    }

    /// Number of occupied indexes
    pub fn used(&self) -> u32 {
        (0..self.count).filter(|&index| self.get(index)).count() as u32
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl<T: AsBitmap> Display for Bitmap<T> {
    /// Occupied ranges, e.g. `inodes 3/128 used: 0-2`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{} used:", T::label(), self.used(), self.count)?;
        let mut index = 0;
        while index < self.count {
            if !self.get(index) {
                index += 1;
                continue;
            }
            let start = index;
            while index + 1 < self.count && self.get(index + 1) {
                index += 1;
            }
            if start == index {
                write!(f, " {start}")?;
            } else {
                write!(f, " {start}-{index}")?;
            }
            index += 1;
        }
        Ok(())
    }
}
