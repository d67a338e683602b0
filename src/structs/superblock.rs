use std::fmt::Display;

use log::{debug, warn};

use super::*;

pub const DEFAULT_TOTAL_BLOCKS: u32 = 1440;
pub const DEFAULT_TOTAL_INODES: u32 = 128;
pub const DEFAULT_INODE_TABLE_BLOCKS: u32 = 8;

const INODE_BITMAP_START: u32 = 2;
const BLOCK_BITMAP_START: u32 = 3;
const INODE_TABLE_START: u32 = 4;

/// Shape of a volume to be formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u32,
    pub total_inodes: u32,
    /// Blocks reserved for the inode table, data follows right after
    pub inode_table_blocks: u32,
}

impl Default for Geometry {
    /// A 1.44 MB floppy image with 128 inodes
    fn default() -> Self {
        Self {
            total_blocks: DEFAULT_TOTAL_BLOCKS,
            total_inodes: DEFAULT_TOTAL_INODES,
            inode_table_blocks: DEFAULT_INODE_TABLE_BLOCKS,
        }
    }
}

impl Superblock {
    pub fn new(geometry: &Geometry) -> Result<Self, Error> {
        let superblock = Self {
            magic: MAGIC_SIGNATURE,
            total_blocks: geometry.total_blocks,
            total_inodes: geometry.total_inodes,
            inode_bitmap_start: INODE_BITMAP_START,
            block_bitmap_start: BLOCK_BITMAP_START,
            inode_table_start: INODE_TABLE_START,
            data_start: INODE_TABLE_START.saturating_add(geometry.inode_table_blocks),
        };
        superblock.validate().map_err(|_| Error::InvalidGeometry)?;
        Ok(superblock)
    }

    /// Check magic and every geometry precondition the allocator relies on
    pub fn validate(&self) -> Result<(), Error> {
        let Self {
            magic,
            total_blocks,
            total_inodes,
            inode_bitmap_start,
            block_bitmap_start,
            inode_table_start,
            data_start,
        } = *self;
        if magic != MAGIC_SIGNATURE {
            warn!("Invalid magic {magic:#010x}");
            return Err(Error::CorruptVolume);
        }
        let ordered = SUPERBLOCK_INDEX < inode_bitmap_start
            && inode_bitmap_start < block_bitmap_start
            && block_bitmap_start < inode_table_start
            && inode_table_start < data_start
            && data_start < total_blocks;
        if !ordered {
            warn!("Volume regions overlap or exceed {total_blocks} blocks");
            return Err(Error::CorruptVolume);
        }
        if total_blocks > BITS_PER_BLOCK || total_inodes > BITS_PER_BLOCK {
            warn!("Bitmaps for {total_blocks} blocks and {total_inodes} inodes exceed one block");
            return Err(Error::CorruptVolume);
        }
        if total_inodes <= ROOT_INODE {
            warn!("Volume has no room for the root inode");
            return Err(Error::CorruptVolume);
        }
        let table_bytes = (data_start - inode_table_start) as u64 * BLOCK_SIZE as u64;
        if (total_inodes as u64) * (INODE_SIZE as u64) > table_bytes {
            warn!("Inode table too small for {total_inodes} inodes");
            return Err(Error::CorruptVolume);
        }
        Ok(())
    }

    /// Block and byte offset where inode `index` starts.
    /// A record may continue into the following block.
    pub fn inode_position(&self, index: u32) -> Result<(u32, usize), Error> {
        if index >= self.total_inodes {
            return Err(Error::NotFound);
        }
        let byte = index as usize * INODE_SIZE;
        let block = self.inode_table_start + (byte / BLOCK_SIZE) as u32;
        Ok((block, byte % BLOCK_SIZE))
    }

    pub(crate) fn load(device: &mut dyn SectorDevice) -> Result<Self, Error> {
        let mut raw = [0u8; BLOCK_SIZE];
        crate::device::read_block(device, SUPERBLOCK_INDEX, &mut raw)?;
        let superblock: Self = bytemuck::pod_read_unaligned(&raw[..size_of::<Self>()]);
        superblock.validate()?;
        debug!("Loaded superblock");
        Ok(superblock)
    }

    pub(crate) fn flush(&self, device: &mut dyn SectorDevice) -> Result<(), Error> {
        let mut raw = [0u8; BLOCK_SIZE];
        raw[..size_of::<Self>()].copy_from_slice(bytemuck::bytes_of(self));
        crate::device::write_block(device, SUPERBLOCK_INDEX, &raw)?;
        debug!("Flushed superblock");
        Ok(())
    }
}

impl Display for Superblock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            magic,
            total_blocks,
            total_inodes,
            inode_bitmap_start,
            block_bitmap_start,
            inode_table_start,
            data_start,
        } = *self;
        writeln!(f, "magic               {magic:#010x}")?;
        writeln!(f, "total blocks        {total_blocks}")?;
        writeln!(f, "total inodes        {total_inodes}")?;
        writeln!(f, "inode bitmap        {inode_bitmap_start}")?;
        writeln!(f, "block bitmap        {block_bitmap_start}")?;
        writeln!(f, "inode table         {inode_table_start}")?;
        write!(f, "data                {data_start}")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn default_geometry_layout() {
        let superblock = Superblock::new(&Geometry::default()).unwrap();
        let data_start = superblock.data_start;
        assert_eq!(data_start, 12);
        assert_eq!(size_of::<Superblock>(), 28);
        assert_eq!(INODE_SIZE, 30);
        assert_eq!(DIRECTORY_ENTRY_SIZE, 16);
        assert_eq!(ENTRIES_PER_BLOCK, 64);
    }

    #[test]
    fn rejects_impossible_geometry() {
        let too_many_inodes = Geometry {
            total_inodes: 1000,
            ..Geometry::default()
        };
        assert!(matches!(
            Superblock::new(&too_many_inodes),
            Err(Error::InvalidGeometry)
        ));
        let too_many_blocks = Geometry {
            total_blocks: BITS_PER_BLOCK + 1,
            ..Geometry::default()
        };
        assert!(Superblock::new(&too_many_blocks).is_err());
        let no_data = Geometry {
            total_blocks: 12,
            ..Geometry::default()
        };
        assert!(Superblock::new(&no_data).is_err());
    }

    #[test]
    fn inode_positions_straddle_blocks() {
        let superblock = Superblock::new(&Geometry::default()).unwrap();
        assert_eq!(superblock.inode_position(1).unwrap(), (4, 30));
        // 34 * 30 = 1020, four bytes short of the block end
        assert_eq!(superblock.inode_position(34).unwrap(), (4, 1020));
        assert_eq!(superblock.inode_position(35).unwrap(), (5, 26));
        assert!(matches!(
            superblock.inode_position(128),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn load_and_flush() {
        let mut dev = Cursor::new(vec![0u8; 4 * BLOCK_SIZE]);
        let superblock = Superblock::new(&Geometry::default()).unwrap();
        superblock.flush(&mut dev).unwrap();
        assert_eq!(&dev.get_ref()[BLOCK_SIZE..BLOCK_SIZE + 4], b"FXEJ");
        assert_eq!(Superblock::load(&mut dev).unwrap(), superblock);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut dev = Cursor::new(vec![0u8; 4 * BLOCK_SIZE]);
        assert!(matches!(
            Superblock::load(&mut dev),
            Err(Error::CorruptVolume)
        ));
    }
}
