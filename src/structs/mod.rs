//! On-disk records of a JexFS volume.
//!
//! Every record is a packed, little-endian structure encoded and decoded with
//! [`bytemuck`]. Fields of packed structures must be copied out before they are
//! borrowed or formatted.

mod bitmap;
mod block;
mod directory_entry;
mod inode;
mod superblock;

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::device::SectorDevice;
use crate::Error;

pub use directory_entry::encode_name;
pub use inode::InodeKind;
pub use superblock::{
    Geometry, DEFAULT_INODE_TABLE_BLOCKS, DEFAULT_TOTAL_BLOCKS, DEFAULT_TOTAL_INODES,
};

pub const SECTOR_SIZE: usize = 512;
pub const BLOCK_SIZE: usize = 1024;
pub const SECTORS_PER_BLOCK: u64 = (BLOCK_SIZE / SECTOR_SIZE) as u64;
/// "JEXF"
pub const MAGIC_SIGNATURE: u32 = 0x4A45_5846;
pub const SUPERBLOCK_INDEX: u32 = 1;
pub const ROOT_INODE: u32 = 1;
/// Inode number 0 means "no inode" in directory entries
pub const NULL_INODE: u32 = 0;
/// Block pointer 0 means "hole" in inodes
pub const NULL_BLOCK: u16 = 0;
pub const DIRECT_BLOCKS: usize = 10;
pub const MAX_FILE_SIZE: u32 = (DIRECT_BLOCKS * BLOCK_SIZE) as u32;
pub const NAME_LENGTH: usize = 14;
pub const INODE_SIZE: usize = size_of::<Inode>();
pub const DIRECTORY_ENTRY_SIZE: usize = size_of::<DirectoryEntry>();
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRECTORY_ENTRY_SIZE;
pub const BITS_PER_BLOCK: u32 = (BLOCK_SIZE * 8) as u32;

/// Record stored at a computed position of the volume
pub(crate) trait PermanentIndexed: Sized {
    fn load(
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<Self, Error>;
    fn flush(
        &self,
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<(), Error>;
}

/// Record kind tracked by one of the two allocation bitmaps
pub trait AsBitmap {
    /// Bitmap block and number of valid bits
    fn bitmap_region(superblock: &Superblock) -> (u32, u32);
    fn label() -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Superblock {
    /// Magic signature
    pub(crate) magic: u32,
    /// Total count of blocks, reserved ones included
    pub(crate) total_blocks: u32,
    /// Total count of inodes, reserved ones included
    pub(crate) total_inodes: u32,
    /// Block holding the inode bitmap
    pub(crate) inode_bitmap_start: u32,
    /// Block holding the block bitmap
    pub(crate) block_bitmap_start: u32,
    /// First block of the packed inode table
    pub(crate) inode_table_start: u32,
    /// First block available for directory and file data
    pub(crate) data_start: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Inode {
    /// Free (0), file (1) or directory (2)
    pub(crate) mode: u16,
    /// Size in bytes
    pub(crate) size: u32,
    /// Last modification timestamp in seconds
    pub(crate) mtime: u32,
    /// Direct block pointers, [`NULL_BLOCK`] marks a hole
    pub(crate) blocks: [u16; DIRECT_BLOCKS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct DirectoryEntry {
    /// Target inode, [`NULL_INODE`] marks an empty slot
    pub(crate) inode: u16,
    /// Name padded with zeros, not terminated when all 14 bytes are used
    pub(crate) name: [u8; NAME_LENGTH],
}

#[derive(Debug, Clone)]
pub struct Block {
    /// Block's index
    pub(crate) index: u32,
    /// Raw data as bytes
    pub(crate) data: [u8; BLOCK_SIZE],
}

#[derive(Debug, Clone)]
pub struct Bitmap<T: AsBitmap> {
    /// Block holding the bits, one per index, least significant bit first
    pub(crate) bitfield: Block,
    /// Number of valid indexes
    pub(crate) count: u32,
    #[doc(hidden)]
    __type: PhantomData<T>,
}
