use super::*;

use fuser::{FileAttr, FileType};
use std::{
    fmt::Display,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Free = 0,
    File = 1,
    Directory = 2,
}

impl InodeKind {
    /// Unknown modes are treated as free
    pub fn from_mode(mode: u16) -> Self {
        match mode {
            1 => Self::File,
            2 => Self::Directory,
            _ => Self::Free,
        }
    }
}

pub(crate) fn timestamp_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

impl Inode {
    /// Empty record of given kind stamped with the current time
    pub fn new(kind: InodeKind) -> Self {
        Self {
            mode: kind as u16,
            size: 0,
            mtime: timestamp_now(),
            blocks: [NULL_BLOCK; DIRECT_BLOCKS],
        }
    }

    pub fn kind(&self) -> InodeKind {
        InodeKind::from_mode(self.mode)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mtime(&self) -> u32 {
        self.mtime
    }

    /// Pointer in direct slot, `None` past the last slot
    pub fn block(&self, slot: usize) -> Option<u16> {
        let blocks = self.blocks;
        blocks.get(slot).copied()
    }

    pub(crate) fn set_block(&mut self, slot: usize, pointer: u16) {
        let mut blocks = self.blocks;
        blocks[slot] = pointer;
        self.blocks = blocks;
    }

    /// Non-hole block pointers
    pub fn allocated_blocks(&self) -> impl Iterator<Item = u16> {
        let blocks = self.blocks;
        blocks.into_iter().filter(|&pointer| pointer != NULL_BLOCK)
    }

    pub(crate) fn touch(&mut self) {
        self.mtime = timestamp_now();
    }

    pub fn attrs(&self, index: u32, owner: (u32, u32)) -> FileAttr {
        let mtime = UNIX_EPOCH + Duration::from_secs(self.mtime as u64);
        let (kind, perm, nlink) = match self.kind() {
            InodeKind::Directory => (FileType::Directory, 0o755, 2),
            _ => (FileType::RegularFile, 0o644, 1),
        };
        FileAttr {
            ino: index as u64,
            size: self.size as u64,
            blocks: self.allocated_blocks().count() as u64 * (BLOCK_SIZE / 512) as u64,
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind,
            perm,
            nlink,
            uid: owner.0,
            gid: owner.1,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }
}

impl PermanentIndexed for Inode {
    fn load(
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<Self, Error> {
        let (position, offset) = superblock.inode_position(index)?;
        let mut raw = [0u8; INODE_SIZE];
        let read = Block::load(device, superblock, position)?.read_bytes(offset, &mut raw);
        if read < INODE_SIZE {
            Block::load(device, superblock, position + 1)?.read_bytes(0, &mut raw[read..]);
        }
        Ok(bytemuck::pod_read_unaligned(&raw))
    }

    fn flush(
        &self,
        device: &mut dyn SectorDevice,
        superblock: &Superblock,
        index: u32,
    ) -> Result<(), Error> {
        let (position, offset) = superblock.inode_position(index)?;
        let mut block = Block::load(device, superblock, position)?;
        let rest = block.write_bytes(offset, bytemuck::bytes_of(self));
        block.flush(device, superblock, position)?;
        if !rest.is_empty() {
            let mut next = Block::load(device, superblock, position + 1)?;
            next.write_bytes(0, rest);
            next.flush(device, superblock, position + 1)?;
        }
        Ok(())
    }
}

impl Display for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            mode,
            size,
            mtime,
            blocks,
        } = *self;
        writeln!(f, "mode    {mode} ({:?})", self.kind())?;
        writeln!(f, "size    {size}")?;
        writeln!(f, "mtime   {mtime}")?;
        write!(f, "blocks  {blocks:?}")
    }
}
