use super::{BlockCursor, RegularFile};
use crate::structs::{Block, Inode, InodeKind, DIRECT_BLOCKS, NULL_BLOCK};
use crate::{Error, Filesystem};

use log::debug;

impl RegularFile {
    /// Allocate an empty file inode; linking it is up to the caller
    pub fn new(fs: &mut Filesystem) -> Result<Self, Error> {
        let index = fs.acquire_inode()?;
        let inode = Inode::new(InodeKind::File);
        if let Err(e) = fs.flush_inode(index, &inode) {
            fs.release_inode(index)?;
            return Err(e);
        }
        debug!("Created regular file {index}");
        Ok(Self { index, inode })
    }

    pub fn load(fs: &mut Filesystem, index: u32) -> Result<Self, Error> {
        let inode = fs.load_inode(index)?;
        match inode.kind() {
            InodeKind::File => Ok(Self { index, inode }),
            InodeKind::Directory => Err(Error::NotAFile),
            InodeKind::Free => Err(Error::NotFound),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.inode.size()
    }

    /// Read up to `buffer.len()` bytes starting at `offset`.
    /// Stops early at end of file, at a hole, or past the last direct block.
    pub fn read(&self, fs: &mut Filesystem, offset: u32, buffer: &mut [u8]) -> Result<usize, Error> {
        let size = self.inode.size();
        if offset >= size {
            return Ok(0);
        }
        let wanted = usize::min(buffer.len(), (size - offset) as usize);
        let mut cursor = BlockCursor::new(offset as usize);
        let mut total = 0;
        while total < wanted {
            let pointer = match self.inode.block(cursor.block()) {
                Some(NULL_BLOCK) | None => {
                    debug!("Short read of file {} at {}", self.index, cursor.position());
                    break;
                }
                Some(pointer) => pointer,
            };
            let block = fs.load_block(pointer as u32)?;
            let read = block.read_bytes(cursor.byte(), &mut buffer[total..wanted]);
            total += read;
            cursor.advance(read);
        }
        Ok(total)
    }

    /// Write `data` at `offset`, allocating blocks for holes on the way.
    /// Returns fewer bytes than given once the direct blocks are exhausted
    /// or the volume runs out of blocks after something was written.
    pub fn write(&mut self, fs: &mut Filesystem, offset: u32, data: &[u8]) -> Result<usize, Error> {
        let mut cursor = BlockCursor::new(offset as usize);
        let mut total = 0;
        while total < data.len() {
            let slot = cursor.block();
            if slot >= DIRECT_BLOCKS {
                debug!("File {} reached its last direct block", self.index);
                break;
            }
            let mut block = match self.inode.block(slot) {
                Some(NULL_BLOCK) | None => {
                    let pointer = match fs.acquire_block() {
                        Ok(pointer) => pointer,
                        Err(Error::NoSpace) if total > 0 => break,
                        Err(e) => return Err(e),
                    };
                    self.inode.set_block(slot, pointer as u16);
                    fs.flush_inode(self.index, &self.inode)?;
                    Block::empty(pointer)
                }
                Some(pointer) => fs.load_block(pointer as u32)?,
            };
            let rest = block.write_bytes(cursor.byte(), &data[total..]);
            let written = data.len() - total - rest.len();
            fs.flush_block(&block)?;
            total += written;
            cursor.advance(written);
        }
        if total > 0 {
            let end = offset + total as u32;
            if end > self.inode.size() {
                self.inode.size = end;
            }
            self.inode.touch();
            fs.flush_inode(self.index, &self.inode)?;
        }
        Ok(total)
    }

    /// Free every data block and the inode itself
    pub fn release(self, fs: &mut Filesystem) -> Result<(), Error> {
        for pointer in self.inode.allocated_blocks() {
            fs.release_block(pointer as u32)?;
        }
        fs.release_inode(self.index)?;
        debug!("Released regular file {}", self.index);
        Ok(())
    }
}
