use super::{Directory, DirectoryChild, Listing};
use crate::structs::{
    encode_name, Block, DirectoryEntry, Inode, InodeKind, BLOCK_SIZE, DIRECTORY_ENTRY_SIZE,
    ENTRIES_PER_BLOCK,
};
use crate::{Error, Filesystem};

use bytemuck::Zeroable;
use log::{debug, warn};

impl Directory {
    /// Allocate a directory inode with a fresh block holding `.` and `..`.
    /// Nothing is linked into `parent`, the caller does that.
    pub fn new(fs: &mut Filesystem, parent: u32) -> Result<Self, Error> {
        let index = fs.acquire_inode()?;
        let pointer = match fs.acquire_block() {
            Ok(pointer) => pointer,
            Err(e) => {
                fs.release_inode(index)?;
                return Err(e);
            }
        };
        let mut block = Block::empty(pointer);
        let mut inode = Inode::new(InodeKind::Directory);
        inode.size = BLOCK_SIZE as u32;
        inode.set_block(0, pointer as u16);
        let mut inner = || -> Result<(), Error> {
            block.write_any(0, &DirectoryEntry::new(index, ".")?);
            block.write_any(DIRECTORY_ENTRY_SIZE, &DirectoryEntry::new(parent, "..")?);
            fs.flush_block(&block)?;
            fs.flush_inode(index, &inode)
        };
        if let Err(e) = inner() {
            fs.release_block(pointer)?;
            fs.release_inode(index)?;
            return Err(e);
        }
        debug!("Created directory {index} with block {pointer} under {parent}");
        Ok(Self {
            index,
            inode,
            block,
        })
    }

    pub fn load(fs: &mut Filesystem, index: u32) -> Result<Self, Error> {
        let inode = fs.load_inode(index)?;
        if inode.kind() != InodeKind::Directory {
            return Err(Error::NotADirectory);
        }
        let pointer = inode.block(0).unwrap_or_default();
        if pointer == 0 {
            warn!("Directory {index} has no entry block");
            return Err(Error::CorruptVolume);
        }
        let block = fs.load_block(pointer as u32)?;
        Ok(Self {
            index,
            inode,
            block,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn entry(&self, slot: usize) -> DirectoryEntry {
        self.block.read_any(slot * DIRECTORY_ENTRY_SIZE)
    }

    /// Occupied slots in on-disk order
    pub fn entries(&self) -> impl Iterator<Item = (usize, DirectoryEntry)> + '_ {
        (0..ENTRIES_PER_BLOCK)
            .map(|slot| (slot, self.entry(slot)))
            .filter(|(_, entry)| !entry.is_free())
    }

    fn find(&self, name: &str) -> Option<(usize, DirectoryEntry)> {
        let encoded = encode_name(name).ok()?;
        self.entries().find(|(_, entry)| entry.matches(&encoded))
    }

    /// Inode linked under `name`, first match wins
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.find(name).map(|(_, entry)| entry.inode())
    }

    /// Link `target` under `name` in the first empty slot
    pub fn insert(&mut self, fs: &mut Filesystem, name: &str, target: u32) -> Result<(), Error> {
        let entry = DirectoryEntry::new(target, name)?;
        let slot = (0..ENTRIES_PER_BLOCK)
            .find(|&slot| self.entry(slot).is_free())
            .ok_or(Error::NoSpace)?;
        self.block.write_any(slot * DIRECTORY_ENTRY_SIZE, &entry);
        fs.flush_block(&self.block)?;
        debug!("Linked inode {target} as {name:?} in directory {}", self.index);
        Ok(())
    }

    /// Clear the slot holding `name` and return the inode it pointed to.
    /// Following entries are not compacted.
    pub fn remove(&mut self, fs: &mut Filesystem, name: &str) -> Result<u32, Error> {
        let (slot, entry) = self.find(name).ok_or(Error::NotFound)?;
        self.block
            .write_any(slot * DIRECTORY_ENTRY_SIZE, &DirectoryEntry::zeroed());
        fs.flush_block(&self.block)?;
        debug!("Unlinked {name:?} from directory {}", self.index);
        Ok(entry.inode())
    }

    /// Rewrite the name of an entry in place
    pub fn rename(&mut self, fs: &mut Filesystem, old: &str, new: &str) -> Result<(), Error> {
        let (slot, entry) = self.find(old).ok_or(Error::NotFound)?;
        let renamed = DirectoryEntry::new(entry.inode(), new)?;
        self.block.write_any(slot * DIRECTORY_ENTRY_SIZE, &renamed);
        fs.flush_block(&self.block)?;
        debug!("Renamed {old:?} to {new:?} in directory {}", self.index);
        Ok(())
    }

    /// Only `.` and `..` remain
    pub fn is_empty(&self) -> bool {
        self.entries().all(|(_, entry)| entry.is_dot())
    }

    /// Free the entry block and the inode; the parent link is left alone
    pub fn release(self, fs: &mut Filesystem) -> Result<(), Error> {
        for pointer in self.inode.allocated_blocks() {
            fs.release_block(pointer as u32)?;
        }
        fs.release_inode(self.index)?;
        debug!("Released directory {}", self.index);
        Ok(())
    }
}

impl<'a> Listing<'a> {
    pub(crate) fn new(filesystem: &'a mut Filesystem, directory: Directory) -> Self {
        Self {
            filesystem,
            directory,
            slot: 0,
        }
    }

    /// Start the walk over from the first slot
    pub fn rewind(&mut self) {
        self.slot = 0;
    }
}

impl Iterator for Listing<'_> {
    type Item = Result<DirectoryChild, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.slot < ENTRIES_PER_BLOCK {
            let entry = self.directory.entry(self.slot);
            self.slot += 1;
            if entry.is_free() || entry.is_dot() {
                continue;
            }
            let inode = entry.inode();
            let is_dir = match self.filesystem.load_inode(inode) {
                Ok(child) => child.kind() == InodeKind::Directory,
                Err(e) => return Some(Err(e)),
            };
            return Some(Ok(DirectoryChild {
                name: entry.name(),
                inode,
                is_dir,
            }));
        }
        None
    }
}
