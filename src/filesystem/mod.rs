//! Filesystem core: mount state, bitmap allocator and record access.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::device::SectorDevice;
use crate::structs::*;
use crate::Error;

mod format;
mod fuse;
mod operations;

/// Mounted (or failed-to-mount) JexFS volume on a sector device.
///
/// Bitmaps are not cached: every allocation reads, modifies and writes back
/// the bitmap block. Only the superblock is kept in memory while mounted.
#[derive(Debug)]
pub struct Filesystem {
    pub(crate) device: Box<dyn SectorDevice>,
    pub(crate) superblock: Option<Superblock>,
    pub(crate) cwd_inode: u32,
}

/// FUSE session sharing one filesystem between kernel request threads
#[derive(Debug)]
pub struct FuseFs {
    pub(crate) filesystem: Arc<Mutex<Filesystem>>,
    pub(crate) owner: (u32, u32),
}

impl FuseFs {
    pub fn new(filesystem: Filesystem) -> Self {
        Self {
            filesystem: Arc::new(Mutex::new(filesystem)),
            owner: (0, 0),
        }
    }

    fn fs_handle(&self) -> Result<MutexGuard<Filesystem>, Error> {
        if let Ok(fs) = self.filesystem.lock() {
            Ok(fs)
        } else {
            Err(Error::ThreadSync)
        }
    }
}

impl Filesystem {
    /// Wrap a device without mounting it
    pub fn new(device: Box<dyn SectorDevice>) -> Self {
        Self {
            device,
            superblock: None,
            cwd_inode: ROOT_INODE,
        }
    }

    /// Wrap and mount in one step
    pub fn open(device: Box<dyn SectorDevice>) -> Result<Self, Error> {
        let mut fs = Self::new(device);
        fs.mount()?;
        Ok(fs)
    }

    /// Read and validate the superblock. On failure the volume stays
    /// unmounted and every later call returns [`Error::NotMounted`].
    pub fn mount(&mut self) -> Result<(), Error> {
        self.superblock = None;
        let superblock = Superblock::load(self.device.as_mut())?;
        info!("Mounted volume: {} blocks, {} inodes", { superblock.total_blocks }, {
            superblock.total_inodes
        });
        self.superblock = Some(superblock);
        self.cwd_inode = ROOT_INODE;
        Ok(())
    }

    pub fn unmount(&mut self) {
        if self.superblock.take().is_some() {
            info!("Unmounted volume");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.superblock.is_some()
    }

    pub fn into_device(self) -> Box<dyn SectorDevice> {
        self.device
    }

    pub fn superblock(&self) -> Result<Superblock, Error> {
        self.superblock.ok_or(Error::NotMounted)
    }

    /// Current directory inode
    pub fn cwd(&self) -> u32 {
        self.cwd_inode
    }

    pub fn inode_bitmap(&mut self) -> Result<Bitmap<Inode>, Error> {
        let superblock = self.superblock()?;
        Bitmap::<Inode>::load(self.device.as_mut(), &superblock)
    }

    pub fn block_bitmap(&mut self) -> Result<Bitmap<Block>, Error> {
        let superblock = self.superblock()?;
        Bitmap::<Block>::load(self.device.as_mut(), &superblock)
    }

    fn acquire<T: AsBitmap>(&mut self) -> Result<u32, Error> {
        let superblock = self.superblock()?;
        let mut bitmap = Bitmap::<T>::load(self.device.as_mut(), &superblock)?;
        let index = bitmap.next_free(1).ok_or_else(|| {
            warn!("No free {} left", T::label());
            Error::NoSpace
        })?;
        bitmap.set(index, true)?;
        bitmap.flush(self.device.as_mut(), &superblock)?;
        Ok(index)
    }

    fn release<T: AsBitmap>(&mut self, index: u32) -> Result<(), Error> {
        let superblock = self.superblock()?;
        let mut bitmap = Bitmap::<T>::load(self.device.as_mut(), &superblock)?;
        if index >= bitmap.count() {
            return Err(Error::NotFound);
        }
        if !bitmap.get(index) {
            warn!("Releasing free {} index {index}", T::label());
        }
        bitmap.set(index, false)?;
        bitmap.flush(self.device.as_mut(), &superblock)
    }

    /// Get index of first free inode, never 0
    pub(crate) fn acquire_inode(&mut self) -> Result<u32, Error> {
        let index = self.acquire::<Inode>()?;
        debug!("Acquire inode {index}");
        Ok(index)
    }

    pub(crate) fn release_inode(&mut self, index: u32) -> Result<(), Error> {
        debug!("Release inode {index}");
        self.release::<Inode>(index)
    }

    /// Get index of first free block, zeroed on disk
    pub(crate) fn acquire_block(&mut self) -> Result<u32, Error> {
        let index = self.acquire::<Block>()?;
        debug!("Acquire block {index}");
        if let Err(e) = self.flush_block(&Block::empty(index)) {
            self.release_block(index)?;
            return Err(e);
        }
        Ok(index)
    }

    pub(crate) fn release_block(&mut self, index: u32) -> Result<(), Error> {
        debug!("Release block {index}");
        self.release::<Block>(index)
    }

    /// Load inode with index; unallocated inodes are not found
    pub fn load_inode(&mut self, index: u32) -> Result<Inode, Error> {
        if !self.inode_bitmap()?.get(index) {
            return Err(Error::NotFound);
        }
        debug!("Load inode {index}");
        let superblock = self.superblock()?;
        Inode::load(self.device.as_mut(), &superblock, index)
    }

    pub(crate) fn flush_inode(&mut self, index: u32, inode: &Inode) -> Result<(), Error> {
        debug!("Flush inode {index}");
        let superblock = self.superblock()?;
        inode.flush(self.device.as_mut(), &superblock, index)
    }

    pub fn load_block(&mut self, index: u32) -> Result<Block, Error> {
        debug!("Load block {index}");
        let superblock = self.superblock()?;
        Block::load(self.device.as_mut(), &superblock, index)
    }

    pub(crate) fn flush_block(&mut self, block: &Block) -> Result<(), Error> {
        debug!("Flush block {}", block.index);
        let superblock = self.superblock()?;
        block.flush(self.device.as_mut(), &superblock, block.index)
    }
}
