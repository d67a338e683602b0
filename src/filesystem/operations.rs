use log::{info, warn};

use super::Filesystem;
use crate::filetypes::{Directory, Listing, RegularFile};
use crate::structs::{encode_name, Inode, InodeKind, ROOT_INODE};
use crate::Error;

fn is_dot(name: &str) -> bool {
    name == "." || name == ".."
}

impl Filesystem {
    /// Directory that resolution starts from, and the remaining entry name.
    /// A leading `/` starts at the root, anything else at the current directory.
    fn start_of<'n>(&self, name: &'n str) -> Result<(u32, &'n str), Error> {
        self.superblock()?;
        Ok(match name.strip_prefix('/') {
            Some(rest) => (ROOT_INODE, rest),
            None => (self.cwd_inode, name),
        })
    }

    /// Resolve a single path component to an inode index.
    /// `a/b` is looked up as one literal entry name.
    pub fn resolve(&mut self, name: &str) -> Result<u32, Error> {
        let (parent, name) = self.start_of(name)?;
        if name.is_empty() {
            return Ok(parent);
        }
        self.lookup_in(parent, name)
    }

    /// Entry `name` of directory `parent`; a parent that is not a directory
    /// has no entries
    pub fn lookup_in(&mut self, parent: u32, name: &str) -> Result<u32, Error> {
        let directory = match Directory::load(self, parent) {
            Err(Error::NotADirectory) => return Err(Error::NotFound),
            other => other?,
        };
        directory.lookup(name).ok_or(Error::NotFound)
    }

    /// Create an empty file, or return the inode already linked under `name`
    pub fn create(&mut self, name: &str) -> Result<u32, Error> {
        let (parent, name) = self.start_of(name)?;
        self.create_in(parent, name)
    }

    pub fn create_in(&mut self, parent: u32, name: &str) -> Result<u32, Error> {
        encode_name(name)?;
        let mut directory = Directory::load(self, parent)?;
        if let Some(existing) = directory.lookup(name) {
            return Ok(existing);
        }
        let file = RegularFile::new(self)?;
        let index = file.index();
        if let Err(e) = directory.insert(self, name, index) {
            file.release(self)?;
            return Err(e);
        }
        info!("Created file {name:?} as inode {index} in directory {parent}");
        Ok(index)
    }

    pub fn mkdir(&mut self, name: &str) -> Result<u32, Error> {
        let (parent, name) = self.start_of(name)?;
        self.mkdir_in(parent, name)
    }

    pub fn mkdir_in(&mut self, parent: u32, name: &str) -> Result<u32, Error> {
        encode_name(name)?;
        let mut directory = Directory::load(self, parent)?;
        if directory.lookup(name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let child = Directory::new(self, parent)?;
        let index = child.index();
        if let Err(e) = directory.insert(self, name, index) {
            child.release(self)?;
            return Err(e);
        }
        info!("Created directory {name:?} as inode {index} in directory {parent}");
        Ok(index)
    }

    /// Read file contents at `offset`; never allocates
    pub fn read(&mut self, index: u32, offset: u32, buffer: &mut [u8]) -> Result<usize, Error> {
        RegularFile::load(self, index)?.read(self, offset, buffer)
    }

    /// Write file contents at `offset`, returning how many bytes landed
    pub fn write(&mut self, index: u32, offset: u32, data: &[u8]) -> Result<usize, Error> {
        RegularFile::load(self, index)?.write(self, offset, data)
    }

    /// Unlink `name` from the current directory and free what it owned
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        self.superblock()?;
        self.remove_in(self.cwd_inode, name)
    }

    pub fn remove_in(&mut self, parent: u32, name: &str) -> Result<(), Error> {
        if is_dot(name) {
            return Err(Error::InvalidName);
        }
        let mut directory = Directory::load(self, parent)?;
        let target = directory.lookup(name).ok_or(Error::NotFound)?;
        match self.load_inode(target)?.kind() {
            InodeKind::Directory => {
                let child = Directory::load(self, target)?;
                if !child.is_empty() {
                    return Err(Error::DirectoryNotEmpty);
                }
                child.release(self)?;
                if self.cwd_inode == target {
                    warn!("Removed the current directory, moving to root");
                    self.cwd_inode = ROOT_INODE;
                }
            }
            InodeKind::File => RegularFile::load(self, target)?.release(self)?,
            InodeKind::Free => return Err(Error::CorruptVolume),
        }
        directory.remove(self, name)?;
        info!("Removed {name:?} (inode {target}) from directory {parent}");
        Ok(())
    }

    /// Rename an entry of the current directory in place
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), Error> {
        self.superblock()?;
        self.rename_in(self.cwd_inode, old, new)
    }

    pub fn rename_in(&mut self, parent: u32, old: &str, new: &str) -> Result<(), Error> {
        if is_dot(old) || is_dot(new) {
            return Err(Error::InvalidName);
        }
        let (encoded_old, encoded_new) = (encode_name(old)?, encode_name(new)?);
        let mut directory = Directory::load(self, parent)?;
        directory.lookup(old).ok_or(Error::NotFound)?;
        if encoded_old == encoded_new {
            return Ok(());
        }
        if directory.lookup(new).is_some() {
            return Err(Error::AlreadyExists);
        }
        directory.rename(self, old, new)?;
        info!("Renamed {old:?} to {new:?} in directory {parent}");
        Ok(())
    }

    pub fn size_of(&mut self, index: u32) -> Result<u32, Error> {
        Ok(self.load_inode(index)?.size())
    }

    pub fn stat(&mut self, index: u32) -> Result<Inode, Error> {
        self.load_inode(index)
    }

    /// Children of directory `index`, without `.` and `..`
    pub fn list(&mut self, index: u32) -> Result<Listing<'_>, Error> {
        let directory = Directory::load(self, index)?;
        Ok(Listing::new(self, directory))
    }

    pub fn change_directory(&mut self, name: &str) -> Result<u32, Error> {
        let index = self.resolve(name)?;
        if self.load_inode(index)?.kind() != InodeKind::Directory {
            return Err(Error::NotADirectory);
        }
        self.cwd_inode = index;
        info!("Current directory is now {index}");
        Ok(index)
    }

    pub fn change_directory_root(&mut self) -> Result<(), Error> {
        self.superblock()?;
        self.cwd_inode = ROOT_INODE;
        Ok(())
    }
}
