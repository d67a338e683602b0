//! Open-file table: small integer handles over the filesystem core.

use log::{debug, info, warn};

use crate::filetypes::RegularFile;
use crate::{Error, Filesystem};

pub const MAX_OPEN_FILES: usize = 16;

/// Flags accepted by [`Session::open`], same values as the kernel syscalls
pub mod open_flags {
    pub const O_RDONLY: u32 = 0x00;
    pub const O_WRONLY: u32 = 0x01;
    pub const O_RDWR: u32 = 0x02;
    /// Move the cursor to end of file before every write
    pub const O_APPEND: u32 = 0x08;
    /// Create the file when the name does not resolve
    pub const O_CREAT: u32 = 0x40;
}

use open_flags::{O_APPEND, O_CREAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl TryFrom<i32> for Whence {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Set),
            1 => Ok(Self::Cur),
            2 => Ok(Self::End),
            _ => Err(Error::InvalidSeek),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileDescriptor {
    pub used: bool,
    pub inode_index: u32,
    pub offset: u32,
    pub append: bool,
}

/// Mounted filesystem together with its descriptor table
#[derive(Debug)]
pub struct Session {
    filesystem: Filesystem,
    files: [FileDescriptor; MAX_OPEN_FILES],
}

impl Session {
    pub fn new(filesystem: Filesystem) -> Self {
        Self {
            filesystem,
            files: [FileDescriptor::default(); MAX_OPEN_FILES],
        }
    }

    pub fn filesystem(&mut self) -> &mut Filesystem {
        &mut self.filesystem
    }

    pub fn into_filesystem(self) -> Filesystem {
        self.filesystem
    }

    /// Remount the volume; every handle is dropped
    pub fn mount(&mut self) -> Result<(), Error> {
        self.files = [FileDescriptor::default(); MAX_OPEN_FILES];
        self.filesystem.mount()
    }

    pub fn create(&mut self, name: &str) -> Result<u32, Error> {
        self.filesystem.create(name)
    }

    /// Open a regular file and return its handle
    pub fn open(&mut self, name: &str, flags: u32) -> Result<usize, Error> {
        let handle = self
            .files
            .iter()
            .position(|file| !file.used)
            .ok_or_else(|| {
                warn!("All {MAX_OPEN_FILES} descriptors are in use");
                Error::TooManyOpenFiles
            })?;
        let inode_index = match self.filesystem.resolve(name) {
            Err(Error::NotFound) if flags & O_CREAT != 0 => self.filesystem.create(name)?,
            other => other?,
        };
        RegularFile::load(&mut self.filesystem, inode_index)?;
        self.files[handle] = FileDescriptor {
            used: true,
            inode_index,
            offset: 0,
            append: flags & O_APPEND != 0,
        };
        info!("Opened {name:?} (inode {inode_index}) as handle {handle}");
        Ok(handle)
    }

    fn descriptor(&mut self, handle: usize) -> Result<&mut FileDescriptor, Error> {
        match self.files.get_mut(handle) {
            Some(file) if file.used => Ok(file),
            _ => Err(Error::InvalidHandle),
        }
    }

    /// Read from the cursor and advance it by the bytes read
    pub fn read(&mut self, handle: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        let FileDescriptor {
            inode_index,
            offset,
            ..
        } = *self.descriptor(handle)?;
        let read = self.filesystem.read(inode_index, offset, buffer)?;
        self.descriptor(handle)?.offset = offset + read as u32;
        debug!("Read {read} bytes from handle {handle}");
        Ok(read)
    }

    /// Write at the cursor, or at end of file for append handles
    pub fn write(&mut self, handle: usize, data: &[u8]) -> Result<usize, Error> {
        let FileDescriptor {
            inode_index,
            offset,
            append,
            ..
        } = *self.descriptor(handle)?;
        let offset = if append {
            self.filesystem.size_of(inode_index)?
        } else {
            offset
        };
        let written = self.filesystem.write(inode_index, offset, data)?;
        self.descriptor(handle)?.offset = offset + written as u32;
        debug!("Wrote {written} bytes to handle {handle}");
        Ok(written)
    }

    /// Move the cursor and return its new position
    pub fn seek(&mut self, handle: usize, offset: i64, whence: Whence) -> Result<u32, Error> {
        let file = *self.descriptor(handle)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => file.offset as i64,
            Whence::End => self.filesystem.size_of(file.inode_index)? as i64,
        };
        let position = base
            .checked_add(offset)
            .and_then(|position| u32::try_from(position).ok())
            .ok_or(Error::InvalidSeek)?;
        self.descriptor(handle)?.offset = position;
        Ok(position)
    }

    pub fn close(&mut self, handle: usize) -> Result<(), Error> {
        self.descriptor(handle)?.used = false;
        debug!("Closed handle {handle}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::open_flags::*;
    use super::*;
    use crate::structs::ROOT_INODE;
    use crate::testing::{formatted, ram_disk};

    fn session() -> Session {
        Session::new(formatted())
    }

    #[test]
    fn write_then_read_through_handles() {
        let mut session = session();
        session.create("f").unwrap();
        let fd = session.open("f", O_RDWR).unwrap();
        assert_eq!(session.write(fd, b"hello").unwrap(), 5);
        assert_eq!(session.write(fd, b"!!").unwrap(), 2);
        assert_eq!(session.seek(fd, 0, Whence::Set).unwrap(), 0);
        let mut buffer = [0u8; 16];
        assert_eq!(session.read(fd, &mut buffer).unwrap(), 7);
        assert_eq!(&buffer[..7], b"hello!!");
        assert_eq!(session.read(fd, &mut buffer).unwrap(), 0);
        session.close(fd).unwrap();
    }

    #[test]
    fn rename_then_open() {
        let mut session = session();
        let fd = session.open("f", O_WRONLY | O_CREAT).unwrap();
        session.write(fd, b"payload").unwrap();
        session.close(fd).unwrap();
        session.filesystem().rename("f", "g").unwrap();
        assert!(matches!(session.open("f", O_RDONLY), Err(Error::NotFound)));
        let fd = session.open("g", O_RDONLY).unwrap();
        let mut buffer = [0u8; 7];
        session.read(fd, &mut buffer).unwrap();
        assert_eq!(&buffer, b"payload");
    }

    #[test]
    fn seek_end_and_negative() {
        let mut session = session();
        let fd = session.open("f", O_RDWR | O_CREAT).unwrap();
        session.write(fd, &[0u8; 300]).unwrap();
        assert_eq!(session.seek(fd, 0, Whence::End).unwrap(), 300);
        assert_eq!(session.seek(fd, -100, Whence::Cur).unwrap(), 200);
        assert!(matches!(
            session.seek(fd, -201, Whence::Cur),
            Err(Error::InvalidSeek)
        ));
        assert!(matches!(
            session.seek(fd, i64::from(u32::MAX) + 1, Whence::Set),
            Err(Error::InvalidSeek)
        ));
        assert_eq!(Whence::try_from(2).unwrap(), Whence::End);
        assert!(Whence::try_from(3).is_err());
    }

    #[test]
    fn append_writes_at_end() {
        let mut session = session();
        let fd = session.open("log", O_WRONLY | O_CREAT).unwrap();
        session.write(fd, b"one").unwrap();
        let appender = session.open("log", O_WRONLY | O_APPEND).unwrap();
        session.write(fd, b"ONE").unwrap();
        session.seek(fd, 0, Whence::Set).unwrap();
        session.write(appender, b"two").unwrap();
        let reader = session.open("log", O_RDONLY).unwrap();
        let mut buffer = [0u8; 16];
        let read = session.read(reader, &mut buffer).unwrap();
        assert_eq!(&buffer[..read], b"oneONEtwo");
    }

    #[test]
    fn descriptor_table_exhaustion() {
        let mut session = session();
        session.create("f").unwrap();
        let handles: Vec<usize> = (0..MAX_OPEN_FILES)
            .map(|_| session.open("f", O_RDONLY).unwrap())
            .collect();
        assert_eq!(handles, (0..MAX_OPEN_FILES).collect::<Vec<_>>());
        assert!(matches!(
            session.open("f", O_RDONLY),
            Err(Error::TooManyOpenFiles)
        ));
        session.close(5).unwrap();
        assert_eq!(session.open("f", O_RDONLY).unwrap(), 5);
    }

    #[test]
    fn bad_handles() {
        let mut session = session();
        let mut buffer = [0u8; 4];
        assert!(matches!(session.read(0, &mut buffer), Err(Error::InvalidHandle)));
        assert!(matches!(session.close(3), Err(Error::InvalidHandle)));
        assert!(matches!(
            session.write(MAX_OPEN_FILES, b"x"),
            Err(Error::InvalidHandle)
        ));
        let fd = session.open("f", O_CREAT).unwrap();
        session.close(fd).unwrap();
        assert!(matches!(session.close(fd), Err(Error::InvalidHandle)));
    }

    #[test]
    fn open_rejects_missing_and_directories() {
        let mut session = session();
        assert!(matches!(session.open("none", O_RDONLY), Err(Error::NotFound)));
        session.filesystem().mkdir("dir").unwrap();
        assert!(matches!(session.open("dir", O_RDONLY), Err(Error::NotAFile)));
        assert!(matches!(session.open("/", O_RDONLY), Err(Error::NotAFile)));
        assert_eq!(session.filesystem().cwd(), ROOT_INODE);
    }

    #[test]
    fn mount_drops_handles() {
        let mut session = session();
        let fd = session.open("f", O_CREAT).unwrap();
        session.mount().unwrap();
        assert!(matches!(session.close(fd), Err(Error::InvalidHandle)));
    }

    #[test]
    fn bad_magic_refuses_calls() {
        let mut session = Session::new(Filesystem::new(ram_disk(32)));
        assert!(matches!(session.mount(), Err(Error::CorruptVolume)));
        assert!(matches!(session.create("f"), Err(Error::NotMounted)));
        assert!(matches!(
            session.open("f", O_RDONLY | O_CREAT),
            Err(Error::NotMounted)
        ));
    }
}
