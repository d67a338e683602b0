use std::ffi::OsStr;
use std::time::Duration;

use fuser::FileType;
use libc::c_int;
use log::{debug, error, info, warn};

use super::FuseFs;
use crate::error::Error;
use crate::structs::{InodeKind, BLOCK_SIZE, NAME_LENGTH, ROOT_INODE};

const TTL: Duration = Duration::from_secs(1);

fn reject(e: Error) -> c_int {
    warn!("Error: {e}");
    e.into()
}

fn entry_name(name: &OsStr) -> Result<&str, Error> {
    name.to_str().ok_or(Error::InvalidName)
}

/// FUSE and JexFS share inode numbers; anything past `u32` cannot exist
fn inode_index(ino: u64) -> Result<u32, Error> {
    u32::try_from(ino).map_err(|_| Error::NotFound)
}

impl fuser::Filesystem for FuseFs {
    fn init(
        &mut self,
        req: &fuser::Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), c_int> {
        info!("Initializing filesystem");
        self.owner = (req.uid(), req.gid());
        let mut fs = self.fs_handle()?;
        if !fs.is_mounted() {
            fs.mount()?;
        }
        let root = fs.stat(ROOT_INODE)?;
        if root.kind() != InodeKind::Directory {
            error!("Inode {ROOT_INODE} is not a directory");
            return Err(Error::CorruptVolume.into());
        }
        debug!("Success");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("Unmounting filesystem");
        match self.fs_handle() {
            Ok(mut fs) => fs.unmount(),
            Err(e) => error!("Unexpected error: {e}"),
        }
    }

    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        info!("Lookup {name:?} in directory {parent}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let found = entry_name(name).and_then(|name| {
                let index = fs.lookup_in(inode_index(parent)?, name)?;
                Ok((index, fs.stat(index)?))
            });
            match found {
                Ok((index, inode)) => {
                    reply.entry(&TTL, &inode.attrs(index, self.owner), 0);
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn getattr(&mut self, _req: &fuser::Request<'_>, ino: u64, reply: fuser::ReplyAttr) {
        info!("Get attributes for inode {ino}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            match inode_index(ino).and_then(|index| fs.stat(index)) {
                Ok(inode) => {
                    reply.attr(&TTL, &inode.attrs(ino as u32, self.owner));
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    /// No attribute is stored besides size and mtime, so requests are
    /// acknowledged with the current attributes
    fn setattr(
        &mut self,
        req: &fuser::Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        info!("Set attributes for inode {ino}");
        if let Some(mode) = mode {
            debug!("Ignoring mode {mode:0o}");
        }
        if let Some(size) = size {
            debug!("Ignoring size {size}");
        }
        self.getattr(req, ino, reply);
    }

    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        info!("Reading directory {ino} with offset {offset}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let listed = inode_index(ino).and_then(|index| {
                let parent = fs.lookup_in(index, "..")?;
                let mut entries = vec![
                    (index, FileType::Directory, ".".to_string()),
                    (parent, FileType::Directory, "..".to_string()),
                ];
                for child in fs.list(index)? {
                    let child = child?;
                    let kind = if child.is_dir {
                        FileType::Directory
                    } else {
                        FileType::RegularFile
                    };
                    entries.push((child.inode, kind, child.name));
                }
                Ok(entries)
            });
            match listed {
                Ok(entries) => {
                    for (position, (index, kind, name)) in
                        entries.into_iter().enumerate().skip(offset as usize)
                    {
                        if reply.add(index as u64, position as i64 + 1, kind, &name) {
                            debug!("Buffer full");
                            break;
                        }
                    }
                    reply.ok();
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        info!("Open file {ino}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            match inode_index(ino).and_then(|index| fs.stat(index)) {
                Ok(inode) if inode.kind() == InodeKind::File => {
                    reply.opened(0, fuser::consts::FOPEN_DIRECT_IO);
                    debug!("Success");
                }
                Ok(_) => {
                    warn!("Unable to open non-regular file");
                    reply.error(libc::EISDIR);
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        info!("Read {size} bytes from file {ino} with offset {offset}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let mut buffer = vec![0u8; size as usize];
            let read = inode_index(ino).and_then(|index| {
                let offset = u32::try_from(offset).map_err(|_| Error::InvalidSeek)?;
                fs.read(index, offset, &mut buffer)
            });
            match read {
                Ok(read) => {
                    reply.data(&buffer[..read]);
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        info!(
            "Write {} bytes to file {ino} with offset {offset}",
            data.len()
        );
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let written = inode_index(ino).and_then(|index| {
                let offset = u32::try_from(offset).map_err(|_| Error::InvalidSeek)?;
                fs.write(index, offset, data)
            });
            match written {
                Ok(0) if !data.is_empty() => {
                    warn!("File {ino} cannot grow past its direct blocks");
                    reply.error(libc::EFBIG);
                }
                Ok(written) => {
                    reply.written(written as u32);
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn create(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        info!("Create file {name:?} in directory {parent}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let created = entry_name(name).and_then(|name| {
                let index = fs.create_in(inode_index(parent)?, name)?;
                Ok((index, fs.stat(index)?))
            });
            match created {
                Ok((index, inode)) if inode.kind() == InodeKind::File => {
                    let attrs = inode.attrs(index, self.owner);
                    reply.created(&TTL, &attrs, 0, 0, fuser::consts::FOPEN_DIRECT_IO);
                    debug!("Success");
                }
                Ok(_) => reply.error(libc::EISDIR),
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn mknod(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: fuser::ReplyEntry,
    ) {
        info!("Make node {name:?} in directory {parent}");
        if mode & libc::S_IFMT != libc::S_IFREG {
            warn!("Only regular files can be created");
            reply.error(libc::EPERM);
            return;
        }
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let created = entry_name(name).and_then(|name| {
                let index = fs.create_in(inode_index(parent)?, name)?;
                Ok((index, fs.stat(index)?))
            });
            match created {
                Ok((index, inode)) => {
                    reply.entry(&TTL, &inode.attrs(index, self.owner), 0);
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn mkdir(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        info!("Make directory {name:?} in directory {parent}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let created = entry_name(name).and_then(|name| {
                let index = fs.mkdir_in(inode_index(parent)?, name)?;
                Ok((index, fs.stat(index)?))
            });
            match created {
                Ok((index, inode)) => {
                    reply.entry(&TTL, &inode.attrs(index, self.owner), 0);
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn unlink(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        info!("Unlink {name:?} from directory {parent}");
        self.remove_kind(parent, name, InodeKind::File, reply);
    }

    fn rmdir(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        info!("Remove directory {name:?} from directory {parent}");
        self.remove_kind(parent, name, InodeKind::Directory, reply);
    }

    fn rename(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: fuser::ReplyEmpty,
    ) {
        info!("Rename {name:?} in {parent} to {newname:?} in {newparent}");
        if parent != newparent {
            warn!("Moving between directories is not supported");
            reply.error(libc::EXDEV);
            return;
        }
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let renamed = entry_name(name).and_then(|name| {
                fs.rename_in(inode_index(parent)?, name, entry_name(newname)?)
            });
            match renamed {
                Ok(()) => {
                    reply.ok();
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }

    fn statfs(&mut self, _req: &fuser::Request<'_>, ino: u64, reply: fuser::ReplyStatfs) {
        info!("Statistics requested through inode {ino}");
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let usage = fs.block_bitmap().and_then(|blocks| {
                let inodes = fs.inode_bitmap()?;
                Ok((blocks, inodes))
            });
            match usage {
                Ok((blocks, inodes)) => {
                    let free_blocks = (blocks.count() - blocks.used()) as u64;
                    reply.statfs(
                        blocks.count() as u64,
                        free_blocks,
                        free_blocks,
                        inodes.count() as u64,
                        (inodes.count() - inodes.used()) as u64,
                        BLOCK_SIZE as u32,
                        NAME_LENGTH as u32,
                        BLOCK_SIZE as u32,
                    );
                    debug!("Success");
                }
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }
}

impl FuseFs {
    /// Shared body of unlink and rmdir, refusing targets of the other kind
    fn remove_kind(&self, parent: u64, name: &OsStr, expected: InodeKind, reply: fuser::ReplyEmpty) {
        let inner = || -> Result<(), Error> {
            let mut fs = self.fs_handle()?;
            let removed = entry_name(name).and_then(|name| {
                let parent = inode_index(parent)?;
                let target = fs.lookup_in(parent, name)?;
                let kind = fs.stat(target)?.kind();
                if kind != expected {
                    return Ok(Some(kind));
                }
                fs.remove_in(parent, name)?;
                Ok(None)
            });
            match removed {
                Ok(None) => {
                    reply.ok();
                    debug!("Success");
                }
                Ok(Some(InodeKind::Directory)) => reply.error(libc::EISDIR),
                Ok(Some(_)) => reply.error(libc::ENOTDIR),
                Err(e) => reply.error(reject(e)),
            }
            Ok(())
        };
        inner().unwrap_or_else(|e| error!("Unexpected error: {e}"));
    }
}
