//! File and directory views over inodes.

mod block_cursor;
mod directory;
mod regular_file;

use crate::{
    filesystem::Filesystem,
    structs::{Block, Inode},
};

#[derive(Debug, Clone)]
pub struct RegularFile {
    pub(crate) index: u32,
    pub(crate) inode: Inode,
}

/// Directory inode and its single entry block
#[derive(Debug, Clone)]
pub struct Directory {
    pub(crate) index: u32,
    pub(crate) inode: Inode,
    pub(crate) block: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChild {
    pub name: String,
    pub inode: u32,
    pub is_dir: bool,
}

/// Lazy walk over a directory's children, `.` and `..` excluded.
/// Entries are read from the snapshot taken when listing started.
#[derive(Debug)]
pub struct Listing<'a> {
    pub(crate) filesystem: &'a mut Filesystem,
    pub(crate) directory: Directory,
    pub(crate) slot: usize,
}

/// Byte position inside a file split into direct slot and in-block offset
#[derive(Debug, Clone)]
pub struct BlockCursor {
    pub(crate) block_size: usize,
    pub(crate) current_block: usize,
    pub(crate) current_byte: usize,
}
