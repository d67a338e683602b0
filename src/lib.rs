//! JexFS: a small block-addressed filesystem with bitmap allocation,
//! 30-byte inodes holding ten direct block pointers, and directories that fit
//! in a single block.
//!
//! [`Filesystem`] works on inode indices and names resolved one component at
//! a time, [`Session`] layers a table of open file handles on top of it, and
//! [`filesystem::FuseFs`] exposes a volume to the host through FUSE.

pub mod cli;
pub mod device;
mod error;
pub mod filesystem;
pub mod filetypes;
pub mod session;
pub mod structs;
#[cfg(test)]
mod testing;

pub use error::Error;
pub use filesystem::Filesystem;
pub use session::Session;
