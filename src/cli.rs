//! Command line of the `jexfs` and `debugger` binaries.

use std::path::PathBuf;

use clap::Parser;

use crate::structs::{
    Geometry, DEFAULT_INODE_TABLE_BLOCKS, DEFAULT_TOTAL_BLOCKS, DEFAULT_TOTAL_INODES,
};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about = None)]
pub enum JexCli {
    /// Write an empty JexFS image, optionally packed with host files
    Mkfs(MkfsArgs),
    /// Expose an image through FUSE
    Mount(MountArgs),
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkfsArgs {
    /// Image file to create or overwrite
    pub image: PathBuf,
    /// Host directory whose regular files are copied into the root directory
    #[arg(short, long)]
    pub source: Option<PathBuf>,
    /// Total number of 1024-byte blocks
    #[arg(short, long, default_value_t = DEFAULT_TOTAL_BLOCKS)]
    pub blocks: u32,
    /// Total number of inodes
    #[arg(short, long, default_value_t = DEFAULT_TOTAL_INODES)]
    pub inodes: u32,
    /// Blocks reserved for the inode table
    #[arg(short = 't', long, default_value_t = DEFAULT_INODE_TABLE_BLOCKS)]
    pub inode_table_blocks: u32,
}

impl MkfsArgs {
    pub fn geometry(&self) -> Geometry {
        Geometry {
            total_blocks: self.blocks,
            total_inodes: self.inodes,
            inode_table_blocks: self.inode_table_blocks,
        }
    }
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MountArgs {
    pub image: PathBuf,
    pub mountpoint: PathBuf,
}

/// Inspect the records of an image
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about = None)]
pub struct DebuggerArgs {
    pub image: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkfs_defaults() {
        let args = JexCli::parse_from(["jexfs", "mkfs", "floppy.img"]);
        let JexCli::Mkfs(args) = args else {
            panic!("expected mkfs");
        };
        assert_eq!(args.image, PathBuf::from("floppy.img"));
        assert_eq!(args.source, None);
        assert_eq!(args.geometry(), Geometry::default());
    }

    #[test]
    fn mkfs_short_form() {
        let args = JexCli::parse_from([
            "jexfs", "mkfs", "disk.img", "-s", "rootfs", "-b", "512", "-i", "64", "-t", "2",
        ]);
        assert_eq!(
            args,
            JexCli::Mkfs(MkfsArgs {
                image: "disk.img".into(),
                source: Some("rootfs".into()),
                blocks: 512,
                inodes: 64,
                inode_table_blocks: 2,
            })
        );
    }

    #[test]
    fn mkfs_long_form() {
        let args = JexCli::parse_from([
            "jexfs",
            "mkfs",
            "disk.img",
            "--source",
            "rootfs",
            "--blocks",
            "2048",
            "--inodes",
            "256",
            "--inode-table-blocks",
            "8",
        ]);
        let JexCli::Mkfs(args) = args else {
            panic!("expected mkfs");
        };
        assert_eq!(args.blocks, 2048);
        assert_eq!(args.inodes, 256);
    }

    #[test]
    fn mount_positionals() {
        let args = JexCli::parse_from(["jexfs", "mount", "disk.img", "/mnt/jex"]);
        assert_eq!(
            args,
            JexCli::Mount(MountArgs {
                image: "disk.img".into(),
                mountpoint: "/mnt/jex".into(),
            })
        );
        assert!(JexCli::try_parse_from(["jexfs", "mount", "disk.img"]).is_err());
    }

    #[test]
    fn debugger_image() {
        let args = DebuggerArgs::parse_from(["debugger", "disk.img"]);
        assert_eq!(args.image, PathBuf::from("disk.img"));
    }
}
