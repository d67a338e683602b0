//! Shared fixtures for unit tests.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::SectorDevice;
use crate::filesystem::Filesystem;
use crate::structs::{Geometry, BLOCK_SIZE};

/// Small volume: 256 blocks, 64 inodes, data starting at block 6
pub(crate) const TEST_GEOMETRY: Geometry = Geometry {
    total_blocks: 256,
    total_inodes: 64,
    inode_table_blocks: 2,
};

pub(crate) fn ram_disk(blocks: u32) -> Box<dyn SectorDevice> {
    Box::new(Cursor::new(vec![0u8; blocks as usize * BLOCK_SIZE]))
}

pub(crate) fn formatted() -> Filesystem {
    Filesystem::format(ram_disk(TEST_GEOMETRY.total_blocks), &TEST_GEOMETRY).unwrap()
}

const NO_BLOCK: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub(crate) struct FailSwitch {
    failing: Arc<AtomicBool>,
    broken_block: Arc<AtomicU64>,
}

impl FailSwitch {
    /// Every later transfer fails
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst)
    }

    /// Only writes landing in filesystem block `index` fail
    pub(crate) fn fail_writes_to(&self, index: u32) {
        self.broken_block.store(index as u64, Ordering::SeqCst)
    }
}

/// In-memory disk whose transfers start failing once its switch is flipped
#[derive(Debug)]
pub(crate) struct FailingDevice {
    inner: Cursor<Vec<u8>>,
    failing: Arc<AtomicBool>,
    broken_block: Arc<AtomicU64>,
}

impl FailingDevice {
    pub(crate) fn new(size: usize) -> (Self, FailSwitch) {
        let switch = FailSwitch {
            failing: Arc::new(AtomicBool::new(false)),
            broken_block: Arc::new(AtomicU64::new(NO_BLOCK)),
        };
        let device = Self {
            inner: Cursor::new(vec![0u8; size]),
            failing: switch.failing.clone(),
            broken_block: switch.broken_block.clone(),
        };
        (device, switch)
    }

    fn check(&self) -> std::io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "sector transfer failed",
            ))
        } else {
            Ok(())
        }
    }
}

impl Read for FailingDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl Write for FailingDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.check()?;
        let block = self.inner.position() / BLOCK_SIZE as u64;
        if block == self.broken_block.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "block write failed",
            ));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FailingDevice {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl SectorDevice for FailingDevice {}
