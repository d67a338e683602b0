use log::{debug, info, warn};

use super::Filesystem;
use crate::device::{write_block, SectorDevice};
use crate::filetypes::Directory;
use crate::structs::*;
use crate::Error;

impl Filesystem {
    /// Write an empty volume with `geometry` and mount it.
    ///
    /// Every block is zeroed, blocks up to and including `data_start` and
    /// inodes 0 and 1 are marked used, and the root directory takes inode 1
    /// with block `data_start`.
    pub fn format(mut device: Box<dyn SectorDevice>, geometry: &Geometry) -> Result<Self, Error> {
        let superblock = Superblock::new(geometry)?;
        info!("Formatting volume\n{superblock}");
        let zero = [0u8; BLOCK_SIZE];
        for index in 0..geometry.total_blocks {
            write_block(device.as_mut(), index, &zero)?;
        }
        superblock.flush(device.as_mut())?;

        let mut inodes = Bitmap::<Inode>::new(&superblock);
        inodes.set(NULL_INODE, true)?;
        inodes.flush(device.as_mut(), &superblock)?;
        let mut blocks = Bitmap::<Block>::new(&superblock);
        for index in 0..superblock.data_start {
            blocks.set(index, true)?;
        }
        blocks.flush(device.as_mut(), &superblock)?;
        debug!("Reserved metadata blocks and inode {NULL_INODE}");

        let mut fs = Self::open(device)?;
        let root = Directory::new(&mut fs, ROOT_INODE)?;
        if root.index() != ROOT_INODE {
            return Err(Error::CorruptVolume);
        }
        info!("Root directory created");
        Ok(fs)
    }

    /// Copy host files into the root directory, in the order given, and
    /// return how many were packed.
    /// Contents past the largest file size are dropped with a warning, and a
    /// file whose stored name is already taken is skipped.
    pub fn pack_files<I>(&mut self, files: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut packed = 0;
        for (name, contents) in files {
            if name.len() > NAME_LENGTH {
                warn!("Name {name:?} is cut to {NAME_LENGTH} bytes");
            }
            match self.lookup_in(ROOT_INODE, &name) {
                Ok(existing) => {
                    warn!("Skipping {name:?}, its name is taken by inode {existing}");
                    continue;
                }
                Err(Error::NotFound) => {}
                Err(e) => return Err(e),
            }
            if contents.len() > MAX_FILE_SIZE as usize {
                warn!(
                    "{name:?} has {} bytes, only {MAX_FILE_SIZE} are kept",
                    contents.len()
                );
            }
            let index = self.create_in(ROOT_INODE, &name)?;
            let written = self.write(index, 0, &contents)?;
            info!("Packed {name:?} as inode {index} ({written} bytes)");
            packed += 1;
        }
        Ok(packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ram_disk;

    #[test]
    fn default_layout_matches_image_builder() {
        let fs = Filesystem::format(ram_disk(1440), &Geometry::default()).unwrap();
        let disk = fs.into_device();
        let mut fs = Filesystem::open(disk).unwrap();
        let superblock = fs.superblock().unwrap();
        assert_eq!({ superblock.data_start }, 12);

        let raw = |fs: &mut Filesystem, index: u32| fs.load_block(index).unwrap().data;
        let first = raw(&mut fs, 1);
        assert_eq!(&first[0..4], b"FXEJ");
        assert_eq!(&first[4..8], &1440u32.to_le_bytes());
        assert_eq!(&first[8..12], &128u32.to_le_bytes());
        assert_eq!(&first[24..28], &12u32.to_le_bytes());

        let inode_bitmap = raw(&mut fs, 2);
        assert_eq!(inode_bitmap[0], 0x03);
        assert!(inode_bitmap[1..].iter().all(|&b| b == 0));

        let block_bitmap = raw(&mut fs, 3);
        assert_eq!(&block_bitmap[0..3], &[0xFF, 0x1F, 0x00]);

        // root inode record at table offset 30
        let table = raw(&mut fs, 4);
        assert_eq!(&table[30..32], &[2, 0]);
        assert_eq!(&table[32..36], &1024u32.to_le_bytes());
        assert_eq!(&table[40..42], &12u16.to_le_bytes());

        let root = raw(&mut fs, 12);
        assert_eq!(&root[0..3], &[1, 0, b'.']);
        assert_eq!(&root[16..20], &[1, 0, b'.', b'.']);
        assert!(root[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn impossible_geometry_rejected() {
        let geometry = Geometry {
            total_blocks: 1440,
            total_inodes: 1000,
            inode_table_blocks: 8,
        };
        assert!(matches!(
            Filesystem::format(ram_disk(1440), &geometry),
            Err(Error::InvalidGeometry)
        ));
    }

    #[test]
    fn pack_truncates_large_files() {
        let mut fs = Filesystem::format(ram_disk(1440), &Geometry::default()).unwrap();
        let files = vec![
            ("kernel.elf".to_string(), vec![7u8; 12_000]),
            ("motd".to_string(), b"welcome".to_vec()),
        ];
        assert_eq!(fs.pack_files(files).unwrap(), 2);
        let kernel = fs.resolve("kernel.elf").unwrap();
        assert_eq!(fs.size_of(kernel).unwrap(), MAX_FILE_SIZE);
        let motd = fs.resolve("/motd").unwrap();
        let mut buffer = [0u8; 16];
        assert_eq!(fs.read(motd, 0, &mut buffer).unwrap(), 7);
        assert_eq!(&buffer[..7], b"welcome");
    }

    #[test]
    fn pack_skips_names_equal_after_truncation() {
        let mut fs = Filesystem::format(ram_disk(1440), &Geometry::default()).unwrap();
        let inodes = fs.inode_bitmap().unwrap().used();
        let files = vec![
            ("configuration_a".to_string(), vec![b'A'; 20]),
            ("configuration_b".to_string(), b"bb".to_vec()),
        ];
        assert_eq!(fs.pack_files(files).unwrap(), 1);
        assert_eq!(fs.inode_bitmap().unwrap().used(), inodes + 1);
        let names: Vec<String> = fs
            .list(ROOT_INODE)
            .unwrap()
            .map(|child| child.unwrap().name)
            .collect();
        assert_eq!(names, vec!["configuration_"]);
        let file = fs.resolve("configuration_").unwrap();
        let mut buffer = [0u8; 32];
        assert_eq!(fs.read(file, 0, &mut buffer).unwrap(), 20);
        assert_eq!(&buffer[..20], &[b'A'; 20]);
    }
}
