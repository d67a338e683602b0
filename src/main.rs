use std::fs::OpenOptions;
use std::path::Path;

use clap::Parser;
use fuser::MountOption;
use log::info;

use jexfs::cli::{JexCli, MkfsArgs, MountArgs};
use jexfs::filesystem::FuseFs;
use jexfs::structs::BLOCK_SIZE;
use jexfs::Filesystem;

/// Regular, non-hidden files of `dir` sorted by name
fn host_files(dir: &Path) -> std::io::Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_file() {
            continue;
        }
        files.push((name, std::fs::read(entry.path())?));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn mkfs(args: MkfsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = args.geometry();
    let image = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.image)?;
    image.set_len(geometry.total_blocks as u64 * BLOCK_SIZE as u64)?;
    let mut fs = Filesystem::format(Box::new(image), &geometry)?;
    if let Some(source) = &args.source {
        let packed = fs.pack_files(host_files(source)?)?;
        info!("Packed {packed} files from {}", source.display());
    }
    println!(
        "Wrote {} ({} blocks, {} inodes)",
        args.image.display(),
        geometry.total_blocks,
        geometry.total_inodes
    );
    Ok(())
}

fn mount(args: MountArgs) -> Result<(), Box<dyn std::error::Error>> {
    let image = OpenOptions::new().read(true).write(true).open(&args.image)?;
    let fs = Filesystem::open(Box::new(image))?;
    let options = vec![
        MountOption::FSName("jexfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    info!("Mounting {} on {}", args.image.display(), args.mountpoint.display());
    fuser::mount2(FuseFs::new(fs), &args.mountpoint, &options)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    match JexCli::parse() {
        JexCli::Mkfs(args) => mkfs(args),
        JexCli::Mount(args) => mount(args),
    }
}
