use std::io::Write;

use clap::Parser;

use jexfs::cli::DebuggerArgs;
use jexfs::structs::ROOT_INODE;
use jexfs::Filesystem;

fn prompt(separator: &str) -> Option<Vec<String>> {
    let mut line = String::new();
    print!("{separator}");
    std::io::stdout().flush().ok()?;
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.split_whitespace().map(str::to_string).collect()),
    }
}

fn usage() {
    println!("s        superblock");
    println!("i [n]    inode bitmap, or inode n");
    println!("b [n]    block bitmap, or block n");
    println!("d [n]    entries of directory n (root by default)");
    println!("q        quit");
}

/// Returns false once the session should end
fn execute(fs: &mut Filesystem, cmd: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let Some(command) = cmd.first() else {
        return Ok(true);
    };
    let argument = cmd.get(1).map(|arg| arg.parse::<u32>()).transpose()?;
    match (command.as_str(), argument) {
        ("s", _) => println!["{}", fs.superblock()?],
        ("i", Some(index)) => println!["{}", fs.stat(index)?],
        ("i", None) => println!["{}", fs.inode_bitmap()?],
        ("b", Some(index)) => println!["{}", fs.load_block(index)?],
        ("b", None) => println!["{}", fs.block_bitmap()?],
        ("d", index) => {
            let index = index.unwrap_or(ROOT_INODE);
            for child in fs.list(index)? {
                let child = child?;
                let marker = if child.is_dir { "/" } else { "" };
                println!["{:>5}  {}{marker}", child.inode, child.name];
            }
        }
        ("q", _) => return Ok(false),
        _ => usage(),
    }
    Ok(true)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = DebuggerArgs::parse();
    let dev = std::fs::File::options().read(true).open(&args.image)?;
    let mut fs = Filesystem::open(Box::new(dev))?;
    while let Some(cmd) = prompt(">> ") {
        match execute(&mut fs, &cmd) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}
