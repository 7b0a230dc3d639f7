mod chain;
mod cli;
mod fst;
mod layout;
mod repair;
mod stage1;
mod superblock;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use log::info;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    let payload = fs::read(&args.stage2)
        .with_context(|| format!("Failed to read stage2 payload {:?}", args.stage2))?;
    info!("Read {} bytes of stage2 payload", payload.len());

    let build = superblock::build(&payload, args.generation)?;

    for (placement, name) in [
        (build.layout.stage1, "stage1"),
        (build.layout.recovery, "repair data"),
        (build.layout.stage2, "stage2"),
    ] {
        println!(
            "(offs {:#07x}) {:#010x} -> {}",
            placement.image_offset(),
            placement.addr(),
            name
        );
    }

    fs::write(&args.output, &build.image)
        .with_context(|| format!("Failed to write superblock {:?}", args.output))?;

    let mut sha_path = args.output.clone().into_os_string();
    sha_path.push(".sha");
    let sha_path = PathBuf::from(sha_path);
    let digest = Sha1::digest(&build.image);
    fs::write(&sha_path, digest)
        .with_context(|| format!("Failed to write superblock hash {sha_path:?}"))?;

    println!("isfshax: written superblock to {}", args.output.display());
    Ok(())
}
