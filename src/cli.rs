use clap::Parser;
use std::path::PathBuf;

use crate::superblock::DEFAULT_GENERATION;

#[derive(Parser, Debug)]
#[command(
    name = "isfshax",
    about = "Build a crafted ISFS superblock that takes over boot1's directory walk",
    long_about = "Craft a superblock image whose directory table overflows boot1's recursive walk, hijacks the storage dispatch pointer and boots an embedded stage2 payload"
)]
pub struct Args {
    /// Stage2 payload binary to embed in the superblock
    pub stage2: PathBuf,

    /// Output path for the crafted image (SHA-1 digest goes to <output>.sha)
    pub output: PathBuf,

    /// Superblock generation number
    #[arg(long = "generation", default_value_t = DEFAULT_GENERATION)]
    pub generation: u32,

    /// Enable verbose debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
