//! Bitmap blob commands
//!
//! Decodes serialized sparse bitmaps for inspection and encodes bit lists
//! into blobs.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use polscope_policy::SparseBitSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Bitmap subcommands
#[derive(Subcommand)]
pub enum BitmapCommand {
    /// Print the nodes and set bits of a serialized bitmap
    Decode(DecodeArgs),

    /// Write a serialized bitmap holding the given bits
    Encode(EncodeArgs),
}

/// Arguments for the bitmap decode command
#[derive(Args)]
pub struct DecodeArgs {
    /// Path to the blob
    pub file: PathBuf,
}

/// Arguments for the bitmap encode command
#[derive(Args)]
pub struct EncodeArgs {
    /// Comma-separated bit positions
    #[clap(long, value_delimiter = ',')]
    pub bits: Vec<u32>,

    /// Where to write the blob
    #[clap(long)]
    pub out: PathBuf,
}

/// Implementation of the bitmap commands
pub fn execute_bitmap(command: &BitmapCommand) -> Result<()> {
    match command {
        BitmapCommand::Decode(args) => execute_decode(args),
        BitmapCommand::Encode(args) => execute_encode(args),
    }
}

fn execute_decode(args: &DecodeArgs) -> Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let set = SparseBitSet::deserialize(&bytes)
        .with_context(|| format!("{} is not a valid bitmap", args.file.display()))?;

    println!("highbit: {}", set.highbit());
    for node in set.nodes() {
        println!("node {}: {:#018x}", node.startbit, node.map);
    }
    let bits: Vec<String> = set.iter().map(|bit| bit.to_string()).collect();
    println!("bits: {}", bits.join(","));
    Ok(())
}

fn execute_encode(args: &EncodeArgs) -> Result<()> {
    let set: SparseBitSet = args.bits.iter().copied().collect();
    let blob = set.serialize()?;
    fs::write(&args.out, &blob)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    debug!(nodes = set.nodes().len(), bytes = blob.len(), "encoded bitmap");
    println!(
        "wrote {} bytes ({} bits) to {}",
        blob.len(),
        set.len(),
        args.out.display()
    );
    Ok(())
}
