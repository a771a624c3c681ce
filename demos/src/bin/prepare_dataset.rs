//! Dataset preparation
//!
//! Loads paired images and packs them into a compressed `.npz` archive that
//! the `train` binary consumes.
//!
//! ## Usage
//!
//! ```bash
//! # Side-by-side images (source on the left, target on the right)
//! cargo run --bin prepare_dataset -- --input maps/train --output maps_256.npz
//!
//! # Sources and same-named targets in two directories
//! cargo run --bin prepare_dataset -- --input edges --target-dir photos --output edges2photos.npz
//! ```

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use pix2pix_burn::{load_paired_images, save_archive, ImageSize, PairLayout};
use pix2pix_demos::init_tracing;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of input images
    #[arg(short, long)]
    input: PathBuf,

    /// Directory of same-named target images; omit for side-by-side inputs
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Output archive path
    #[arg(short, long)]
    output: PathBuf,

    /// Height of each image after resizing
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Width of each image after resizing
    #[arg(long, default_value_t = 256)]
    width: u32,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    ensure!(
        args.height > 0 && args.width > 0,
        "Image size must be non-zero, got {}x{}",
        args.height,
        args.width
    );

    let layout = match args.target_dir {
        Some(target_dir) => PairLayout::SeparateDirs { target_dir },
        None => PairLayout::SideBySide,
    };
    let size = ImageSize::new(args.height, args.width);

    let dataset = load_paired_images(&args.input, &layout, size)
        .with_context(|| format!("Failed to load images from {}", args.input.display()))?;
    tracing::info!(
        sources = ?dataset.sources().shape(),
        targets = ?dataset.targets().shape(),
        "dataset loaded"
    );

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    save_archive(&args.output, &dataset)
        .with_context(|| format!("Failed to write archive {}", args.output.display()))?;

    Ok(())
}
