//! pix2pix training
//!
//! Trains a U-Net generator against a PatchGAN discriminator on an archive
//! written by `prepare_dataset`. Sample grids (`plot_NNNNNN.png`) and
//! generator checkpoints (`model_NNNNNN.mpk`) land in the artifact directory
//! together with the `config.json` of the run.
//!
//! ## Features
//!
//! - `ndarray`: CPU backend using ndarray (default)
//! - `wgpu`: GPU backend using WGPU
//! - `cuda`: NVIDIA GPU backend using CUDA
//!
//! ## Usage
//!
//! ```bash
//! # Train with the default configuration
//! cargo run --release --bin train -- --archive maps_256.npz --artifact-dir runs/maps
//!
//! # Continue from a saved generator
//! cargo run --release --bin train -- --archive maps_256.npz --artifact-dir runs/maps2 \
//!     --config runs/maps/config.json --resume runs/maps/model_010960.mpk
//! ```

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use burn::config::Config;
use clap::Parser;
use pix2pix_burn::{load_archive, train, CheckpointCadence, TrainingConfig};
use pix2pix_demos::{create_device, get_backend_name, init_tracing, TrainingBackend};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dataset archive produced by `prepare_dataset`
    #[arg(short, long)]
    archive: PathBuf,

    /// Directory for sample grids, checkpoints and the run configuration
    #[arg(long)]
    artifact_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Write a sample grid and checkpoint every N steps instead of the configured cadence
    #[arg(long)]
    sample_every_steps: Option<usize>,

    /// Generator checkpoint to resume from
    #[arg(short, long)]
    resume: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainingConfig::load(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?,
        None => TrainingConfig::new(),
    };

    if let Some(epochs) = args.epochs {
        config.num_epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(steps) = args.sample_every_steps {
        config.cadence = CheckpointCadence::EverySteps(steps);
    }
    if let Some(resume) = args.resume {
        ensure!(
            resume.exists(),
            "Checkpoint file not found: {}",
            resume.display()
        );
        config.resume_generator = Some(resume);
    }

    let dataset = load_archive(&args.archive)
        .with_context(|| format!("Failed to load archive {}", args.archive.display()))?;

    tracing::info!(
        backend = get_backend_name(),
        epochs = config.num_epochs,
        batch_size = config.batch_size,
        learning_rate = config.learning_rate,
        cadence = ?config.cadence,
        "configuration loaded"
    );

    let device = create_device();
    let summary = train::<TrainingBackend>(&args.artifact_dir, &config, &dataset, &device)
        .context("Training failed")?;

    if let Some(losses) = summary.last_losses {
        tracing::info!(
            steps = summary.steps,
            checkpoints = summary.checkpoints.len(),
            d_loss_real = losses.d_loss_real,
            d_loss_fake = losses.d_loss_fake,
            g_loss = losses.g_loss,
            "run finished"
        );
    }

    Ok(())
}
