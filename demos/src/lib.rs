//! pix2pix command-line tools
//!
//! ## Available binaries
//!
//! - `prepare_dataset`: load paired images from a directory and pack them
//!   into a compressed `.npz` archive
//! - `train`: train a generator/discriminator pair on an archive
//!
//! ## Usage
//!
//! ```bash
//! # Pack side-by-side images
//! cargo run --release --bin prepare_dataset -- --input maps/train --output maps_256.npz
//!
//! # Train, writing a sample grid and checkpoint every 1096 steps
//! cargo run --release --bin train -- --archive maps_256.npz --artifact-dir runs/maps \
//!     --sample-every-steps 1096
//!
//! # Train on the GPU
//! cargo run --release --bin train --no-default-features --features wgpu -- \
//!     --archive maps_256.npz --artifact-dir runs/maps
//! ```
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

pub mod backend;

pub use backend::{
    create_device, get_backend_name, SelectedBackend, SelectedDevice, TrainingBackend,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a console subscriber filtered by `RUST_LOG`, `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .ok();
}
