//! pix2pix: conditional GAN for paired image-to-image translation.
//!
//! The crate covers the whole pipeline: loading paired images from disk,
//! packing them into a compressed archive, the U-Net generator and PatchGAN
//! discriminator, and the adversarial training loop that writes sample grids
//! and generator checkpoints.

pub mod archive;
pub mod config;
pub mod dataset;
pub mod error;
pub mod losses;
pub mod models;
pub mod sampling;
pub mod training;

#[cfg(test)]
mod tests;

pub use archive::{load_archive, save_archive};
pub use config::{CheckpointCadence, ImageSize, TrainingConfig};
pub use dataset::{
    load_paired_images, ImagePair, PairBatch, PairBatcher, PairLayout, PairedImageDataset,
};
pub use error::{Pix2PixError, Pix2PixResult};
pub use models::{
    CompositeLoss, CompositeModel, Discriminator, DiscriminatorConfig, Generator,
    GeneratorConfig,
};
pub use sampling::{load_generator_checkpoint, save_generator_checkpoint};
pub use training::{train, StepLosses, TrainingPhase, TrainingSummary};
