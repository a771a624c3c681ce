//! Configuration for pix2pix training runs.
//!
//! All structures derive Burn's [`Config`], so a run can be saved to and
//! restored from JSON with [`Config::save`] and [`Config::load`].

use std::path::PathBuf;

use burn::{optim::AdamConfig, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Pix2PixError, Pix2PixResult},
    models::{DiscriminatorConfig, GeneratorConfig, GENERATOR_INPUT_MULTIPLE},
};

/// Spatial size of one image half, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

impl ImageSize {
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Number of bytes in one RGB image of this size.
    pub const fn rgb_len(&self) -> usize {
        self.height as usize * self.width as usize * 3
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

/// How often sample grids and generator checkpoints are written.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum CheckpointCadence {
    /// Every `k` training steps.
    EverySteps(usize),
    /// Every `k` full passes over the dataset.
    EveryEpochs(usize),
}

impl CheckpointCadence {
    /// Interval in steps, given the number of steps in one epoch.
    #[must_use]
    pub const fn interval(&self, steps_per_epoch: usize) -> usize {
        match self {
            Self::EverySteps(k) => *k,
            Self::EveryEpochs(k) => *k * steps_per_epoch,
        }
    }

    /// Whether the 1-based `step` is a checkpoint step.
    #[must_use]
    pub const fn fires(&self, step: usize, steps_per_epoch: usize) -> bool {
        let interval = self.interval(steps_per_epoch);
        interval != 0 && step % interval == 0
    }
}

/// Complete configuration of a pix2pix training run.
#[derive(Config)]
pub struct TrainingConfig {
    /// Generator architecture.
    #[config(default = "GeneratorConfig::new()")]
    pub generator: GeneratorConfig,

    /// Discriminator architecture.
    #[config(default = "DiscriminatorConfig::new()")]
    pub discriminator: DiscriminatorConfig,

    /// Adam settings shared by both networks.
    #[config(default = "AdamConfig::new().with_beta_1(0.5)")]
    pub optimizer: AdamConfig,

    #[config(default = 2e-4)]
    pub learning_rate: f64,

    #[config(default = 100)]
    pub num_epochs: usize,

    #[config(default = 1)]
    pub batch_size: usize,

    /// Number of columns in each sample grid.
    #[config(default = 3)]
    pub n_samples: usize,

    /// Scale applied to the discriminator's cross-entropy.
    #[config(default = 0.5)]
    pub discriminator_loss_weight: f64,

    /// Weight of the adversarial term in the generator objective.
    #[config(default = 1.0)]
    pub adversarial_weight: f64,

    /// Weight of the L1 reconstruction term in the generator objective.
    #[config(default = 100.0)]
    pub reconstruction_weight: f64,

    #[config(default = "CheckpointCadence::EveryEpochs(10)")]
    pub cadence: CheckpointCadence,

    /// Random seed for batch sampling and weight initialization.
    #[config(default = 42)]
    pub seed: u64,

    /// Generator checkpoint to restore before training.
    #[config(default = "None")]
    pub resume_generator: Option<PathBuf>,
}

impl TrainingConfig {
    /// Checks the run settings against the dataset image size.
    ///
    /// # Errors
    ///
    /// Returns [`Pix2PixError::InvalidConfiguration`] for a zero batch size,
    /// a zero cadence interval, or an image side the U-Net cannot halve
    /// down to its bottleneck.
    pub fn validate(&self, image_size: ImageSize) -> Pix2PixResult<()> {
        if self.batch_size == 0 {
            return Err(Pix2PixError::InvalidConfiguration {
                reason: "batch size must be at least 1".to_string(),
            });
        }
        if self.n_samples == 0 {
            return Err(Pix2PixError::InvalidConfiguration {
                reason: "sample count must be at least 1".to_string(),
            });
        }
        let (CheckpointCadence::EverySteps(k) | CheckpointCadence::EveryEpochs(k)) = self.cadence;
        if k == 0 {
            return Err(Pix2PixError::InvalidConfiguration {
                reason: "checkpoint cadence must be at least 1".to_string(),
            });
        }
        let multiple = GENERATOR_INPUT_MULTIPLE as u32;
        if image_size.height == 0
            || image_size.width == 0
            || image_size.height % multiple != 0
            || image_size.width % multiple != 0
        {
            return Err(Pix2PixError::InvalidConfiguration {
                reason: format!(
                    "image size {}x{} must be a non-zero multiple of {multiple}",
                    image_size.height, image_size.width
                ),
            });
        }
        if self.generator.in_channels != self.discriminator.in_channels
            || self.generator.out_channels != self.discriminator.in_channels
        {
            return Err(Pix2PixError::InvalidConfiguration {
                reason: format!(
                    "generator maps {} to {} channels but the discriminator expects {}",
                    self.generator.in_channels,
                    self.generator.out_channels,
                    self.discriminator.in_channels
                ),
            });
        }
        Ok(())
    }

    /// Number of steps in one epoch: `dataset_len / batch_size`, floored.
    #[must_use]
    pub const fn steps_per_epoch(&self, dataset_len: usize) -> usize {
        dataset_len / self.batch_size
    }

    /// Total step budget of the run.
    #[must_use]
    pub const fn total_steps(&self, dataset_len: usize) -> usize {
        self.steps_per_epoch(dataset_len) * self.num_epochs
    }
}
