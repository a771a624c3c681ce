//! PatchGAN discriminator.
//!
//! Judges a channel-concatenated (source, target) pair patch by patch: the
//! output is a grid of probabilities, one per receptive field, rather than a
//! single verdict for the whole image.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Sigmoid,
    },
    prelude::*,
    tensor::ElementConversion,
};

use super::blocks::{normal_initializer, DownsampleStage, StageSettings, StageSpec};

/// Downsampling stages. Every stage after the first is normalized.
pub const DISCRIMINATOR_STAGES: [StageSpec; 5] = [
    StageSpec::new(1, false, false),
    StageSpec::new(2, true, false),
    StageSpec::new(4, true, false),
    StageSpec::new(8, true, false),
    StageSpec::new(8, true, false),
];

/// `(left, right, top, bottom)` zero padding in front of the 4x4 head.
const HEAD_PADDING: (usize, usize, usize, usize) = (1, 2, 1, 2);

/// Side length of the patch grid for an input side of `input` pixels.
#[must_use]
pub const fn patch_resolution(input: usize) -> usize {
    input >> DISCRIMINATOR_STAGES.len()
}

/// `[rows, columns]` of the patch grid for a `height` x `width` input.
#[must_use]
pub const fn patch_grid(height: usize, width: usize) -> [usize; 2] {
    [patch_resolution(height), patch_resolution(width)]
}

/// Configuration for the PatchGAN [`Discriminator`].
#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Channels of each image in the pair.
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 64)]
    pub base_channels: usize,
    #[config(default = 0.02)]
    pub init_std: f64,
    #[config(default = 0.2)]
    pub leaky_slope: f64,
}

impl DiscriminatorConfig {
    /// Initializes a [`Discriminator`] on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let settings = StageSettings {
            init_std: self.init_std,
            leaky_slope: self.leaky_slope,
            dropout: 0.0,
        };

        let mut channels = self.in_channels * 2;
        let mut stages = Vec::with_capacity(DISCRIMINATOR_STAGES.len());
        for spec in DISCRIMINATOR_STAGES {
            let out = spec.channels(self.base_channels);
            stages.push(DownsampleStage::new(spec, channels, out, settings, device));
            channels = out;
        }

        // Unpadded here; `forward` pads 1 before and 2 after so the 4x4 kernel
        // keeps the patch grid at the resolution of the last stage.
        let head = Conv2dConfig::new([channels, 1], [4, 4])
            .with_padding(PaddingConfig2d::Valid)
            .with_initializer(normal_initializer(self.init_std))
            .init(device);

        Discriminator {
            stages,
            head,
            sigmoid: Sigmoid::new(),
        }
    }
}

/// PatchGAN discriminator over (source, target) image pairs.
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub(crate) stages: Vec<DownsampleStage<B>>,
    pub(crate) head: Conv2d<B>,
    sigmoid: Sigmoid,
}

impl<B: Backend> Discriminator<B> {
    /// Returns `[n, 1, H / 32, W / 32]` probabilities that each patch of
    /// `target` is a real translation of `source`.
    pub fn forward(&self, source: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = Tensor::cat(vec![source, target], 1);
        for stage in &self.stages {
            x = stage.forward(x);
        }
        let x = x.pad(HEAD_PADDING, B::FloatElem::from_elem(0.0));
        self.sigmoid.forward(self.head.forward(x))
    }
}
