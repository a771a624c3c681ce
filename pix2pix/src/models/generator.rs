//! U-Net generator.
//!
//! Seven encoder stages halve the input down to a 1x1 bottleneck (at 256x256),
//! seven decoder stages climb back up, each joined with the activations of its
//! mirror encoder stage. A final transposed convolution and `tanh` produce an
//! image in `[-1, 1]`.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        PaddingConfig2d, Relu, Tanh,
    },
    prelude::*,
};

use super::blocks::{
    normal_initializer, DownsampleStage, StageSettings, StageSpec, UpsampleStage,
};

/// Encoder stages, outermost first. The first stage skips normalization.
pub const ENCODER_STAGES: [StageSpec; 7] = [
    StageSpec::new(1, false, false),
    StageSpec::new(2, true, false),
    StageSpec::new(4, true, false),
    StageSpec::new(8, true, false),
    StageSpec::new(8, true, false),
    StageSpec::new(8, true, false),
    StageSpec::new(8, true, false),
];

/// Bottleneck width as a multiple of the base channels.
pub const BOTTLENECK_WIDTH: usize = 8;

/// Decoder stages, innermost first. Only the three stages next to the
/// bottleneck use dropout.
pub const DECODER_STAGES: [StageSpec; 7] = [
    StageSpec::new(8, true, true),
    StageSpec::new(8, true, true),
    StageSpec::new(8, true, true),
    StageSpec::new(8, true, false),
    StageSpec::new(4, true, false),
    StageSpec::new(2, true, false),
    StageSpec::new(1, true, false),
];

/// Input sides must be a multiple of this (encoder stages plus bottleneck).
pub const GENERATOR_INPUT_MULTIPLE: usize = 1 << (ENCODER_STAGES.len() + 1);

/// Configuration for the U-Net [`Generator`].
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 3)]
    pub out_channels: usize,
    /// Channels of the outermost encoder stage.
    #[config(default = 64)]
    pub base_channels: usize,
    /// Dropout probability of the inner decoder stages.
    #[config(default = 0.5)]
    pub dropout: f64,
    #[config(default = 0.02)]
    pub init_std: f64,
    #[config(default = 0.2)]
    pub leaky_slope: f64,
}

impl GeneratorConfig {
    /// Initializes a [`Generator`] on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let settings = StageSettings {
            init_std: self.init_std,
            leaky_slope: self.leaky_slope,
            dropout: self.dropout,
        };
        let base = self.base_channels;

        let mut encoders = Vec::with_capacity(ENCODER_STAGES.len());
        let mut skip_channels = Vec::with_capacity(ENCODER_STAGES.len());
        let mut channels = self.in_channels;
        for spec in ENCODER_STAGES {
            let out = spec.channels(base);
            encoders.push(DownsampleStage::new(spec, channels, out, settings, device));
            skip_channels.push(out);
            channels = out;
        }

        let bottleneck_channels = BOTTLENECK_WIDTH * base;
        let bottleneck = Conv2dConfig::new([channels, bottleneck_channels], [4, 4])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_initializer(normal_initializer(self.init_std))
            .init(device);
        channels = bottleneck_channels;

        let mut decoders = Vec::with_capacity(DECODER_STAGES.len());
        for (spec, skip) in DECODER_STAGES.into_iter().zip(skip_channels.into_iter().rev()) {
            let out = spec.channels(base);
            decoders.push(UpsampleStage::new(spec, channels, out, settings, device));
            channels = out + skip;
        }

        let output = ConvTranspose2dConfig::new([channels, self.out_channels], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_initializer(normal_initializer(self.init_std))
            .init(device);

        Generator {
            encoders,
            bottleneck,
            decoders,
            output,
            relu: Relu::new(),
            tanh: Tanh::new(),
        }
    }
}

/// U-Net generator mapping a source image to a synthesized target image.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    encoders: Vec<DownsampleStage<B>>,
    bottleneck: Conv2d<B>,
    decoders: Vec<UpsampleStage<B>>,
    output: ConvTranspose2d<B>,
    relu: Relu,
    tanh: Tanh,
}

impl<B: Backend> Generator<B> {
    /// Translates `[n, in_channels, H, W]` sources into `[n, out_channels, H, W]`
    /// images in `[-1, 1]`.
    pub fn forward(&self, source: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.encoders.len());
        let mut x = source;
        for encoder in &self.encoders {
            x = encoder.forward(x);
            skips.push(x.clone());
        }

        x = self.relu.forward(self.bottleneck.forward(x));

        for (decoder, skip) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = decoder.forward(x, skip);
        }

        self.tanh.forward(self.output.forward(x))
    }

    #[cfg(test)]
    pub(crate) fn encoders_first_weight(&self) -> Tensor<B, 4> {
        self.encoders[0].conv.weight.val()
    }
}
