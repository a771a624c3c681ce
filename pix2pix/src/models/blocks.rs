//! Convolution stages shared by the generator and discriminator.
//!
//! Both networks are described as lists of [`StageSpec`]s. One builder turns
//! a spec into a [`DownsampleStage`], another into an [`UpsampleStage`], so the
//! conditional normalization and dropout live in exactly one place each.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, LeakyRelu,
        LeakyReluConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Declarative description of one encoder or decoder stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    /// Output channels as a multiple of the network's base width.
    pub width: usize,
    /// Apply batch normalization after the convolution.
    pub normalize: bool,
    /// Apply dropout after normalization.
    pub dropout: bool,
}

impl StageSpec {
    pub const fn new(width: usize, normalize: bool, dropout: bool) -> Self {
        Self {
            width,
            normalize,
            dropout,
        }
    }

    /// Output channels for a network with the given base width.
    pub const fn channels(&self, base_channels: usize) -> usize {
        self.width * base_channels
    }
}

/// Normal(0, std) weight initializer used by every pix2pix layer.
pub fn normal_initializer(std: f64) -> Initializer {
    Initializer::Normal { mean: 0.0, std }
}

/// Batch normalization with momentum 0.01 (Burn weighs the new batch statistics,
/// the complement of Keras' 0.99) and epsilon 1e-3.
fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels)
        .with_momentum(0.01)
        .with_epsilon(1e-3)
        .init(device)
}

/// Settings shared by every stage of one network.
#[derive(Debug, Clone, Copy)]
pub struct StageSettings {
    pub init_std: f64,
    pub leaky_slope: f64,
    pub dropout: f64,
}

/// 4x4 stride-2 convolution, optional batch norm, LeakyReLU.
#[derive(Module, Debug)]
pub struct DownsampleStage<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    pub(crate) norm: Option<BatchNorm<B, 2>>,
    activation: LeakyRelu,
}

impl<B: Backend> DownsampleStage<B> {
    /// Builds a stage reading `in_channels` and producing `out_channels`.
    pub fn new(
        spec: StageSpec,
        in_channels: usize,
        out_channels: usize,
        settings: StageSettings,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [4, 4])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_initializer(normal_initializer(settings.init_std))
            .init(device);
        let norm = spec
            .normalize
            .then(|| batch_norm(out_channels, device));
        let activation = LeakyReluConfig::new()
            .with_negative_slope(settings.leaky_slope)
            .init();

        Self {
            conv,
            norm,
            activation,
        }
    }

    /// Halves the spatial resolution of `x`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        self.activation.forward(x)
    }
}

/// 4x4 stride-2 transposed convolution, batch norm, optional dropout,
/// skip concatenation, ReLU.
#[derive(Module, Debug)]
pub struct UpsampleStage<B: Backend> {
    conv: ConvTranspose2d<B>,
    norm: BatchNorm<B, 2>,
    dropout: Option<Dropout>,
    activation: Relu,
}

impl<B: Backend> UpsampleStage<B> {
    /// Builds a stage reading `in_channels` and producing `out_channels`
    /// before the skip activations are appended.
    pub fn new(
        spec: StageSpec,
        in_channels: usize,
        out_channels: usize,
        settings: StageSettings,
        device: &B::Device,
    ) -> Self {
        let conv = ConvTranspose2dConfig::new([in_channels, out_channels], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_initializer(normal_initializer(settings.init_std))
            .init(device);
        let dropout = spec
            .dropout
            .then(|| DropoutConfig::new(settings.dropout).init());

        Self {
            conv,
            norm: batch_norm(out_channels, device),
            dropout,
            activation: Relu::new(),
        }
    }

    /// Doubles the spatial resolution of `x` and joins it with `skip` on channels.
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.norm.forward(self.conv.forward(x));
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        self.activation.forward(Tensor::cat(vec![x, skip], 1))
    }
}
