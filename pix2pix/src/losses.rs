//! Loss functions for adversarial training.
//!
//! Both losses reduce to a mean over every element and scale the result by a
//! configurable weight, matching how the discriminator (0.5) and the
//! composite objective (1 and 100) weigh their terms.

use burn::{
    prelude::*,
    tensor::{backend::Backend, ElementConversion, Tensor},
};

/// Configuration for [`BinaryCrossEntropyLoss`].
#[derive(Config, Debug)]
pub struct BinaryCrossEntropyLossConfig {
    #[config(default = 1.0)]
    pub weight: f64,
}

/// Binary cross-entropy on probabilities (inputs already passed through a sigmoid).
#[derive(Module, Debug)]
pub struct BinaryCrossEntropyLoss<B: Backend> {
    pub weight: f64,
    _phantom: std::marker::PhantomData<B>,
}

impl BinaryCrossEntropyLossConfig {
    pub const fn init<B: Backend>(&self) -> BinaryCrossEntropyLoss<B> {
        BinaryCrossEntropyLoss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> BinaryCrossEntropyLoss<B> {
    /// `-mean(y * log(p) + (1 - y) * log(1 - p)) * weight`.
    ///
    /// Log terms are clamped at -100 so saturated predictions give a large
    /// finite loss instead of infinity.
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
        assert_eq!(
            input.shape(),
            target.shape(),
            "Input and target must have the same shape. Got input: {:?}, target: {:?}",
            input.shape(),
            target.shape()
        );

        let log_clamp_min = (-100.0_f32).elem::<B::FloatElem>();
        let log_input = input.clone().log().clamp_min(log_clamp_min);
        let log_one_minus_input = input.neg().add_scalar(1.0).log().clamp_min(log_clamp_min);

        let one_minus_target = target.clone().neg().add_scalar(1.0);
        let loss = -(target * log_input + one_minus_target * log_one_minus_input);

        loss.mean().mul_scalar(self.weight)
    }
}

/// Configuration for [`MeanAbsoluteErrorLoss`].
#[derive(Config, Debug)]
pub struct MeanAbsoluteErrorLossConfig {
    #[config(default = 1.0)]
    pub weight: f64,
}

/// Mean absolute error (L1) loss.
#[derive(Module, Debug)]
pub struct MeanAbsoluteErrorLoss<B: Backend> {
    pub weight: f64,
    _phantom: std::marker::PhantomData<B>,
}

impl MeanAbsoluteErrorLossConfig {
    pub const fn init<B: Backend>(&self) -> MeanAbsoluteErrorLoss<B> {
        MeanAbsoluteErrorLoss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> MeanAbsoluteErrorLoss<B> {
    pub fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        (pred - target).abs().mean().mul_scalar(self.weight)
    }
}
