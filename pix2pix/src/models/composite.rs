//! Generator objective through a frozen discriminator.
//!
//! The composite model owns no parameters. It borrows the generator and a
//! read-only discriminator, and its loss only ever feeds the generator's
//! optimizer. Every discriminator parameter, normalization scale and shift
//! included, has gradient tracking switched off in the view it uses.

use burn::{prelude::*, tensor::backend::AutodiffBackend};

use super::{Discriminator, Generator};
use crate::losses::{
    BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig, MeanAbsoluteErrorLoss,
    MeanAbsoluteErrorLossConfig,
};

/// Losses produced by one composite forward pass.
#[derive(Debug, Clone)]
pub struct CompositeLoss<B: Backend> {
    /// Weighted sum of both terms; the only tensor to backpropagate.
    pub total: Tensor<B, 1>,
    /// Weighted cross-entropy of the discriminator's verdict on generated images.
    pub adversarial: Tensor<B, 1>,
    /// Weighted L1 distance between generated and real targets.
    pub reconstruction: Tensor<B, 1>,
}

/// Generator objective: `adversarial_weight * BCE + reconstruction_weight * L1`.
#[derive(Module, Debug)]
pub struct CompositeModel<B: Backend> {
    adversarial: BinaryCrossEntropyLoss<B>,
    reconstruction: MeanAbsoluteErrorLoss<B>,
}

impl<B: Backend> CompositeModel<B> {
    pub fn new(adversarial_weight: f64, reconstruction_weight: f64) -> Self {
        Self {
            adversarial: BinaryCrossEntropyLossConfig::new()
                .with_weight(adversarial_weight)
                .init(),
            reconstruction: MeanAbsoluteErrorLossConfig::new()
                .with_weight(reconstruction_weight)
                .init(),
        }
    }
}

impl<B: AutodiffBackend> CompositeModel<B> {
    /// A copy of `discriminator` whose parameters are excluded from autodiff.
    ///
    /// Gradients still flow through it into its inputs, so generator
    /// parameters receive the adversarial signal.
    pub fn frozen_view(discriminator: &Discriminator<B>) -> Discriminator<B> {
        discriminator.clone().no_grad()
    }

    /// Runs `sources` through the generator and the frozen discriminator.
    ///
    /// `labels` is the patch grid the generator wants the discriminator to
    /// output (all ones), `targets` the real translations.
    pub fn forward(
        &self,
        generator: &Generator<B>,
        discriminator: &Discriminator<B>,
        sources: Tensor<B, 4>,
        labels: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> CompositeLoss<B> {
        let frozen = Self::frozen_view(discriminator);

        let generated = generator.forward(sources.clone());
        let verdict = frozen.forward(sources, generated.clone());

        let adversarial = self.adversarial.forward(verdict, labels);
        let reconstruction = self.reconstruction.forward(generated, targets);
        let total = adversarial.clone() + reconstruction.clone();

        CompositeLoss {
            total,
            adversarial,
            reconstruction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscriminatorConfig, GeneratorConfig};
    use burn::{
        backend::{Autodiff, NdArray},
        module::AutodiffModule,
        optim::{AdamConfig, GradientsParams, Optimizer},
        tensor::Distribution,
    };

    type TestBackend = Autodiff<NdArray>;

    fn snapshot(discriminator: &Discriminator<TestBackend>) -> Vec<Vec<f32>> {
        let mut values = vec![discriminator
            .head
            .weight
            .val()
            .into_data()
            .to_vec::<f32>()
            .unwrap()];
        for stage in &discriminator.stages {
            values.push(stage.conv.weight.val().into_data().to_vec::<f32>().unwrap());
            if let Some(norm) = &stage.norm {
                values.push(norm.gamma.val().into_data().to_vec::<f32>().unwrap());
                values.push(norm.beta.val().into_data().to_vec::<f32>().unwrap());
            }
        }
        values
    }

    fn batch(device: &<TestBackend as Backend>::Device) -> (Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        let sources = Tensor::random([1, 3, 256, 256], Distribution::Uniform(-1.0, 1.0), device);
        let targets = Tensor::random([1, 3, 256, 256], Distribution::Uniform(-1.0, 1.0), device);
        (sources, targets)
    }

    #[test]
    fn test_total_is_weighted_sum() {
        let device = Default::default();
        let generator = GeneratorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let discriminator = DiscriminatorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let composite = CompositeModel::new(1.0, 100.0);

        let (sources, targets) = batch(&device);
        let labels = Tensor::ones([1, 1, 8, 8], &device);
        let loss = composite.forward(&generator, &discriminator, sources, labels, targets);

        let total = loss.total.into_scalar();
        let parts = loss.adversarial.into_scalar() + loss.reconstruction.into_scalar();
        assert!((total - parts).abs() < 1e-3 * total.abs().max(1.0));
    }

    #[test]
    fn test_frozen_view_has_no_gradients() {
        let device = Default::default();
        let generator = GeneratorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let discriminator = DiscriminatorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let composite = CompositeModel::new(1.0, 100.0);

        let (sources, targets) = batch(&device);
        let labels = Tensor::ones([1, 1, 8, 8], &device);
        let loss = composite.forward(&generator, &discriminator, sources, labels, targets);
        let grads = loss.total.backward();

        assert!(discriminator.head.weight.val().grad(&grads).is_none());
        assert!(generator
            .encoders_first_weight()
            .grad(&grads)
            .is_some());
    }

    #[test]
    fn test_generator_step_leaves_discriminator_unchanged() {
        let device = Default::default();
        let mut generator = GeneratorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let discriminator = DiscriminatorConfig::new()
            .with_base_channels(2)
            .init::<TestBackend>(&device);
        let composite = CompositeModel::new(1.0, 100.0);
        let mut optim = AdamConfig::new()
            .with_beta_1(0.5)
            .init::<TestBackend, Generator<TestBackend>>();

        let before = snapshot(&discriminator);
        let generator_before = generator
            .encoders_first_weight()
            .inner()
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        let (sources, targets) = batch(&device);
        let labels = Tensor::ones([1, 1, 8, 8], &device);
        let loss = composite.forward(&generator, &discriminator, sources, labels, targets);
        let grads = GradientsParams::from_grads(loss.total.backward(), &generator);
        generator = optim.step(2e-4, generator, grads);

        assert_eq!(before, snapshot(&discriminator));

        let generator_after = generator
            .valid()
            .encoders_first_weight()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_ne!(generator_before, generator_after);
    }
}
