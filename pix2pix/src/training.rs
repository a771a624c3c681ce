//! Adversarial training loop.
//!
//! Each step samples a real batch, updates the discriminator once on real and
//! once on generated pairs, then updates the generator through the composite
//! objective. Sample grids and generator checkpoints are written on the
//! configured cadence.

use std::path::{Path, PathBuf};

use burn::{
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::TrainingConfig,
    dataset::PairedImageDataset,
    error::{Pix2PixError, Pix2PixResult},
    losses::BinaryCrossEntropyLossConfig,
    models::{CompositeModel, Discriminator, Generator},
    sampling::{
        fake_batch, load_generator_checkpoint, real_batch, sample_indices,
        save_generator_checkpoint, summarize_performance,
    },
};

/// Phases of one training step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    SampleReal,
    UpdateDiscriminatorReal,
    SampleFake,
    UpdateDiscriminatorFake,
    UpdateGenerator,
    MaybeCheckpoint,
}

/// Scalar losses reported for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepLosses {
    /// Weighted discriminator loss on real pairs.
    pub d_loss_real: f64,
    /// Weighted discriminator loss on generated pairs.
    pub d_loss_fake: f64,
    /// Composite generator loss.
    pub g_loss: f64,
    pub adversarial: f64,
    pub reconstruction: f64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    /// Number of steps executed.
    pub steps: usize,
    /// Losses of the final step, if any step ran.
    pub last_losses: Option<StepLosses>,
    /// Generator checkpoints written, in order.
    pub checkpoints: Vec<PathBuf>,
    /// Sample grids written, in order.
    pub plots: Vec<PathBuf>,
}

fn enter(step: usize, phase: TrainingPhase) {
    tracing::debug!(step, ?phase, "training phase");
}

fn scalar<B: Backend>(loss: &Tensor<B, 1>) -> f64 {
    loss.clone().into_scalar().elem::<f64>()
}

/// Fails with [`Pix2PixError::NonFiniteLoss`] if `value` is NaN or infinite.
pub fn ensure_finite(step: usize, loss: &'static str, value: f64) -> Pix2PixResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Pix2PixError::NonFiniteLoss { step, loss })
    }
}

/// Trains a generator/discriminator pair on `dataset`, writing artifacts into
/// `artifact_dir`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the dataset is empty, a
/// loss diverges, or an artifact cannot be written.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &Path,
    config: &TrainingConfig,
    dataset: &PairedImageDataset,
    device: &B::Device,
) -> Pix2PixResult<TrainingSummary> {
    config.validate(dataset.image_size())?;
    if dataset.is_empty() {
        return Err(Pix2PixError::InvalidConfiguration {
            reason: "dataset holds no image pairs".to_string(),
        });
    }

    std::fs::create_dir_all(artifact_dir).map_err(|source| Pix2PixError::Io {
        path: artifact_dir.to_path_buf(),
        source,
    })?;
    let config_path = artifact_dir.join("config.json");
    config.save(&config_path).map_err(|source| Pix2PixError::Io {
        path: config_path.clone(),
        source,
    })?;

    B::seed(config.seed);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut generator: Generator<B> = match &config.resume_generator {
        Some(path) => {
            tracing::info!(checkpoint = %path.display(), "resuming generator from checkpoint");
            load_generator_checkpoint(&config.generator, path, device)?
        }
        None => config.generator.init(device),
    };
    let mut discriminator: Discriminator<B> = config.discriminator.init(device);

    let mut generator_optim = config.optimizer.init::<B, Generator<B>>();
    let mut discriminator_optim = config.optimizer.init::<B, Discriminator<B>>();

    let discriminator_loss = BinaryCrossEntropyLossConfig::new()
        .with_weight(config.discriminator_loss_weight)
        .init::<B>();
    let composite =
        CompositeModel::<B>::new(config.adversarial_weight, config.reconstruction_weight);

    let steps_per_epoch = config.steps_per_epoch(dataset.len());
    let total_steps = config.total_steps(dataset.len());
    if steps_per_epoch == 0 {
        tracing::warn!(
            pairs = dataset.len(),
            batch_size = config.batch_size,
            "batch size exceeds dataset size, no training steps will run"
        );
    }
    tracing::info!(
        pairs = dataset.len(),
        epochs = config.num_epochs,
        batch_size = config.batch_size,
        steps_per_epoch,
        total_steps,
        cadence = ?config.cadence,
        "starting training"
    );

    let mut summary = TrainingSummary::default();
    let lr = config.learning_rate;

    for step in 1..=total_steps {
        enter(step, TrainingPhase::SampleReal);
        let indices = sample_indices(&mut rng, dataset.len(), config.batch_size);
        let real = real_batch::<B>(dataset, &indices, device)?;

        enter(step, TrainingPhase::UpdateDiscriminatorReal);
        let verdict =
            discriminator.forward(real.batch.sources.clone(), real.batch.targets.clone());
        let loss = discriminator_loss.forward(verdict, real.labels.clone());
        let d_loss_real = ensure_finite(step, "d_loss_real", scalar(&loss))?;
        let grads = GradientsParams::from_grads(loss.backward(), &discriminator);
        discriminator = discriminator_optim.step(lr, discriminator, grads);

        enter(step, TrainingPhase::SampleFake);
        let (generated, fake_labels) = fake_batch(&generator, real.batch.sources.clone());

        enter(step, TrainingPhase::UpdateDiscriminatorFake);
        let verdict = discriminator.forward(real.batch.sources.clone(), generated);
        let loss = discriminator_loss.forward(verdict, fake_labels);
        let d_loss_fake = ensure_finite(step, "d_loss_fake", scalar(&loss))?;
        let grads = GradientsParams::from_grads(loss.backward(), &discriminator);
        discriminator = discriminator_optim.step(lr, discriminator, grads);

        enter(step, TrainingPhase::UpdateGenerator);
        let losses = composite.forward(
            &generator,
            &discriminator,
            real.batch.sources,
            real.labels,
            real.batch.targets,
        );
        let g_loss = ensure_finite(step, "g_loss", scalar(&losses.total))?;
        let adversarial = scalar(&losses.adversarial);
        let reconstruction = scalar(&losses.reconstruction);
        let grads = GradientsParams::from_grads(losses.total.backward(), &generator);
        generator = generator_optim.step(lr, generator, grads);

        tracing::info!(
            step,
            total_steps,
            d_loss_real,
            d_loss_fake,
            g_loss,
            "training step"
        );
        summary.steps = step;
        summary.last_losses = Some(StepLosses {
            d_loss_real,
            d_loss_fake,
            g_loss,
            adversarial,
            reconstruction,
        });

        enter(step, TrainingPhase::MaybeCheckpoint);
        if config.cadence.fires(step, steps_per_epoch) {
            let plot = summarize_performance(
                artifact_dir,
                step,
                &generator,
                dataset,
                config.n_samples,
                &mut rng,
                device,
            )?;
            let checkpoint = save_generator_checkpoint(&generator, artifact_dir, step)?;
            tracing::info!(
                step,
                plot = %plot.display(),
                checkpoint = %checkpoint.display(),
                "saved sample grid and generator checkpoint"
            );
            summary.plots.push(plot);
            summary.checkpoints.push(checkpoint);
        }
    }

    if total_steps > 0 && !config.cadence.fires(total_steps, steps_per_epoch) {
        let checkpoint = save_generator_checkpoint(&generator, artifact_dir, total_steps)?;
        tracing::info!(
            step = total_steps,
            checkpoint = %checkpoint.display(),
            "saved final generator checkpoint"
        );
        summary.checkpoints.push(checkpoint);
    }

    tracing::info!(steps = summary.steps, "training completed");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CheckpointCadence,
        models::{DiscriminatorConfig, GeneratorConfig},
    };
    use burn::backend::{Autodiff, NdArray};
    use ndarray::Array4;

    type TestBackend = Autodiff<NdArray>;

    fn dataset(len: usize) -> PairedImageDataset {
        sized_dataset(len, 256, 256)
    }

    fn sized_dataset(len: usize, height: usize, width: usize) -> PairedImageDataset {
        let sources = Array4::from_shape_fn((len, height, width, 3), |(n, y, x, c)| {
            ((n * 37 + y + x * 2 + c * 11) % 256) as u8
        });
        let targets = sources.mapv(|v| 255 - v);
        PairedImageDataset::new(sources, targets).unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::new()
            .with_generator(GeneratorConfig::new().with_base_channels(2))
            .with_discriminator(DiscriminatorConfig::new().with_base_channels(2))
            .with_num_epochs(1)
            .with_batch_size(1)
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite(1, "g_loss", 0.25).unwrap(), 0.25);
        match ensure_finite(7, "d_loss_fake", f64::NAN) {
            Err(Pix2PixError::NonFiniteLoss { step, loss }) => {
                assert_eq!(step, 7);
                assert_eq!(loss, "d_loss_fake");
            }
            other => panic!("Expected NonFiniteLoss error, got {other:?}"),
        }
        assert!(ensure_finite(1, "g_loss", f64::INFINITY).is_err());
    }

    #[test]
    fn test_one_epoch_checkpoints_every_step() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(4);
        let config = small_config().with_cadence(CheckpointCadence::EverySteps(1));

        let summary = train::<TestBackend>(dir.path(), &config, &data, &device).unwrap();

        assert_eq!(summary.steps, 4);
        assert_eq!(summary.plots.len(), 4);
        assert_eq!(summary.checkpoints.len(), 4);
        assert!(dir.path().join("config.json").exists());

        for step in 1..=4 {
            let plot = dir.path().join(format!("plot_{step:06}.png"));
            let checkpoint = dir.path().join(format!("model_{step:06}.mpk"));
            assert!(plot.exists(), "missing {}", plot.display());
            assert!(std::fs::metadata(&checkpoint).unwrap().len() > 0);
        }

        let losses = summary.last_losses.unwrap();
        assert!(losses.d_loss_real.is_finite());
        assert!(losses.d_loss_fake.is_finite());
        assert!(losses.g_loss >= losses.reconstruction);

        let restored = load_generator_checkpoint::<NdArray>(
            &config.generator,
            &dir.path().join("model_000004.mpk"),
            &device,
        )
        .unwrap();
        let input = Tensor::<NdArray, 4>::zeros([1, 3, 256, 256], &device);
        assert_eq!(restored.forward(input).dims(), [1, 3, 256, 256]);
    }

    #[test]
    fn test_non_square_images_train() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let data = sized_dataset(1, 256, 512);
        let config = small_config().with_cadence(CheckpointCadence::EverySteps(1));
        assert!(config.validate(data.image_size()).is_ok());

        let summary = train::<TestBackend>(dir.path(), &config, &data, &device).unwrap();
        assert_eq!(summary.steps, 1);
        let grid = image::open(&summary.plots[0]).unwrap();
        assert_eq!((grid.width(), grid.height()), (3 * 512, 3 * 256));
    }

    #[test]
    fn test_non_finite_loss_aborts_training() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = small_config()
            .with_reconstruction_weight(f64::NAN)
            .with_cadence(CheckpointCadence::EverySteps(1));

        match train::<TestBackend>(dir.path(), &config, &dataset(2), &device) {
            Err(Pix2PixError::NonFiniteLoss { step, loss }) => {
                assert_eq!(step, 1);
                assert_eq!(loss, "g_loss");
            }
            other => panic!("Expected NonFiniteLoss error, got {other:?}"),
        }
        assert!(!dir.path().join("plot_000001.png").exists());
        assert!(!dir.path().join("model_000001.mpk").exists());
        assert!(!dir.path().join("model_000002.mpk").exists());
    }

    #[test]
    fn test_cadence_and_final_checkpoint() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(3);
        let config = small_config().with_cadence(CheckpointCadence::EverySteps(2));

        let summary = train::<TestBackend>(dir.path(), &config, &data, &device).unwrap();

        assert_eq!(summary.steps, 3);
        assert_eq!(summary.plots, vec![dir.path().join("plot_000002.png")]);
        assert_eq!(
            summary.checkpoints,
            vec![
                dir.path().join("model_000002.mpk"),
                dir.path().join("model_000003.mpk"),
            ]
        );
        assert!(!dir.path().join("plot_000003.png").exists());
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(1);
        let config = small_config().with_cadence(CheckpointCadence::EveryEpochs(1));
        let first = train::<TestBackend>(dir.path(), &config, &data, &device).unwrap();

        let resumed_dir = tempfile::tempdir().unwrap();
        let config = config.with_resume_generator(Some(first.checkpoints[0].clone()));
        let second = train::<TestBackend>(resumed_dir.path(), &config, &data, &device).unwrap();
        assert_eq!(second.steps, 1);
    }

    #[test]
    fn test_missing_resume_checkpoint_fails() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = small_config()
            .with_resume_generator(Some(dir.path().join("model_000999.mpk")));

        assert!(matches!(
            train::<TestBackend>(dir.path(), &config, &dataset(1), &device),
            Err(Pix2PixError::Recorder { .. })
        ));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let empty = PairedImageDataset::new(
            Array4::zeros((0, 256, 256, 3)),
            Array4::zeros((0, 256, 256, 3)),
        )
        .unwrap();

        assert!(matches!(
            train::<TestBackend>(dir.path(), &small_config(), &empty, &device),
            Err(Pix2PixError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_oversized_batch_runs_no_steps() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = small_config().with_batch_size(8);

        let summary = train::<TestBackend>(dir.path(), &config, &dataset(2), &device).unwrap();
        assert_eq!(summary.steps, 0);
        assert!(summary.checkpoints.is_empty());
        assert!(summary.last_losses.is_none());
    }
}
