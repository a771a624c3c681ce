//! Batch sampling, label grids and training artifacts.

use std::path::{Path, PathBuf};

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use image::RgbImage;
use rand::Rng;

use crate::{
    dataset::{to_display, PairBatch, PairBatcher, PairedImageDataset},
    error::{Pix2PixError, Pix2PixResult},
    models::{patch_grid, Generator, GeneratorConfig},
};

/// Recorder used for generator checkpoints.
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// `count` indices drawn uniformly from `0..len`, with replacement.
pub fn sample_indices<R: Rng>(rng: &mut R, len: usize, count: usize) -> Vec<usize> {
    (0..count).map(|_| rng.random_range(0..len)).collect()
}

/// All-ones `[count, 1, rows, columns]` patch grid marking real pairs.
pub fn real_labels<B: Backend>(
    count: usize,
    [rows, columns]: [usize; 2],
    device: &B::Device,
) -> Tensor<B, 4> {
    Tensor::ones([count, 1, rows, columns], device)
}

/// All-zeros `[count, 1, rows, columns]` patch grid marking generated pairs.
pub fn fake_labels<B: Backend>(
    count: usize,
    [rows, columns]: [usize; 2],
    device: &B::Device,
) -> Tensor<B, 4> {
    Tensor::zeros([count, 1, rows, columns], device)
}

/// A real batch with its label grid.
#[derive(Debug, Clone)]
pub struct RealBatch<B: Backend> {
    pub batch: PairBatch<B>,
    pub labels: Tensor<B, 4>,
}

/// Gathers `indices` from `dataset` as a real batch labelled all ones.
///
/// # Errors
///
/// Returns an error if an index is out of range.
pub fn real_batch<B: Backend>(
    dataset: &PairedImageDataset,
    indices: &[usize],
    device: &B::Device,
) -> Pix2PixResult<RealBatch<B>> {
    let items = dataset.gather(indices)?;
    let batch = PairBatcher::<B>::new().batch(items, device);
    let [count, _, height, width] = batch.sources.dims();
    let labels = real_labels(count, patch_grid(height, width), device);
    Ok(RealBatch { batch, labels })
}

/// Generated targets for `sources`, detached from the graph, labelled all zeros.
///
/// On an autodiff backend the generator runs in training mode: batch
/// statistics and dropout, the same forward pass the adversarial updates see.
pub fn fake_batch<B: Backend>(
    generator: &Generator<B>,
    sources: Tensor<B, 4>,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let [count, _, height, width] = sources.dims();
    let device = sources.device();
    let generated = generator.forward(sources).detach();
    let labels = fake_labels(count, patch_grid(height, width), &device);
    (generated, labels)
}

/// Converts a `[n, 3, H, W]` tensor in `[-1, 1]` to display images.
///
/// # Errors
///
/// Returns an error if the tensor data cannot be read back as `f32`.
pub fn tensor_to_images<B: Backend>(tensor: Tensor<B, 4>) -> Pix2PixResult<Vec<RgbImage>> {
    let [count, _, height, width] = tensor.dims();
    let values = tensor
        .permute([0, 2, 3, 1])
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Pix2PixError::TensorConversion {
            reason: format!("{e:?}"),
        })?;

    let per_image = height * width * 3;
    values
        .chunks(per_image)
        .take(count)
        .map(|chunk| {
            let bytes = chunk
                .iter()
                .map(|&v| (to_display(v).clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect();
            RgbImage::from_raw(width as u32, height as u32, bytes).ok_or_else(|| {
                Pix2PixError::TensorConversion {
                    reason: format!("buffer too small for a {width}x{height} image"),
                }
            })
        })
        .collect()
}

/// Lays out rows of equally sized images into one canvas.
pub fn image_grid(rows: &[Vec<RgbImage>]) -> RgbImage {
    let (cell_width, cell_height) = rows
        .iter()
        .flatten()
        .next()
        .map_or((0, 0), RgbImage::dimensions);
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;

    let mut canvas = RgbImage::new(columns * cell_width, rows.len() as u32 * cell_height);
    for (row, images) in rows.iter().enumerate() {
        for (column, image) in images.iter().enumerate() {
            image::imageops::replace(
                &mut canvas,
                image,
                i64::from(column as u32 * cell_width),
                i64::from(row as u32 * cell_height),
            );
        }
    }
    canvas
}

/// Zero-padded artifact name for a 1-based step, e.g. `plot_000004.png`.
pub fn plot_file_name(step: usize) -> String {
    format!("plot_{step:06}.png")
}

/// Zero-padded checkpoint stem for a 1-based step; the recorder adds `.mpk`.
pub fn checkpoint_stem(step: usize) -> String {
    format!("model_{step:06}")
}

/// Writes a 3-row grid: real sources, generated images, real targets.
///
/// # Errors
///
/// Returns an error if the tensors cannot be converted or the file cannot be written.
pub fn save_sample_grid<B: Backend>(
    path: &Path,
    sources: Tensor<B, 4>,
    generated: Tensor<B, 4>,
    targets: Tensor<B, 4>,
) -> Pix2PixResult<()> {
    let rows = [
        tensor_to_images(sources)?,
        tensor_to_images(generated)?,
        tensor_to_images(targets)?,
    ];
    image_grid(&rows)
        .save(path)
        .map_err(|source| Pix2PixError::ImageWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Draws `n_samples` fresh pairs, translates them and writes the grid for `step`.
///
/// The translation goes through [`fake_batch`], so a generator on an autodiff
/// backend is sampled in training mode.
///
/// # Errors
///
/// Returns an error if sampling, conversion or writing fails.
pub fn summarize_performance<B: Backend, R: Rng>(
    dir: &Path,
    step: usize,
    generator: &Generator<B>,
    dataset: &PairedImageDataset,
    n_samples: usize,
    rng: &mut R,
    device: &B::Device,
) -> Pix2PixResult<PathBuf> {
    let indices = sample_indices(rng, dataset.len(), n_samples);
    let real = real_batch::<B>(dataset, &indices, device)?;
    let (generated, _) = fake_batch(generator, real.batch.sources.clone());

    let path = dir.join(plot_file_name(step));
    save_sample_grid(&path, real.batch.sources, generated, real.batch.targets)?;
    Ok(path)
}

/// Saves the generator's parameters for `step` into `dir`.
///
/// # Errors
///
/// Returns an error if the record cannot be written.
pub fn save_generator_checkpoint<B: Backend>(
    generator: &Generator<B>,
    dir: &Path,
    step: usize,
) -> Pix2PixResult<PathBuf> {
    let stem = dir.join(checkpoint_stem(step));
    generator
        .clone()
        .save_file(stem.clone(), &CheckpointRecorder::new())?;
    Ok(stem.with_extension("mpk"))
}

/// Builds a generator from `config` and restores its parameters from `path`.
///
/// # Errors
///
/// Returns an error if the file is missing or does not match the architecture.
pub fn load_generator_checkpoint<B: Backend>(
    config: &GeneratorConfig,
    path: &Path,
    device: &B::Device,
) -> Pix2PixResult<Generator<B>> {
    let generator = config
        .init::<B>(device)
        .load_file(path.to_path_buf(), &CheckpointRecorder::new(), device)?;
    Ok(generator)
}
