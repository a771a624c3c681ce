//! Paired image dataset for pix2pix training.
//!
//! Images are kept in memory as `[N, H, W, 3]` byte arrays, exactly as they are
//! stored in the dataset archive, and only normalized to `[-1, 1]` when a batch
//! is built.

use std::path::{Path, PathBuf};

use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array4, Axis};
use walkdir::WalkDir;

use crate::{
    config::ImageSize,
    error::{Pix2PixError, Pix2PixResult},
};

/// Maps a byte intensity in `[0, 255]` to the model range `[-1, 1]`.
#[inline]
pub fn normalize(pixel: f32) -> f32 {
    (pixel - 127.5) / 127.5
}

/// Inverse of [`normalize`]: model range back to `[0, 255]`.
#[inline]
pub fn denormalize(value: f32) -> f32 {
    value * 127.5 + 127.5
}

/// Model range to display range `[0, 1]`.
#[inline]
pub fn to_display(value: f32) -> f32 {
    (value + 1.0) / 2.0
}

/// One source/target pair as row-major HWC bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub source: Vec<u8>,
    pub target: Vec<u8>,
    pub size: ImageSize,
}

/// A batch of pairs as `[n, 3, H, W]` tensors in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    pub sources: Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
}

/// Stacks [`ImagePair`]s into a normalized [`PairBatch`].
#[derive(Clone, Default)]
pub struct PairBatcher<B: Backend> {
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> PairBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    fn stack(images: Vec<Vec<u8>>, size: ImageSize, device: &B::Device) -> Tensor<B, 4> {
        let count = images.len();
        let values: Vec<f32> = images
            .into_iter()
            .flatten()
            .map(|p| normalize(f32::from(p)))
            .collect();
        let data = TensorData::new(
            values,
            [count, size.height as usize, size.width as usize, 3],
        );
        // NHWC to NCHW
        Tensor::<B, 4>::from_data(data, device).permute([0, 3, 1, 2])
    }
}

impl<B: Backend> Batcher<B, ImagePair, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<ImagePair>, device: &B::Device) -> PairBatch<B> {
        let size = items.first().map(|item| item.size).unwrap_or_default();

        let mut sources = Vec::with_capacity(items.len());
        let mut targets = Vec::with_capacity(items.len());
        for item in items {
            sources.push(item.source);
            targets.push(item.target);
        }

        PairBatch {
            sources: Self::stack(sources, size, device),
            targets: Self::stack(targets, size, device),
        }
    }
}

/// How source and target images are laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairLayout {
    /// One image per pair: source on the left half, target on the right.
    SideBySide,
    /// Source images in the input directory, same-named targets in `target_dir`.
    SeparateDirs { target_dir: PathBuf },
}

/// In-memory paired dataset: two index-aligned `[N, H, W, 3]` byte arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedImageDataset {
    sources: Array4<u8>,
    targets: Array4<u8>,
}

impl PairedImageDataset {
    /// Builds a dataset, rejecting arrays whose shapes disagree.
    ///
    /// # Errors
    ///
    /// Returns [`Pix2PixError::ShapeMismatch`] if the arrays differ in shape
    /// or do not hold 3-channel images.
    pub fn new(sources: Array4<u8>, targets: Array4<u8>) -> Pix2PixResult<Self> {
        if sources.shape() != targets.shape() {
            return Err(Pix2PixError::ShapeMismatch {
                expected: format!("{:?}", sources.shape()),
                actual: format!("{:?}", targets.shape()),
            });
        }
        if sources.shape()[3] != 3 {
            return Err(Pix2PixError::ShapeMismatch {
                expected: "[N, H, W, 3]".to_string(),
                actual: format!("{:?}", sources.shape()),
            });
        }
        Ok(Self { sources, targets })
    }

    pub fn sources(&self) -> &Array4<u8> {
        &self.sources
    }

    pub fn targets(&self) -> &Array4<u8> {
        &self.targets
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.sources.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spatial size shared by every image.
    pub fn image_size(&self) -> ImageSize {
        let shape = self.sources.shape();
        ImageSize::new(shape[1] as u32, shape[2] as u32)
    }

    /// The pair at `index`, or `None` past the end.
    pub fn pair(&self, index: usize) -> Option<ImagePair> {
        if index >= self.len() {
            return None;
        }
        let bytes = |array: &Array4<u8>| -> Vec<u8> {
            array.index_axis(Axis(0), index).iter().copied().collect()
        };
        Some(ImagePair {
            source: bytes(&self.sources),
            target: bytes(&self.targets),
            size: self.image_size(),
        })
    }

    /// The pairs at `indices`, in order, repeats allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Pix2PixError::InvalidConfiguration`] for an index past the end.
    pub fn gather(&self, indices: &[usize]) -> Pix2PixResult<Vec<ImagePair>> {
        indices
            .iter()
            .map(|&index| {
                self.pair(index)
                    .ok_or_else(|| Pix2PixError::InvalidConfiguration {
                        reason: format!(
                            "index {index} out of range for dataset of {}",
                            self.len()
                        ),
                    })
            })
            .collect()
    }
}

impl Dataset<ImagePair> for PairedImageDataset {
    fn get(&self, index: usize) -> Option<ImagePair> {
        self.pair(index)
    }

    fn len(&self) -> usize {
        PairedImageDataset::len(self)
    }
}

/// Regular files directly inside `dir`, in file-name order.
fn list_files(dir: &Path) -> Pix2PixResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Pix2PixError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Pix2PixError::DirectoryReadFailed {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(Pix2PixError::EmptyDirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(files)
}

/// Decodes `path` and resizes it to exactly `width` x `height`.
fn open_resized(path: &Path, width: u32, height: u32) -> Pix2PixResult<RgbImage> {
    let image = image::open(path).map_err(|source| Pix2PixError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image
        .resize_exact(width, height, FilterType::Nearest)
        .to_rgb8())
}

/// Splits a `(height, 2 * width)` canvas into its left and right halves.
fn split_halves(canvas: &RgbImage, size: ImageSize) -> (RgbImage, RgbImage) {
    let source = image::imageops::crop_imm(canvas, 0, 0, size.width, size.height).to_image();
    let target =
        image::imageops::crop_imm(canvas, size.width, 0, size.width, size.height).to_image();
    (source, target)
}

/// Loads every image pair from `dir`.
///
/// All files are treated as images; one that fails to decode aborts the load.
///
/// # Errors
///
/// Returns an error if the directory is missing or empty, an image cannot be
/// decoded, or a source has no same-named target.
pub fn load_paired_images(
    dir: &Path,
    layout: &PairLayout,
    size: ImageSize,
) -> Pix2PixResult<PairedImageDataset> {
    let files = list_files(dir)?;
    let count = files.len();
    let mut sources = Vec::with_capacity(count * size.rgb_len());
    let mut targets = Vec::with_capacity(count * size.rgb_len());

    for path in &files {
        let (source, target) = match layout {
            PairLayout::SideBySide => {
                let canvas = open_resized(path, size.width * 2, size.height)?;
                split_halves(&canvas, size)
            }
            PairLayout::SeparateDirs { target_dir } => {
                let target_path = path
                    .file_name()
                    .map(|name| target_dir.join(name))
                    .filter(|candidate| candidate.is_file())
                    .ok_or_else(|| Pix2PixError::MissingPair { path: path.clone() })?;
                (
                    open_resized(path, size.width, size.height)?,
                    open_resized(&target_path, size.width, size.height)?,
                )
            }
        };
        tracing::debug!(path = %path.display(), "loaded pair");
        sources.extend_from_slice(source.as_raw());
        targets.extend_from_slice(target.as_raw());
    }

    let shape = (count, size.height as usize, size.width as usize, 3);
    let sources = Array4::from_shape_vec(shape, sources)
        .map_err(|source| Pix2PixError::ArrayLayout { source })?;
    let targets = Array4::from_shape_vec(shape, targets)
        .map_err(|source| Pix2PixError::ArrayLayout { source })?;

    tracing::info!(
        pairs = count,
        height = size.height,
        width = size.width,
        dir = %dir.display(),
        "loaded paired images"
    );
    PairedImageDataset::new(sources, targets)
}
