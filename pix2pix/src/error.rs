use std::path::PathBuf;

use thiserror::Error;

/// The error type for `pix2pix-burn` operations.
///
/// Every failure is fatal for the operation that raised it: dataset loading,
/// archive I/O and training never retry or skip.
#[derive(Error, Debug)]
pub enum Pix2PixError {
    /// Error when the input directory does not exist.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Error when reading a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when a directory holds no image files.
    #[error("No images found in: {path}")]
    EmptyDirectory {
        /// The directory that was scanned.
        path: PathBuf,
    },

    /// Error when opening or decoding an image file fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Error when a source image has no same-named target image.
    #[error("No target image found for: {path}")]
    MissingPair {
        /// The source image without a partner.
        path: PathBuf,
    },

    /// Error when source and target arrays disagree in shape.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The expected shape.
        expected: String,
        /// The actual shape.
        actual: String,
    },

    /// Error when pixel buffers cannot be arranged into an array.
    #[error("Invalid array layout")]
    ArrayLayout {
        /// The underlying ndarray error.
        #[source]
        source: ndarray::ShapeError,
    },

    /// Error when reading a dataset archive fails.
    #[error("Failed to read archive: {path}")]
    ArchiveRead {
        /// The archive path.
        path: PathBuf,
        /// The underlying npz error.
        #[source]
        source: ndarray_npy::ReadNpzError,
    },

    /// Error when writing a dataset archive fails.
    #[error("Failed to write archive: {path}")]
    ArchiveWrite {
        /// The archive path.
        path: PathBuf,
        /// The underlying npz error.
        #[source]
        source: ndarray_npy::WriteNpzError,
    },

    /// Error when an archive does not contain a required array.
    #[error("Archive {path} has no array named {name}")]
    MissingArray {
        /// The archive path.
        path: PathBuf,
        /// The array name that was looked up.
        name: String,
    },

    /// Generic file system error tied to a path.
    #[error("I/O error on {path}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when writing a sample grid image fails.
    #[error("Failed to write image: {path}")]
    ImageWriteFailed {
        /// The output image path.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Error when saving or loading a model record fails.
    #[error("Model record error")]
    Recorder {
        /// The underlying recorder error.
        #[source]
        source: burn::record::RecorderError,
    },

    /// Error when tensor data cannot be converted to host values.
    #[error("Tensor conversion failed: {reason}")]
    TensorConversion {
        /// Why the conversion failed.
        reason: String,
    },

    /// Error for when an invalid configuration is provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error when a training loss becomes NaN or infinite.
    #[error("Non-finite {loss} loss at step {step}")]
    NonFiniteLoss {
        /// The 1-based training step.
        step: usize,
        /// Which loss diverged.
        loss: &'static str,
    },
}

impl From<burn::record::RecorderError> for Pix2PixError {
    fn from(source: burn::record::RecorderError) -> Self {
        Self::Recorder { source }
    }
}

/// A specialized `Result` type for `pix2pix-burn` operations.
pub type Pix2PixResult<T> = Result<T, Pix2PixError>;
