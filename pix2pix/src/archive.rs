//! Compressed dataset archive.
//!
//! A dataset is stored as a deflate-compressed `.npz` holding two `u8` arrays
//! of shape `[N, H, W, 3]`: `arr_0` for sources and `arr_1` for targets, the
//! names NumPy's `savez_compressed` gives positional arrays.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use ndarray::Array4;
use ndarray_npy::{NpzReader, NpzWriter};

use crate::{
    dataset::PairedImageDataset,
    error::{Pix2PixError, Pix2PixResult},
};

/// Archive entry holding source images.
pub const SOURCES_ARRAY: &str = "arr_0";
/// Archive entry holding target images.
pub const TARGETS_ARRAY: &str = "arr_1";

/// Writes `dataset` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_archive(path: &Path, dataset: &PairedImageDataset) -> Pix2PixResult<()> {
    let file = File::create(path).map_err(|source| Pix2PixError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source| Pix2PixError::ArchiveWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
    npz.add_array(SOURCES_ARRAY, dataset.sources())
        .map_err(write_err)?;
    npz.add_array(TARGETS_ARRAY, dataset.targets())
        .map_err(write_err)?;
    npz.finish().map_err(write_err)?;

    tracing::info!(
        path = %path.display(),
        pairs = dataset.len(),
        "saved dataset archive"
    );
    Ok(())
}

/// Reads a dataset previously written by [`save_archive`] (or by NumPy).
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, lacks one of the two
/// arrays, or the arrays disagree in shape.
pub fn load_archive(path: &Path) -> Pix2PixResult<PairedImageDataset> {
    let file = File::open(path).map_err(|source| Pix2PixError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let read_err = |source| Pix2PixError::ArchiveRead {
        path: path.to_path_buf(),
        source,
    };

    let mut npz = NpzReader::new(BufReader::new(file)).map_err(read_err)?;
    let names = npz.names().map_err(read_err)?;

    let mut read = |wanted: &str| -> Pix2PixResult<Array4<u8>> {
        let name = names
            .iter()
            .find(|name| name.trim_end_matches(".npy") == wanted)
            .ok_or_else(|| Pix2PixError::MissingArray {
                path: path.to_path_buf(),
                name: wanted.to_string(),
            })?;
        npz.by_name(name).map_err(read_err)
    };
    let sources = read(SOURCES_ARRAY)?;
    let targets = read(TARGETS_ARRAY)?;

    let dataset = PairedImageDataset::new(sources, targets)?;
    tracing::info!(
        path = %path.display(),
        pairs = dataset.len(),
        height = dataset.image_size().height,
        width = dataset.image_size().width,
        "loaded dataset archive"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn sample_dataset() -> PairedImageDataset {
        let sources = Array4::from_shape_fn((3, 4, 5, 3), |(n, y, x, c)| {
            (n * 60 + y * 15 + x * 3 + c) as u8
        });
        let targets = sources.mapv(|v| 255 - v);
        PairedImageDataset::new(sources, targets).unwrap()
    }

    #[test]
    fn test_archive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps_256.npz");
        let dataset = sample_dataset();

        save_archive(&path, &dataset).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        let loaded = load_archive(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(loaded.pair(2), dataset.pair(2));
    }

    #[test]
    fn test_archive_holds_numpy_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.npz");
        save_archive(&path, &sample_dataset()).unwrap();

        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = npz
            .names()
            .unwrap()
            .into_iter()
            .map(|n| n.trim_end_matches(".npy").to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&SOURCES_ARRAY.to_string()));
        assert!(names.contains(&TARGETS_ARRAY.to_string()));
    }

    #[test]
    fn test_missing_array_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.npz");
        let mut npz = NpzWriter::new_compressed(File::create(&path).unwrap());
        npz.add_array(SOURCES_ARRAY, &Array4::<u8>::zeros((1, 2, 2, 3)))
            .unwrap();
        npz.finish().unwrap();

        match load_archive(&path) {
            Err(Pix2PixError::MissingArray { name, .. }) => assert_eq!(name, TARGETS_ARRAY),
            other => panic!("Expected MissingArray, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_arrays_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.npz");
        let mut npz = NpzWriter::new_compressed(File::create(&path).unwrap());
        npz.add_array(SOURCES_ARRAY, &Array4::<u8>::zeros((2, 2, 2, 3)))
            .unwrap();
        npz.add_array(TARGETS_ARRAY, &Array4::<u8>::zeros((1, 2, 2, 3)))
            .unwrap();
        npz.finish().unwrap();

        assert!(matches!(
            load_archive(&path),
            Err(Pix2PixError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_archive(&dir.path().join("absent.npz")),
            Err(Pix2PixError::Io { .. })
        ));
    }
}
