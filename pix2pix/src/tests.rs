use burn::{
    backend::{Autodiff, NdArray},
    prelude::*,
};
use image::{Rgb, RgbImage};

use crate::{
    load_archive, load_generator_checkpoint, load_paired_images, save_archive, train,
    CheckpointCadence, DiscriminatorConfig, GeneratorConfig, ImageSize, PairLayout,
    TrainingConfig,
};

#[test]
fn test_directory_to_archive_to_training() {
    let input = tempfile::tempdir().unwrap();
    let size = ImageSize::default();
    for (i, shade) in [40u8, 90, 140, 190].into_iter().enumerate() {
        let canvas = RgbImage::from_fn(size.width * 2, size.height, |x, y| {
            if x < size.width {
                Rgb([shade, (y % 256) as u8, 0])
            } else {
                Rgb([255 - shade, 0, (x % 256) as u8])
            }
        });
        canvas
            .save(input.path().join(format!("{i}.png")))
            .unwrap();
    }

    let dataset = load_paired_images(input.path(), &PairLayout::SideBySide, size).unwrap();
    assert_eq!(dataset.len(), 4);

    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("maps_256.npz");
    save_archive(&archive, &dataset).unwrap();
    let restored = load_archive(&archive).unwrap();
    assert_eq!(restored, dataset);

    let config = TrainingConfig::new()
        .with_generator(GeneratorConfig::new().with_base_channels(2))
        .with_discriminator(DiscriminatorConfig::new().with_base_channels(2))
        .with_num_epochs(1)
        .with_batch_size(2)
        .with_n_samples(2)
        .with_cadence(CheckpointCadence::EveryEpochs(1));

    let device = Default::default();
    let artifacts = work.path().join("run");
    let summary = train::<Autodiff<NdArray>>(&artifacts, &config, &restored, &device).unwrap();

    assert_eq!(summary.steps, 2);
    assert_eq!(summary.checkpoints, vec![artifacts.join("model_000002.mpk")]);

    let saved = TrainingConfig::load(artifacts.join("config.json")).unwrap();
    let generator =
        load_generator_checkpoint::<NdArray>(&saved.generator, &summary.checkpoints[0], &device)
            .unwrap();
    let grid = image::open(artifacts.join("plot_000002.png")).unwrap();
    assert_eq!((grid.width(), grid.height()), (2 * 256, 3 * 256));

    let batch = Tensor::<NdArray, 4>::zeros([2, 3, 256, 256], &device);
    assert_eq!(generator.forward(batch).dims(), [2, 3, 256, 256]);
}
