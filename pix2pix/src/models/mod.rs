//! Network definitions for pix2pix.

pub mod blocks;
pub mod composite;
pub mod discriminator;
pub mod generator;

pub use blocks::{DownsampleStage, StageSpec, UpsampleStage};
pub use composite::{CompositeLoss, CompositeModel};
pub use discriminator::{
    patch_grid, patch_resolution, Discriminator, DiscriminatorConfig, DiscriminatorRecord,
    DISCRIMINATOR_STAGES,
};
pub use generator::{
    Generator, GeneratorConfig, GeneratorRecord, DECODER_STAGES, ENCODER_STAGES,
    GENERATOR_INPUT_MULTIPLE,
};
