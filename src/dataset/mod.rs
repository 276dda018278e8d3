//! Dataset module for the wildfire satellite images
//!
//! This module provides functionality for:
//! - Scanning the `{split}/{class}` directory layout and counting images
//! - Keras-style random affine augmentation
//! - Burn `Dataset` and `Batcher` implementations for training
//!
//! ## Layout
//!
//! ```text
//! data/wildfire/
//!   train/{nowildfire,wildfire}/*.jpg
//!   valid/{nowildfire,wildfire}/*.jpg
//!   test/{nowildfire,wildfire}/*.jpg
//! ```
//!
//! Class directories are sorted alphabetically, so `nowildfire` is label 0
//! and `wildfire` (the positive class) is label 1.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;

pub use augmentation::{AugmentationConfig, Augmenter, FillMode};
pub use burn_dataset::{
    AugmentingBatcher, WildfireBatch, WildfireBatcher, WildfireImageDataset, WildfireItem,
};
pub use loader::{ClassDistribution, DatasetLayout, DatasetStats, ImageSample, WildfireDataset};

/// Number of classes (binary task)
pub const NUM_CLASSES: usize = 2;

/// Class directory names in label order
pub const CLASS_NAMES: [&str; 2] = ["nowildfire", "wildfire"];

/// Label of the positive class
pub const WILDFIRE_LABEL: usize = 1;

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}
