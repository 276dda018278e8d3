//! Model module for the CNN architecture using the Burn framework
//!
//! This module provides:
//! - The sequential wildfire CNN and its `burn::Config`
//! - A Keras-style layer summary
//! - Export in three record formats and loading back
//!
//! The network outputs one logit per image; `sigmoid(logit)` is the
//! probability of the `wildfire` class.

pub mod cnn;
pub mod export;

pub use cnn::{ConvBlock, ModelSummary, WildfireCnn, WildfireCnnConfig};
pub use export::{export_model, load_model, load_model_dir, ExportPaths};

/// Default dropout rate for the dense layers
pub const DEFAULT_DROPOUT: f64 = 0.5;
