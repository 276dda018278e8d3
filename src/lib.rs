//! # Wildfire Detection
//!
//! Exploratory data analysis and CNN training for wildfire detection from
//! satellite imagery, built on the Burn framework.
//!
//! ## Features
//!
//! - **EDA pipeline**: class/split counts, pixel statistics, sample grid and a text report
//! - **Training pipeline**: augmented data, a sequential CNN, Keras-style callbacks,
//!   test evaluation and export in three record formats
//! - **Inference**: wildfire probability with a risk category per image
//!
//! ## Modules
//!
//! - `dataset`: Directory layout, augmentation, Burn dataset and batchers
//! - `eda`: Distribution, image properties, sample grid, summary report
//! - `model`: CNN architecture and model export
//! - `training`: Fit loop, callbacks, history, evaluation, plots, pipeline
//! - `inference`: Prediction and risk categories
//! - `utils`: Logging, metrics, SVG charts and errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wildfire_detection::backend::TrainingBackend;
//! use wildfire_detection::config::PipelineConfig;
//!
//! let config = PipelineConfig::load_or_default(None)?;
//! wildfire_detection::eda::run_eda(&config)?;
//! wildfire_detection::training::run_training::<TrainingBackend>(&config)?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod eda;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ConfigOverrides, PipelineConfig};
pub use dataset::loader::{ClassDistribution, DatasetLayout, WildfireDataset};
pub use dataset::{WildfireBatch, WildfireBatcher, WildfireImageDataset, WildfireItem};
pub use eda::run_eda;
pub use inference::{PredictionResult, Predictor, RiskLevel};
pub use model::cnn::{WildfireCnn, WildfireCnnConfig};
pub use training::{run_training, Trainer, TrainingSummary};
pub use utils::error::{Result, WildfireError};
pub use utils::metrics::{BinaryMetrics, ConfusionMatrix};

pub use dataset::NUM_CLASSES;
pub use inference::DEFAULT_THRESHOLD;

/// Default image size of the satellite tiles
pub const IMAGE_SIZE: usize = 350;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
