//! Training module for the wildfire classifier
//!
//! This module provides:
//! - The fit loop with Burn's autodiff and Adam optimizer
//! - Keras-style callbacks (checkpoint, early stopping, LR on plateau)
//! - Per-epoch history written as CSV/JSON
//! - Test-set evaluation, report figures and the end-to-end pipeline
//!
//! ## Pipeline
//!
//! 1. Scan `train`, `valid` and `test` splits
//! 2. Fit with on-the-fly augmentation, validating every epoch
//! 3. Keep the best checkpoint by validation accuracy
//! 4. Evaluate on the test split and export the final model

pub mod callbacks;
pub mod evaluation;
pub mod history;
pub mod pipeline;
pub mod plots;
pub mod trainer;

pub use callbacks::{Callbacks, EarlyStopping, ModelCheckpoint, Mode, Monitor, ReduceLrOnPlateau};
pub use evaluation::{evaluate_model, Evaluation, TestMetrics};
pub use history::{EpochRecord, History};
pub use pipeline::{run_training, TrainingSummary};
pub use trainer::{FitOutcome, Trainer};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 50;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
