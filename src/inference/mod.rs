//! Inference module for classifying satellite tiles with a trained model
//!
//! This module provides:
//! - Single image and batched prediction
//! - Risk categories with recommendations and an operational action
//! - A high-confidence alert for very likely wildfire tiles

pub mod predictor;
pub mod risk;

pub use predictor::{BatchPredictionStats, PredictionResult, Predictor};
pub use risk::{high_confidence_alert, RiskLevel, ALERT_THRESHOLD};

/// Default classification threshold on the wildfire probability
pub const DEFAULT_THRESHOLD: f32 = 0.5;
