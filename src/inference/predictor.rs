//! Inference Predictor Module
//!
//! Runs a trained wildfire CNN on image files and attaches a risk category
//! to every prediction.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::burn_dataset::{WildfireBatch, WildfireBatcher, WildfireItem};
use crate::dataset::{CLASS_NAMES, WILDFIRE_LABEL};
use crate::inference::risk::{high_confidence_alert, RiskLevel};
use crate::inference::DEFAULT_THRESHOLD;
use crate::model::export::{load_model, load_model_dir};
use crate::model::{WildfireCnn, WildfireCnnConfig};
use crate::utils::error::{Result, WildfireError};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub image_path: Option<PathBuf>,
    pub wildfire_probability: f32,
    pub no_wildfire_probability: f32,
    pub predicted_class: String,
    /// Probability of the predicted class
    pub confidence: f32,
    pub risk: RiskLevel,
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Build from the sigmoid output; `threshold` splits the two classes
    pub fn new(
        wildfire_probability: f32,
        threshold: f32,
        class_names: &[String],
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Self {
        let p = wildfire_probability.clamp(0.0, 1.0);
        let label = if p > threshold { WILDFIRE_LABEL } else { 1 - WILDFIRE_LABEL };
        let predicted_class = class_names
            .get(label)
            .cloned()
            .unwrap_or_else(|| CLASS_NAMES[label].to_string());
        let confidence = if label == WILDFIRE_LABEL { p } else { 1.0 - p };

        Self {
            image_path,
            wildfire_probability: p,
            no_wildfire_probability: 1.0 - p,
            predicted_class,
            confidence,
            risk: RiskLevel::from_probability(p),
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        }
    }

    pub fn alert(&self) -> Option<String> {
        high_confidence_alert(self.wildfire_probability)
    }

    /// Multi-line console rendering
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {}\n", path.display()));
        }
        output.push_str(&format!(
            "Prediction: {} ({:.2}% confidence)\n",
            self.predicted_class,
            self.confidence * 100.0
        ));
        output.push_str(&format!(
            "Wildfire: {:.1}%   No Wildfire: {:.1}%\n",
            self.wildfire_probability * 100.0,
            self.no_wildfire_probability * 100.0
        ));
        output.push_str(&format!("Risk: {}\n", self.risk));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("\nRecommendations:\n");
        for rec in self.risk.recommendations() {
            output.push_str(&format!("  {}\n", rec));
        }
        output.push_str(&format!("\nAction: {}\n", self.risk.action()));
        if let Some(alert) = self.alert() {
            output.push_str(&format!("\n{}\n", alert));
        }

        output
    }
}

/// A loaded model ready to classify images
pub struct Predictor<B: Backend> {
    model: WildfireCnn<B>,
    config: WildfireCnnConfig,
    class_names: Vec<String>,
    threshold: f32,
    batch_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(
        model: WildfireCnn<B>,
        config: WildfireCnnConfig,
        class_names: Vec<String>,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            config,
            class_names,
            threshold: DEFAULT_THRESHOLD,
            batch_size: 16,
            device,
        }
    }

    /// Load from a saved-model directory, or from a record file using `config`
    pub fn load(
        path: &Path,
        config: &WildfireCnnConfig,
        class_names: &[String],
        device: B::Device,
    ) -> Result<Self> {
        let predictor = if path.is_dir() {
            let (model, config, names) = load_model_dir::<B>(path, &device)?;
            Self::new(model, config, names, device)
        } else {
            let model = load_model::<B>(path, config, &device)?;
            Self::new(model, config.clone(), class_names.to_vec(), device)
        };
        info!("Loaded model from {}", path.display());
        Ok(predictor)
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn image_size(&self) -> usize {
        self.config.image_size
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn forward(&self, items: Vec<WildfireItem>) -> Result<Vec<f32>> {
        let batcher = WildfireBatcher::new(self.config.image_size);
        let batch: WildfireBatch<B> = batcher.batch(items, &self.device);
        self.model
            .forward_probability(batch.images)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| WildfireError::Inference(format!("{e:?}")))
    }

    /// Predict on an image from a file path
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let start = Instant::now();
        let item = WildfireItem::from_path(path, 0, self.config.image_size)?;
        let probs = self.forward(vec![item])?;
        let p = probs
            .first()
            .copied()
            .ok_or_else(|| WildfireError::Inference("empty model output".to_string()))?;
        Ok(PredictionResult::new(
            p,
            self.threshold,
            &self.class_names,
            start.elapsed(),
            Some(path.to_path_buf()),
        ))
    }

    /// Predict on many images in batches
    ///
    /// Reported time per image is the batch time divided evenly.
    pub fn predict_batch(&self, paths: &[PathBuf]) -> Result<Vec<PredictionResult>> {
        let mut results = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(self.batch_size) {
            let start = Instant::now();
            let items = chunk
                .iter()
                .map(|p| WildfireItem::from_path(p, 0, self.config.image_size))
                .collect::<Result<Vec<_>>>()?;
            let probs = self.forward(items)?;
            let per_image = start.elapsed() / chunk.len() as u32;
            debug!("Batch of {} predicted", chunk.len());

            results.extend(chunk.iter().zip(probs).map(|(path, p)| {
                PredictionResult::new(
                    p,
                    self.threshold,
                    &self.class_names,
                    per_image,
                    Some(path.clone()),
                )
            }));
        }
        Ok(results)
    }
}

/// Aggregate over a batch of predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPredictionStats {
    pub total_images: usize,
    pub total_time_ms: f64,
    pub avg_time_per_image_ms: f64,
    pub wildfire_count: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    /// Predictions that raised a high-confidence alert
    pub alerts: usize,
}

impl BatchPredictionStats {
    pub fn from_predictions(predictions: &[PredictionResult]) -> Self {
        if predictions.is_empty() {
            return Self::default();
        }
        let total_images = predictions.len();
        let total_time_ms: f64 = predictions.iter().map(|p| p.inference_time_ms).sum();
        let count = |level: RiskLevel| predictions.iter().filter(|p| p.risk == level).count();
        let wildfire_name = CLASS_NAMES[WILDFIRE_LABEL];

        Self {
            total_images,
            total_time_ms,
            avg_time_per_image_ms: total_time_ms / total_images as f64,
            wildfire_count: predictions
                .iter()
                .filter(|p| p.predicted_class == wildfire_name)
                .count(),
            high_risk: count(RiskLevel::High),
            medium_risk: count(RiskLevel::Medium),
            low_risk: count(RiskLevel::Low),
            alerts: predictions.iter().filter(|p| p.alert().is_some()).count(),
        }
    }
}

impl std::fmt::Display for BatchPredictionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Batch Prediction Statistics:")?;
        writeln!(f, "  Total images: {}", self.total_images)?;
        writeln!(f, "  Average time/image: {:.2} ms", self.avg_time_per_image_ms)?;
        writeln!(f, "  Predicted wildfire: {}", self.wildfire_count)?;
        writeln!(
            f,
            "  Risk: {} high, {} medium, {} low",
            self.high_risk, self.medium_risk, self.low_risk
        )?;
        writeln!(f, "  High confidence alerts: {}", self.alerts)?;
        Ok(())
    }
}
