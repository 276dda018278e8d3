//! Evaluation of a trained model on a held-out split
//!
//! Produces the loss, the raw wildfire probabilities and the labels; every
//! threshold metric, the ROC curve and the report are derived from those.

use std::fs;
use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::tensor::{activation::sigmoid, backend::Backend, ElementConversion};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::burn_dataset::{collect_items, epoch_batches, WildfireBatcher, WildfireItem};
use crate::model::WildfireCnn;
use crate::utils::error::{Result, WildfireError};
use crate::utils::metrics::{BinaryMetrics, RocCurve, RunningAverage};

/// Loss and per-sample outputs of one pass over a split
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Mean binary cross-entropy over all samples
    pub loss: f64,
    pub probabilities: Vec<f32>,
    pub labels: Vec<usize>,
}

impl Evaluation {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn metrics(&self, threshold: f32) -> BinaryMetrics {
        BinaryMetrics::from_probabilities(&self.probabilities, &self.labels, threshold)
    }

    pub fn roc_curve(&self) -> RocCurve {
        RocCurve::compute(&self.probabilities, &self.labels)
    }
}

/// Run `model` over every sample of `dataset` in order, without augmentation
pub fn evaluate_model<B: Backend, D: Dataset<WildfireItem>>(
    model: &WildfireCnn<B>,
    dataset: &D,
    image_size: usize,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation> {
    let batcher = WildfireBatcher::new(image_size);
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut result = Evaluation::default();
    let mut loss_avg = RunningAverage::new();

    for indices in epoch_batches(dataset.len(), batch_size, None) {
        let items = collect_items(dataset, &indices);
        if items.is_empty() {
            continue;
        }
        let labels: Vec<usize> = items.iter().map(|i| i.label).collect();
        let n = labels.len();

        let batch = batcher.batch(items, device);
        let logits = model.forward(batch.images).reshape([n]);

        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.targets)
            .into_scalar()
            .elem();
        loss_avg.add_weighted(loss, n);

        let probs = sigmoid(logits)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| WildfireError::Evaluation(format!("{e:?}")))?;

        result.probabilities.extend(probs);
        result.labels.extend(labels);
    }

    result.loss = loss_avg.average();
    debug!(
        "Evaluated {} samples, loss = {:.4}",
        result.len(),
        result.loss
    );

    Ok(result)
}

/// Summary written to `metrics.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMetrics {
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub test_precision: f64,
    pub test_recall: f64,
    pub test_auc: Option<f64>,
    pub roc_auc: Option<f64>,
}

impl TestMetrics {
    pub fn new(evaluation: &Evaluation, metrics: &BinaryMetrics, roc: &RocCurve) -> Self {
        Self {
            test_loss: evaluation.loss,
            test_accuracy: metrics.accuracy,
            test_precision: metrics.precision,
            test_recall: metrics.recall,
            test_auc: metrics.auc,
            roc_auc: roc.auc(),
        }
    }

    /// Pretty JSON with four-space indentation
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        fs::write(path, buf)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WildfireError::PathNotFound(path.to_path_buf()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::dataset::burn_dataset::WildfireImageDataset;
    use crate::dataset::loader::tests::write_tiny_dataset;
    use crate::dataset::loader::{DatasetLayout, WildfireDataset};
    use crate::model::WildfireCnnConfig;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    #[test]
    fn test_evaluate_covers_every_sample() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(3, [20, 120, 40]), (2, [200, 60, 20])], 16);
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });
        let split = WildfireDataset::scan(&layout, "test").unwrap();
        let dataset = WildfireImageDataset::new(&split.samples, 16);

        let device = Default::default();
        let model = WildfireCnnConfig::new(vec![4], vec![8])
            .with_image_size(16)
            .init::<TestBackend>(&device);

        let eval = evaluate_model(&model, &dataset, 16, 2, &device).unwrap();
        assert_eq!(eval.len(), 5);
        assert_eq!(eval.labels, vec![0, 0, 0, 1, 1]);
        assert!(eval.loss.is_finite() && eval.loss > 0.0);
        assert!(eval.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_metrics_json_uses_four_space_indent() {
        let eval = Evaluation {
            loss: 0.25,
            probabilities: vec![0.9, 0.2, 0.7, 0.4],
            labels: vec![1, 0, 1, 0],
        };
        let metrics = eval.metrics(0.5);
        let roc = eval.roc_curve();
        let test_metrics = TestMetrics::new(&eval, &metrics, &roc);
        assert_eq!(test_metrics.test_accuracy, 1.0);
        assert_eq!(test_metrics.roc_auc, Some(1.0));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("metrics.json");
        test_metrics.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"test_loss\": 0.25"));
        assert!(text.contains("\"roc_auc\": 1.0"));

        let loaded = TestMetrics::load(&path).unwrap();
        assert_eq!(loaded.test_accuracy, 1.0);
        assert!(TestMetrics::load(&dir.path().join("missing.json")).is_err());
    }
}
