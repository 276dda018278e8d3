//! End-to-end training pipeline
//!
//! Loads the three splits, builds the CNN, fits it with augmentation and
//! callbacks, evaluates on the test split and exports the final model.

use std::fs;
use std::path::PathBuf;

use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use colored::Colorize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::dataset::burn_dataset::{steps_per_epoch, AugmentingBatcher, WildfireImageDataset};
use crate::dataset::loader::{DatasetLayout, WildfireDataset};
use crate::model::export::{export_model, ExportPaths};
use crate::model::{ModelSummary, WildfireCnn, WildfireCnnConfig};
use crate::training::callbacks::Callbacks;
use crate::training::evaluation::TestMetrics;
use crate::training::history::run_log_dir;
use crate::training::plots::{plot_confusion_matrix, plot_roc_curve, plot_training_history};
use crate::training::trainer::{FitOutcome, Trainer};
use crate::utils::error::{Result, WildfireError};
use crate::utils::metrics::ClassificationReport;

/// Checkpoint of the best validation accuracy (recorder adds `.mpk`)
pub const BEST_MODEL_NAME: &str = "best_model";

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub outcome: FitOutcome,
    pub epochs_run: usize,
    pub best_val_accuracy: Option<f64>,
    pub test_metrics: TestMetrics,
    pub exports: ExportPaths,
    pub run_dir: PathBuf,
}

fn rule() -> String {
    "=".repeat(70)
}

fn load_split(
    layout: &DatasetLayout,
    split: &str,
    image_size: usize,
    cache: bool,
) -> Result<WildfireImageDataset> {
    let scanned = WildfireDataset::scan(layout, split)?;
    println!(
        "Found {} images belonging to {} classes in '{}'.",
        scanned.len(),
        scanned.num_classes(),
        split
    );
    Ok(if cache {
        WildfireImageDataset::new_cached(&scanned.samples, image_size)
    } else {
        WildfireImageDataset::new(&scanned.samples, image_size)
    })
}

/// Run the complete training pipeline on backend `B`
pub fn run_training<B: AutodiffBackend>(config: &PipelineConfig) -> Result<TrainingSummary> {
    config.validate()?;

    let data = &config.data;
    let train_cfg = &config.training;
    let out = &config.output;
    let image_size = config.model.image_size;

    println!("{}", rule());
    println!("{}", "🔥 Wildfire Detection - Model Training".bold());
    println!("{}", rule());
    println!("Backend: {}", crate::backend::backend_name());
    println!("Training on: {}", data.data_dir.join(&data.train_split).display());
    println!(
        "Image size: {}x{}x{}",
        image_size, image_size, config.model.in_channels
    );
    println!("{}", rule());

    for dir in [&out.models_dir, &out.plots_dir, &out.logs_dir] {
        fs::create_dir_all(dir)?;
    }

    // Data
    println!("\n{}", "📊 Creating data generators...".cyan());
    let layout = DatasetLayout::from_config(data);
    let cache = train_cfg.cache_images;
    let train = load_split(&layout, &data.train_split, image_size, cache)?;
    let valid = load_split(&layout, &data.valid_split, image_size, cache)?;
    let test = load_split(&layout, &data.test_split, image_size, cache)?;

    if train.is_empty() {
        return Err(WildfireError::Dataset(format!(
            "no training images found under {}",
            layout.split_dir(&data.train_split).display()
        )));
    }

    println!("✅ Training samples: {}", train.len());
    println!("✅ Validation samples: {}", valid.len());
    println!("✅ Test samples: {}", test.len());
    let indices: Vec<String> = data
        .classes
        .iter()
        .enumerate()
        .map(|(i, c)| format!("'{c}': {i}"))
        .collect();
    println!("✅ Class indices: {{{}}}", indices.join(", "));

    // Model
    println!("\n{}", "🏗️ Building CNN model...".cyan());
    let device = B::Device::default();
    let cnn_config = WildfireCnnConfig::from_model_config(&config.model);
    let model: WildfireCnn<B> = cnn_config.init(&device);
    println!("\n📋 Model Architecture:");
    println!("{}", ModelSummary::of(&model, &cnn_config));

    let optimizer = AdamConfig::new().init::<B, WildfireCnn<B>>();
    let mut trainer = Trainer::new(
        model,
        optimizer,
        train_cfg.learning_rate,
        Callbacks::from_config(&train_cfg.callbacks),
        image_size,
        train_cfg.batch_size,
        train_cfg.seed,
        train_cfg.threshold,
        device,
    );
    let batcher = AugmentingBatcher::new(config.augmentation.clone(), image_size, train_cfg.seed);

    // Fit
    let steps = steps_per_epoch(train.len(), train_cfg.batch_size);
    let val_steps = valid.len().div_ceil(train_cfg.batch_size);
    println!("\n{}", "🔥 Training model...".cyan());
    println!("Epochs: {}", train_cfg.epochs);
    println!("Batch size: {}", train_cfg.batch_size);
    println!("Steps per epoch: {}", steps);
    println!("Validation steps: {}", val_steps);
    println!("{}", rule());

    let checkpoint = out.models_dir.join(BEST_MODEL_NAME);
    let outcome = trainer.fit(&train, &valid, &batcher, train_cfg.epochs, &checkpoint)?;
    if let FitOutcome::EarlyStopped { epoch, best_epoch } = outcome {
        println!(
            "Epoch {}: early stopping (restored weights from epoch {})",
            epoch, best_epoch
        );
    }

    let run_dir = run_log_dir(&out.logs_dir);
    trainer.history.save_csv(&run_dir.join("history.csv"))?;
    trainer.history.save_json(&run_dir.join("history.json"))?;
    config.save_json(&run_dir.join("config.json"))?;
    info!("Run log written to {}", run_dir.display());

    println!("\n{}", "📈 Generating training plots...".cyan());
    plot_training_history(&trainer.history, &out.plots_dir.join("training_history.svg"))?;
    println!("✅ Saved: training_history.svg");

    // Test evaluation
    println!("\n{}", "🎯 Evaluating model on test set...".cyan());
    let evaluation = trainer.evaluate(&test)?;
    let metrics = evaluation.metrics(train_cfg.threshold);
    let roc = evaluation.roc_curve();

    let names: Vec<&str> = data.classes.iter().map(String::as_str).collect();
    let report = ClassificationReport::new(&metrics.confusion_matrix, &names);
    println!("\n📊 Classification Report:");
    println!("{}", report.format(4));

    plot_confusion_matrix(
        &metrics.confusion_matrix,
        &data.classes,
        &out.plots_dir.join("confusion_matrix.svg"),
    )?;
    println!("✅ Saved: confusion_matrix.svg");
    plot_roc_curve(&roc, &out.plots_dir.join("roc_curve.svg"))?;
    println!("✅ Saved: roc_curve.svg");

    let test_metrics = TestMetrics::new(&evaluation, &metrics, &roc);
    test_metrics.save(&out.models_dir.join("metrics.json"))?;

    println!("\n📊 Test Metrics:");
    let fmt_opt = |v: Option<f64>| v.map_or("n/a".to_string(), |x| format!("{x:.4}"));
    println!("   test_loss: {:.4}", test_metrics.test_loss);
    println!("   test_accuracy: {:.4}", test_metrics.test_accuracy);
    println!("   test_precision: {:.4}", test_metrics.test_precision);
    println!("   test_recall: {:.4}", test_metrics.test_recall);
    println!("   test_auc: {}", fmt_opt(test_metrics.test_auc));
    println!("   roc_auc: {}", fmt_opt(test_metrics.roc_auc));

    // Export
    let final_model = trainer.model.valid();
    let exports = export_model(&final_model, &cnn_config, &data.classes, &out.models_dir)?;
    println!("\n✅ Final model saved: {}", exports.final_model.display());
    println!("✅ Model directory saved: {}", exports.saved_model_dir.display());
    println!("✅ Deployment model saved: {}", exports.deploy_model.display());

    println!("\n{}", rule());
    println!("{}", "🎉 Training completed successfully!".green().bold());
    println!(
        "📊 Final Test Accuracy: {:.2}%",
        test_metrics.test_accuracy * 100.0
    );
    println!("📊 Final Test AUC: {}", fmt_opt(test_metrics.test_auc));
    println!("{}", rule());

    Ok(TrainingSummary {
        outcome,
        epochs_run: trainer.history.len(),
        best_val_accuracy: trainer.callbacks.checkpoint.best(),
        test_metrics,
        exports,
        run_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::augmentation::AugmentationConfig;
    use crate::dataset::loader::tests::write_tiny_dataset;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    fn tiny_config(dir: &TempDir) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.data.data_dir = dir.path().join("data");
        config.model.image_size = 16;
        config.model.conv_filters = vec![4, 8];
        config.model.dense_units = vec![8];
        config.training.epochs = 2;
        config.training.batch_size = 4;
        config.augmentation = AugmentationConfig::default();
        config.output.models_dir = dir.path().join("models");
        config.output.plots_dir = dir.path().join("plots");
        config.output.logs_dir = dir.path().join("logs");
        config
    }

    #[test]
    fn test_pipeline_writes_expected_files() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(&dir.path().join("data"), &[(4, [20, 120, 40]), (4, [220, 60, 20])], 20);
        let config = tiny_config(&dir);

        let summary = run_training::<Autodiff<NdArray>>(&config).unwrap();
        assert_eq!(summary.epochs_run, 2);

        for file in [
            "models/best_model.mpk",
            "models/metrics.json",
            "models/wildfire_model_final.mpk",
            "models/wildfire_model.bin",
            "models/saved_model/model.mpk",
            "models/saved_model/config.json",
            "plots/training_history.svg",
            "plots/confusion_matrix.svg",
            "plots/roc_curve.svg",
        ] {
            assert!(dir.path().join(file).exists(), "missing {file}");
        }
        assert!(summary.run_dir.join("history.csv").exists());
        assert!((0.0..=1.0).contains(&summary.test_metrics.test_accuracy));
    }

    #[test]
    fn test_missing_data_dir_fails() {
        let dir = TempDir::new().unwrap();
        let config = tiny_config(&dir);
        assert!(run_training::<Autodiff<NdArray>>(&config).is_err());
    }
}
