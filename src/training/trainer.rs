//! Training Loop for the Wildfire CNN
//!
//! This module implements the fit loop using the Burn framework:
//! - Forward/backward passes with automatic differentiation
//! - Binary cross-entropy on the single logit
//! - Adam optimizer with the learning rate owned by the trainer
//! - Validation after every epoch
//! - Checkpointing, early stopping and plateau LR reduction

use std::path::{Path, PathBuf};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{activation::sigmoid, backend::AutodiffBackend, ElementConversion},
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::dataset::burn_dataset::{collect_items, epoch_batches, WildfireBatch, WildfireItem};
use crate::model::WildfireCnn;
use crate::training::callbacks::{Callbacks, StoppingSignal};
use crate::training::evaluation::{evaluate_model, Evaluation};
use crate::training::history::{EpochRecord, History};
use crate::utils::error::{Result, WildfireError};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{BinaryMetrics, RunningAverage};

/// Loss and outputs of one training epoch
#[derive(Debug, Clone)]
pub struct EpochOutput {
    pub evaluation: Evaluation,
    pub metrics: BinaryMetrics,
    pub batches: usize,
}

/// Why the fit loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    Completed,
    EarlyStopped { epoch: usize, best_epoch: usize },
}

/// Main trainer for the WildfireCnn model
pub struct Trainer<B: AutodiffBackend, O: Optimizer<WildfireCnn<B>, B>> {
    pub model: WildfireCnn<B>,
    optimizer: O,
    pub learning_rate: f64,
    pub callbacks: Callbacks,
    pub history: History,
    image_size: usize,
    batch_size: usize,
    seed: u64,
    threshold: f32,
    device: B::Device,
    best_weights: Option<WildfireCnn<B>>,
}

impl<B: AutodiffBackend, O: Optimizer<WildfireCnn<B>, B>> Trainer<B, O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: WildfireCnn<B>,
        optimizer: O,
        learning_rate: f64,
        callbacks: Callbacks,
        image_size: usize,
        batch_size: usize,
        seed: u64,
        threshold: f32,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            optimizer,
            learning_rate,
            callbacks,
            history: History::new(),
            image_size,
            batch_size,
            seed,
            threshold,
            device,
            best_weights: None,
        }
    }

    /// One pass over the shuffled training set
    ///
    /// `epoch` is 1-based and seeds the shuffle, so every epoch sees a
    /// different but reproducible order.
    pub fn train_epoch<D, Bt>(
        &mut self,
        dataset: &D,
        batcher: &Bt,
        epoch: usize,
    ) -> Result<EpochOutput>
    where
        D: Dataset<WildfireItem>,
        Bt: Batcher<B, WildfireItem, WildfireBatch<B>>,
    {
        if dataset.is_empty() {
            return Err(WildfireError::Training("training set is empty".to_string()));
        }
        let batches = epoch_batches(
            dataset.len(),
            self.batch_size,
            Some(self.seed.wrapping_add(epoch as u64)),
        );
        let num_batches = batches.len();

        let pb = ProgressBar::new(num_batches as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&self.device);

        let mut output = Evaluation::default();
        let mut loss_avg = RunningAverage::new();

        for (batch_idx, indices) in batches.iter().enumerate() {
            let items = collect_items(dataset, indices);
            if items.is_empty() {
                continue;
            }
            let labels: Vec<usize> = items.iter().map(|i| i.label).collect();
            let n = labels.len();

            let batch = batcher.batch(items, &self.device);

            // Forward pass
            let logits = self.model.forward(batch.images).reshape([n]);
            let loss = loss_fn.forward(logits.clone(), batch.targets);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_avg.add_weighted(loss_value, n);

            let probs = sigmoid(logits.detach())
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| WildfireError::Training(format!("batch {}: {e:?}", batch_idx + 1)))?;
            output.probabilities.extend(probs);
            output.labels.extend(labels);

            // Backward pass and update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.learning_rate, self.model.clone(), grads);

            pb.set_message(format!("loss: {:.4}", loss_value));
            pb.inc(1);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {}/{}: loss = {:.4}",
                    batch_idx + 1,
                    num_batches,
                    loss_value
                );
            }
        }
        pb.finish_and_clear();

        output.loss = loss_avg.average();
        let metrics = output.metrics(self.threshold);

        Ok(EpochOutput {
            evaluation: output,
            metrics,
            batches: num_batches,
        })
    }

    /// Evaluate the current weights (no dropout, running BatchNorm statistics)
    pub fn evaluate<D: Dataset<WildfireItem>>(&self, dataset: &D) -> Result<Evaluation> {
        let model = self.model.valid();
        evaluate_model(&model, dataset, self.image_size, self.batch_size, &self.device)
    }

    /// Train for up to `epochs` epochs, applying the callbacks after each
    ///
    /// The best model by validation accuracy is saved to `checkpoint_path`
    /// (the recorder appends its extension).
    pub fn fit<D, V, Bt>(
        &mut self,
        train: &D,
        valid: &V,
        batcher: &Bt,
        epochs: usize,
        checkpoint_path: &Path,
    ) -> Result<FitOutcome>
    where
        D: Dataset<WildfireItem>,
        V: Dataset<WildfireItem>,
        Bt: Batcher<B, WildfireItem, WildfireBatch<B>>,
    {
        let mut logger = TrainingLogger::new(epochs);

        for epoch in 1..=epochs {
            logger.start_epoch(epoch - 1);

            let train_out = self.train_epoch(train, batcher, epoch)?;
            let val = self.evaluate(valid)?;
            let val_metrics = val.metrics(self.threshold);

            let record = EpochRecord {
                epoch,
                loss: train_out.evaluation.loss,
                accuracy: train_out.metrics.accuracy,
                precision: train_out.metrics.precision,
                recall: train_out.metrics.recall,
                auc: train_out.metrics.auc,
                val_loss: val.loss,
                val_accuracy: val_metrics.accuracy,
                val_precision: val_metrics.precision,
                val_recall: val_metrics.recall,
                val_auc: val_metrics.auc,
                learning_rate: self.learning_rate,
                duration_secs: logger.epoch_elapsed(),
            };
            logger.end_epoch(
                record.loss,
                record.val_loss,
                record.val_accuracy,
                record.learning_rate,
            );
            print_epoch(&record, train_out.batches);

            let checkpoint_value = record.monitored(self.callbacks.checkpoint.monitor);
            if self.callbacks.checkpoint.on_epoch_end(epoch, checkpoint_value) {
                logger.log_new_best(checkpoint_value);
                self.save_checkpoint(checkpoint_path)?;
            }

            let stop_value = record.monitored(self.callbacks.early_stopping.monitor);
            let signal = self.callbacks.early_stopping.on_epoch_end(epoch, stop_value);

            let plateau_value = record.monitored(self.callbacks.reduce_lr.monitor);
            if let Some(new_lr) = self
                .callbacks
                .reduce_lr
                .on_epoch_end(plateau_value, self.learning_rate)
            {
                logger.log_lr_reduced(self.learning_rate, new_lr);
                self.learning_rate = new_lr;
            }

            self.history.push(record);

            match signal {
                StoppingSignal::Improved => {
                    if self.callbacks.early_stopping.restore_best_weights {
                        self.best_weights = Some(self.model.clone());
                    }
                }
                StoppingSignal::Waiting(wait) => {
                    debug!("No val_loss improvement for {} epochs", wait);
                }
                StoppingSignal::Stop => {
                    let best_epoch = self.callbacks.early_stopping.best_epoch().unwrap_or(epoch);
                    logger.log_early_stop(self.callbacks.early_stopping.patience, best_epoch - 1);
                    if let Some(best) = self.best_weights.take() {
                        info!("Restoring model weights from epoch {}", best_epoch);
                        self.model = best;
                    }
                    self.finish(&logger);
                    return Ok(FitOutcome::EarlyStopped { epoch, best_epoch });
                }
            }
        }

        self.finish(&logger);
        Ok(FitOutcome::Completed)
    }

    fn finish(&self, logger: &TrainingLogger) {
        logger.log_complete(
            self.history.len(),
            self.callbacks.checkpoint.best().unwrap_or(0.0),
        );
    }

    /// Save model checkpoint
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.model
            .clone()
            .save_file(PathBuf::from(path), &CompactRecorder::new())
            .map_err(|e| WildfireError::Model(format!("Failed to save checkpoint: {:?}", e)))?;

        debug!("Checkpoint saved to {:?}", path);
        Ok(())
    }

    /// Load model weights from a checkpoint
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.model = self
            .model
            .clone()
            .load_file(PathBuf::from(path), &CompactRecorder::new(), &self.device)
            .map_err(|e| WildfireError::Model(format!("Failed to load checkpoint: {:?}", e)))?;
        info!("Checkpoint loaded from {:?}", path);
        Ok(())
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

/// Keras-style one-line epoch summary
fn print_epoch(record: &EpochRecord, batches: usize) {
    let auc = |v: Option<f64>| v.map_or("n/a".to_string(), |a| format!("{:.4}", a));
    println!(
        "Epoch {} - {}/{} - {:.0}s - loss: {:.4} - accuracy: {:.4} - precision: {:.4} - recall: {:.4} - auc: {} - val_loss: {:.4} - val_accuracy: {:.4} - val_precision: {:.4} - val_recall: {:.4} - val_auc: {} - lr: {:.2e}",
        record.epoch,
        batches,
        batches,
        record.duration_secs,
        record.loss,
        record.accuracy,
        record.precision,
        record.recall,
        auc(record.auc),
        record.val_loss,
        record.val_accuracy,
        record.val_precision,
        record.val_recall,
        auc(record.val_auc),
        record.learning_rate,
    );
}
