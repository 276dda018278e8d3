//! Per-epoch training history
//!
//! Written as CSV next to the run log and as JSON for later plotting.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::training::callbacks::Monitor;
use crate::utils::error::Result;

/// Metrics of one epoch on the training and validation sets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub auc: Option<f64>,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub val_precision: f64,
    pub val_recall: f64,
    pub val_auc: Option<f64>,
    pub learning_rate: f64,
    pub duration_secs: f64,
}

impl EpochRecord {
    pub fn monitored(&self, monitor: Monitor) -> f64 {
        match monitor {
            Monitor::ValLoss => self.val_loss,
            Monitor::ValAccuracy => self.val_accuracy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    pub records: Vec<EpochRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    /// (epoch, value) pairs for plotting
    pub fn series<F: Fn(&EpochRecord) -> f64>(&self, f: F) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .map(|r| (r.epoch as f64, f(r)))
            .collect()
    }

    /// Record with the best monitored value
    pub fn best(&self, monitor: Monitor) -> Option<&EpochRecord> {
        use crate::training::callbacks::Mode;
        let key = |r: &&EpochRecord| r.monitored(monitor);
        match monitor.mode() {
            Mode::Max => self
                .records
                .iter()
                .max_by(|a, b| key(a).total_cmp(&key(b))),
            Mode::Min => self
                .records
                .iter()
                .min_by(|a, b| key(a).total_cmp(&key(b))),
        }
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.records)?)?;
        Ok(())
    }
}

/// `logs/run_{YYYYmmdd_HHMMSS}`
pub fn run_log_dir(logs_dir: &Path) -> PathBuf {
    logs_dir.join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S")))
}
