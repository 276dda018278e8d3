//! Epoch-end callbacks
//!
//! Checkpointing on the best validation accuracy, early stopping and
//! learning-rate reduction on a validation-loss plateau. Each callback is a
//! small state machine fed one monitored value per epoch; the trainer acts
//! on what they report.

use serde::{Deserialize, Serialize};

use crate::config::CallbackConfig;

/// Quantity a callback watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    ValLoss,
    ValAccuracy,
}

impl Monitor {
    pub fn name(&self) -> &'static str {
        match self {
            Monitor::ValLoss => "val_loss",
            Monitor::ValAccuracy => "val_accuracy",
        }
    }

    /// Direction in which the quantity improves
    pub fn mode(&self) -> Mode {
        match self {
            Monitor::ValLoss => Mode::Min,
            Monitor::ValAccuracy => Mode::Max,
        }
    }
}

/// Whether lower or higher values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Min,
    Max,
}

/// Best value seen so far under a mode and minimum delta
#[derive(Debug, Clone)]
pub struct BestTracker {
    mode: Mode,
    min_delta: f64,
    best: f64,
}

impl BestTracker {
    pub fn new(mode: Mode, min_delta: f64) -> Self {
        let best = match mode {
            Mode::Min => f64::INFINITY,
            Mode::Max => f64::NEG_INFINITY,
        };
        Self {
            mode,
            min_delta: min_delta.abs(),
            best,
        }
    }

    pub fn is_improvement(&self, current: f64) -> bool {
        match self.mode {
            Mode::Min => current < self.best - self.min_delta,
            Mode::Max => current > self.best + self.min_delta,
        }
    }

    /// Record `current` if it improves on the best, returning whether it did
    pub fn update(&mut self, current: f64) -> bool {
        if self.is_improvement(current) {
            self.best = current;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}

/// Save-best-only checkpointing
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    pub monitor: Monitor,
    tracker: BestTracker,
    best_epoch: Option<usize>,
}

impl Default for ModelCheckpoint {
    fn default() -> Self {
        Self::new(Monitor::ValAccuracy)
    }
}

impl ModelCheckpoint {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            tracker: BestTracker::new(monitor.mode(), 0.0),
            best_epoch: None,
        }
    }

    /// Returns true when the model of this epoch should be saved
    pub fn on_epoch_end(&mut self, epoch: usize, value: f64) -> bool {
        if self.tracker.update(value) {
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.tracker.best()
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// Outcome of an early-stopping check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingSignal {
    /// The monitored value improved; snapshot the weights if restoring
    Improved,
    /// No improvement for this many epochs
    Waiting(usize),
    /// Patience exhausted
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    pub monitor: Monitor,
    pub patience: usize,
    pub restore_best_weights: bool,
    tracker: BestTracker,
    wait: usize,
    best_epoch: Option<usize>,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(monitor: Monitor, patience: usize, min_delta: f64, restore_best_weights: bool) -> Self {
        Self {
            monitor,
            patience,
            restore_best_weights,
            tracker: BestTracker::new(monitor.mode(), min_delta),
            wait: 0,
            best_epoch: None,
            stopped_epoch: None,
        }
    }

    /// `epoch` is 1-based
    pub fn on_epoch_end(&mut self, epoch: usize, value: f64) -> StoppingSignal {
        if self.tracker.update(value) {
            self.wait = 0;
            self.best_epoch = Some(epoch);
            return StoppingSignal::Improved;
        }

        self.wait += 1;
        if self.wait >= self.patience && epoch > 1 {
            self.stopped_epoch = Some(epoch);
            StoppingSignal::Stop
        } else {
            StoppingSignal::Waiting(self.wait)
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.tracker.best()
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs
/// without improvement, never going below `min_lr`
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub monitor: Monitor,
    pub factor: f64,
    pub patience: usize,
    pub min_lr: f64,
    tracker: BestTracker,
    wait: usize,
}

/// Improvement threshold of the plateau detector
pub const PLATEAU_MIN_DELTA: f64 = 1e-4;

impl ReduceLrOnPlateau {
    pub fn new(monitor: Monitor, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            monitor,
            factor,
            patience,
            min_lr,
            tracker: BestTracker::new(monitor.mode(), PLATEAU_MIN_DELTA),
            wait: 0,
        }
    }

    /// Returns the reduced learning rate when a reduction happens
    pub fn on_epoch_end(&mut self, value: f64, current_lr: f64) -> Option<f64> {
        if self.tracker.update(value) {
            self.wait = 0;
            return None;
        }

        self.wait += 1;
        if self.wait < self.patience {
            return None;
        }

        self.wait = 0;
        if current_lr > self.min_lr {
            Some((current_lr * self.factor).max(self.min_lr))
        } else {
            None
        }
    }
}

/// The three callbacks of a training run
#[derive(Debug, Clone)]
pub struct Callbacks {
    pub checkpoint: ModelCheckpoint,
    pub early_stopping: EarlyStopping,
    pub reduce_lr: ReduceLrOnPlateau,
}

impl Callbacks {
    pub fn from_config(config: &CallbackConfig) -> Self {
        Self {
            checkpoint: ModelCheckpoint::new(Monitor::ValAccuracy),
            early_stopping: EarlyStopping::new(
                Monitor::ValLoss,
                config.early_stopping_patience,
                0.0,
                config.restore_best_weights,
            ),
            reduce_lr: ReduceLrOnPlateau::new(
                Monitor::ValLoss,
                config.reduce_lr_factor,
                config.reduce_lr_patience,
                config.min_lr,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_saves_on_strict_improvement() {
        let mut cp = ModelCheckpoint::default();
        assert!(cp.on_epoch_end(1, 0.70));
        assert!(cp.on_epoch_end(2, 0.80));
        assert!(!cp.on_epoch_end(3, 0.80));
        assert!(!cp.on_epoch_end(4, 0.75));
        assert_eq!(cp.best(), Some(0.80));
        assert_eq!(cp.best_epoch(), Some(2));
    }

    #[test]
    fn test_early_stopping_after_patience() {
        let mut es = EarlyStopping::new(Monitor::ValLoss, 3, 0.0, true);
        assert_eq!(es.on_epoch_end(1, 0.9), StoppingSignal::Improved);
        assert_eq!(es.on_epoch_end(2, 0.5), StoppingSignal::Improved);
        assert_eq!(es.on_epoch_end(3, 0.6), StoppingSignal::Waiting(1));
        assert_eq!(es.on_epoch_end(4, 0.5), StoppingSignal::Waiting(2));
        assert_eq!(es.on_epoch_end(5, 0.7), StoppingSignal::Stop);
        assert_eq!(es.best_epoch(), Some(2));
        assert_eq!(es.stopped_epoch(), Some(5));
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut es = EarlyStopping::new(Monitor::ValLoss, 2, 0.0, false);
        es.on_epoch_end(1, 1.0);
        assert_eq!(es.on_epoch_end(2, 1.1), StoppingSignal::Waiting(1));
        assert_eq!(es.on_epoch_end(3, 0.8), StoppingSignal::Improved);
        assert_eq!(es.on_epoch_end(4, 0.9), StoppingSignal::Waiting(1));
        assert_eq!(es.on_epoch_end(5, 0.9), StoppingSignal::Stop);
    }

    #[test]
    fn test_reduce_lr_halves_and_clamps() {
        let mut rl = ReduceLrOnPlateau::new(Monitor::ValLoss, 0.5, 2, 1e-7);
        let mut lr = 1e-3;
        assert_eq!(rl.on_epoch_end(0.5, lr), None);
        assert_eq!(rl.on_epoch_end(0.6, lr), None);
        lr = rl.on_epoch_end(0.6, lr).unwrap();
        assert!((lr - 5e-4).abs() < 1e-12);

        let mut lr = 1.5e-7;
        let mut rl = ReduceLrOnPlateau::new(Monitor::ValLoss, 0.5, 1, 1e-7);
        rl.on_epoch_end(1.0, lr);
        lr = rl.on_epoch_end(1.0, lr).unwrap();
        assert_eq!(lr, 1e-7);
        assert_eq!(rl.on_epoch_end(1.0, lr), None);
    }

    #[test]
    fn test_plateau_ignores_tiny_improvements() {
        let mut rl = ReduceLrOnPlateau::new(Monitor::ValLoss, 0.5, 1, 0.0);
        rl.on_epoch_end(0.50000, 1.0);
        assert_eq!(rl.on_epoch_end(0.49999, 1.0), Some(0.5));
    }

    #[test]
    fn test_default_monitors() {
        let cb = Callbacks::from_config(&CallbackConfig::default());
        assert_eq!(cb.checkpoint.monitor.mode(), Mode::Max);
        assert_eq!(cb.early_stopping.monitor.name(), "val_loss");
        assert_eq!(cb.early_stopping.patience, 10);
        assert_eq!(cb.reduce_lr.factor, 0.5);
    }
}
