//! Pipeline Configuration
//!
//! One TOML file (`wildfire.toml` by default) configures both pipelines.
//! Every section and field has a default, so a missing file or a partial
//! file is valid.
//!
//! ```toml
//! [data]
//! data_dir = "data/wildfire"
//!
//! [training]
//! epochs = 20
//! batch_size = 16
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::inference::DEFAULT_THRESHOLD;
use crate::model::DEFAULT_DROPOUT;
use crate::training::{DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE};
use crate::IMAGE_SIZE;
use crate::utils::error::{Result, WildfireError};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "wildfire.toml";

/// Largest tile side accepted for the sample image grid
pub const MAX_TILE_SIZE: u32 = 1024;

/// Largest number of tiles per row in the sample image grid
pub const MAX_SAMPLES_PER_CLASS: usize = 64;

/// Top-level configuration shared by the EDA and training pipelines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub augmentation: AugmentationConfig,
    pub output: OutputConfig,
    pub eda: EdaConfig,
}

/// Dataset location and layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory containing the split directories
    pub data_dir: PathBuf,
    pub train_split: String,
    pub valid_split: String,
    pub test_split: String,
    /// Class directory names; position is the label index
    pub classes: Vec<String>,
    /// Accepted file extensions, compared case-insensitively
    pub extensions: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/wildfire"),
            train_split: "train".to_string(),
            valid_split: "valid".to_string(),
            test_split: "test".to_string(),
            classes: vec!["nowildfire".to_string(), "wildfire".to_string()],
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

impl DataConfig {
    /// The three splits in train, valid, test order
    pub fn splits(&self) -> [&str; 3] {
        [&self.train_split, &self.valid_split, &self.test_split]
    }
}

/// CNN architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Square input side in pixels
    pub image_size: usize,
    pub in_channels: usize,
    /// Filters of each conv block
    pub conv_filters: Vec<usize>,
    /// Hidden dense layer widths
    pub dense_units: Vec<usize>,
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            in_channels: 3,
            conv_filters: vec![32, 64, 128, 256],
            dense_units: vec![512, 256],
            dropout: DEFAULT_DROPOUT,
        }
    }
}

/// Fit loop hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Decision threshold on the wildfire probability
    pub threshold: f32,
    /// Decode every image once up front instead of on each access
    pub cache_images: bool,
    pub callbacks: CallbackConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: 42,
            threshold: DEFAULT_THRESHOLD,
            cache_images: false,
            callbacks: CallbackConfig::default(),
        }
    }
}

/// Checkpoint, early stopping and plateau settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    pub early_stopping_patience: usize,
    pub restore_best_weights: bool,
    pub reduce_lr_factor: f64,
    pub reduce_lr_patience: usize,
    pub min_lr: f64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            early_stopping_patience: 10,
            restore_best_weights: true,
            reduce_lr_factor: 0.5,
            reduce_lr_patience: 5,
            min_lr: 1e-7,
        }
    }
}

/// Where artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub models_dir: PathBuf,
    pub plots_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub eda_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            plots_dir: PathBuf::from("plots"),
            logs_dir: PathBuf::from("logs"),
            eda_dir: PathBuf::from("eda_results"),
        }
    }
}

/// EDA sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdaConfig {
    /// Images sampled per class for pixel statistics
    pub sample_size: usize,
    /// Tiles per row in the sample image grid
    pub samples_per_class: usize,
    pub histogram_bins: usize,
    /// Side of one tile in the sample grid
    pub tile_size: u32,
    pub seed: u64,
}

impl Default for EdaConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            samples_per_class: 6,
            histogram_bins: 30,
            tile_size: 200,
            seed: 42,
        }
    }
}

/// Values given on the command line, applied over the loaded file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub seed: Option<u64>,
    pub image_size: Option<usize>,
    pub cache_images: bool,
}

impl PipelineConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WildfireError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        toml::from_str(&content).map_err(|e| {
            WildfireError::Config(format!("Failed to parse config {}: {e}", path.display()))
        })
    }

    /// Load `path` if given, else `wildfire.toml` if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    tracing::info!("Using configuration from {}", fallback.display());
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Replace every field the overrides set
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.data_dir {
            self.data.data_dir = dir.clone();
        }
        if let Some(epochs) = overrides.epochs {
            self.training.epochs = epochs;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.training.batch_size = batch_size;
        }
        if let Some(lr) = overrides.learning_rate {
            self.training.learning_rate = lr;
        }
        if let Some(seed) = overrides.seed {
            self.training.seed = seed;
            self.eda.seed = seed;
        }
        if let Some(size) = overrides.image_size {
            self.model.image_size = size;
        }
        if overrides.cache_images {
            self.training.cache_images = true;
        }
    }

    /// Reject values the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(WildfireError::Config(msg.to_string()));

        if self.data.classes.len() != 2 {
            return fail("exactly two classes are required (negative first, positive second)");
        }
        if self.data.extensions.is_empty() {
            return fail("at least one image extension is required");
        }
        if self.model.image_size < 16 {
            return fail("model.image_size must be at least 16");
        }
        if self.model.conv_filters.is_empty() {
            return fail("model.conv_filters must have at least one block");
        }
        let pooled = u32::try_from(self.model.conv_filters.len())
            .ok()
            .and_then(|blocks| self.model.image_size.checked_shr(blocks))
            .unwrap_or(0);
        if pooled == 0 {
            return fail("model.image_size is too small for the number of conv blocks");
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return fail("model.dropout must be in range [0.0, 1.0)");
        }
        if self.training.batch_size == 0 {
            return fail("training.batch_size must be greater than 0");
        }
        if self.training.epochs == 0 {
            return fail("training.epochs must be greater than 0");
        }
        if self.training.learning_rate <= 0.0 {
            return fail("training.learning_rate must be positive");
        }
        if !(0.0..=1.0).contains(&self.training.threshold) {
            return fail("training.threshold must be in range [0.0, 1.0]");
        }
        let cb = &self.training.callbacks;
        if !(cb.reduce_lr_factor > 0.0 && cb.reduce_lr_factor < 1.0) {
            return fail("callbacks.reduce_lr_factor must be in range (0.0, 1.0)");
        }
        if cb.min_lr < 0.0 {
            return fail("callbacks.min_lr must not be negative");
        }
        if self.eda.histogram_bins == 0 {
            return fail("eda.histogram_bins must be greater than 0");
        }
        if self.eda.tile_size == 0 || self.eda.tile_size > MAX_TILE_SIZE {
            return fail("eda.tile_size must be in range [1, 1024]");
        }
        if self.eda.samples_per_class > MAX_SAMPLES_PER_CLASS {
            return fail("eda.samples_per_class must be at most 64");
        }
        Ok(())
    }

    /// Write the effective configuration as JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.model.image_size, 350);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.data.classes, vec!["nowildfire", "wildfire"]);
        assert_eq!(config.training.callbacks.early_stopping_patience, 10);
        assert_eq!(config.training.callbacks.reduce_lr_patience, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wildfire.toml");
        fs::write(
            &path,
            r#"
[data]
data_dir = "/tmp/sat"

[training]
epochs = 3

[training.callbacks]
min_lr = 1e-6
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.data.data_dir, PathBuf::from("/tmp/sat"));
        assert_eq!(config.data.train_split, "train");
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.training.callbacks.min_lr, 1e-6);
        assert_eq!(config.training.callbacks.reduce_lr_factor, 0.5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[training\nepochs = ").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(WildfireError::Config(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig::default();
        config.training.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.model.dropout = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.data.classes.push("smoke".to_string());
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.training.callbacks.reduce_lr_factor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unrenderable_sizes() {
        let mut config = PipelineConfig::default();
        config.model.conv_filters = vec![1; 64];
        assert!(matches!(config.validate(), Err(WildfireError::Config(_))));

        let mut config = PipelineConfig::default();
        config.model.conv_filters = vec![1; 200];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.eda.tile_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.eda.tile_size = MAX_TILE_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.eda.samples_per_class = MAX_SAMPLES_PER_CLASS + 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.eda.tile_size = MAX_TILE_SIZE;
        config.eda.samples_per_class = MAX_SAMPLES_PER_CLASS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(&ConfigOverrides {
            epochs: Some(5),
            seed: Some(7),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.eda.seed, 7);
        assert_eq!(config.training.batch_size, 32);
        assert!(!config.training.cache_images);
    }

    #[test]
    fn test_save_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        PipelineConfig::default().save_json(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"learning_rate\": 0.001"));
    }
}
