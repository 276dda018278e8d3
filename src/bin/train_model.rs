//! CNN training with the default configuration
//!
//! Reads `wildfire.toml` from the working directory when present; writes
//! models to `models/`, figures to `plots/` and run logs to `logs/`.

use anyhow::{Context, Result};

use wildfire_detection::backend::TrainingBackend;
use wildfire_detection::utils::logging::{init_logging, LogConfig};
use wildfire_detection::PipelineConfig;

fn main() -> Result<()> {
    let _ = init_logging(&LogConfig::default());

    let config = PipelineConfig::load_or_default(None)?;
    wildfire_detection::training::run_training::<TrainingBackend>(&config)
        .context("training pipeline failed")?;
    Ok(())
}
