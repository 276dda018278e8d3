//! Exploratory data analysis with the default configuration
//!
//! Reads `wildfire.toml` from the working directory when present and writes
//! everything to `eda_results/`.

use anyhow::{Context, Result};

use wildfire_detection::utils::logging::{init_logging, LogConfig};
use wildfire_detection::PipelineConfig;

fn main() -> Result<()> {
    let _ = init_logging(&LogConfig::default());

    let config = PipelineConfig::load_or_default(None)?;
    config.validate()?;
    wildfire_detection::eda::run_eda(&config).context("EDA pipeline failed")?;
    Ok(())
}
