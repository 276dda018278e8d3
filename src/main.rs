//! Wildfire Detection CLI
//!
//! Entry point for the EDA, training and prediction pipelines.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use wildfire_detection::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use wildfire_detection::dataset::loader::{is_image_file, DatasetLayout, WildfireDataset};
use wildfire_detection::inference::{BatchPredictionStats, Predictor, RiskLevel};
use wildfire_detection::model::{ModelSummary, WildfireCnn, WildfireCnnConfig};
use wildfire_detection::training::TestMetrics;
use wildfire_detection::utils::logging::{init_logging, LogConfig, LogLevel};
use wildfire_detection::{ConfigOverrides, PipelineConfig};

/// Wildfire detection from satellite imagery
///
/// Exploratory data analysis, CNN training and prediction built on Burn.
#[derive(Parser, Debug)]
#[command(name = "wildfire")]
#[command(version)]
#[command(about = "Wildfire detection from satellite imagery with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file (defaults to ./wildfire.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exploratory data analysis
    Eda {
        /// Dataset root containing train/valid/test
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Random seed for image sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train the CNN, evaluate it and export the model
    Train {
        /// Dataset root containing train/valid/test
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Initial learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Square input size in pixels
        #[arg(long)]
        image_size: Option<usize>,

        /// Decode every image once and keep it in memory
        #[arg(long, default_value = "false")]
        cache: bool,
    },

    /// Classify an image or every image in a directory
    Predict {
        /// Image file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Saved model directory or record file
        #[arg(short, long, default_value = "models/saved_model")]
        model: PathBuf,

        /// Wildfire probability above which a tile is classified as wildfire
        #[arg(short, long, default_value = "0.5")]
        threshold: f32,

        /// Write predictions as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the model architecture, dataset counts and latest test metrics
    Summary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else if !std::io::stderr().is_terminal() {
        LogConfig::production()
    } else {
        LogConfig::default()
    };
    if let Some(level) = cli.log_level.as_deref() {
        log_config.level = LogLevel::parse(level);
    }
    let _ = init_logging(&log_config);

    print_banner();

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Eda { data_dir, seed } => {
            config.apply_overrides(&ConfigOverrides {
                data_dir,
                seed,
                ..ConfigOverrides::default()
            });
            cmd_eda(&config)?;
        }

        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            seed,
            image_size,
            cache,
        } => {
            config.apply_overrides(&ConfigOverrides {
                data_dir,
                epochs,
                batch_size,
                learning_rate,
                seed,
                image_size,
                cache_images: cache,
            });
            cmd_train(&config)?;
        }

        Commands::Predict {
            input,
            model,
            threshold,
            output,
        } => {
            cmd_predict(&config, &input, &model, threshold, output.as_deref())?;
        }

        Commands::Summary => {
            cmd_summary(&config)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════╗
 ║   🔥 Wildfire Detection                                          ║
 ║   Satellite image classification with Burn + Rust                ║
 ╚══════════════════════════════════════════════════════════════════╝
  "#
        .red()
    );
    println!("  v{}\n", wildfire_detection::VERSION);
}

fn cmd_eda(config: &PipelineConfig) -> Result<()> {
    config.validate()?;
    info!("Running EDA on {}", config.data.data_dir.display());
    wildfire_detection::eda::run_eda(config).context("EDA pipeline failed")?;
    Ok(())
}

fn cmd_train(config: &PipelineConfig) -> Result<()> {
    info!("Training on {} with {}", config.data.data_dir.display(), backend_name());
    let summary = wildfire_detection::training::run_training::<TrainingBackend>(config)
        .context("training pipeline failed")?;
    info!(
        "Finished after {} epochs, run log in {}",
        summary.epochs_run,
        summary.run_dir.display()
    );
    Ok(())
}

fn collect_inputs(input: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input path not found: {}", input.display());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p, extensions))
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no images found in {}", input.display());
    }
    Ok(files)
}

fn cmd_predict(
    config: &PipelineConfig,
    input: &Path,
    model: &Path,
    threshold: f32,
    output: Option<&Path>,
) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("threshold must be in range [0.0, 1.0], got {threshold}");
    }

    println!("{}", "Prediction Configuration:".cyan().bold());
    println!("  📷 Input:   {}", input.display());
    println!("  🧠 Model:   {}", model.display());
    println!("  🖥️  Backend: {}", backend_name());
    println!();

    let files = collect_inputs(input, &config.data.extensions)?;
    let cnn_config = WildfireCnnConfig::from_model_config(&config.model);
    let predictor = Predictor::<DefaultBackend>::load(
        model,
        &cnn_config,
        &config.data.classes,
        default_device(),
    )
    .with_context(|| format!("failed to load model from {}", model.display()))?
    .with_threshold(threshold)
    .with_batch_size(config.training.batch_size);

    println!("{}", "Running inference...".cyan());
    let predictions = predictor.predict_batch(&files)?;

    for prediction in &predictions {
        println!();
        let badge = prediction.risk.label();
        let badge = match prediction.risk {
            RiskLevel::High => badge.red().bold(),
            RiskLevel::Medium => badge.yellow().bold(),
            RiskLevel::Low => badge.green().bold(),
        };
        println!("{}", badge);
        print!("{}", prediction.display());
    }

    if predictions.len() > 1 {
        println!("\n{}", BatchPredictionStats::from_predictions(&predictions));
    }

    if let Some(path) = output {
        fs::write(path, serde_json::to_string_pretty(&predictions)?)?;
        println!("✅ Predictions saved to {}", path.display());
    }
    Ok(())
}

fn cmd_summary(config: &PipelineConfig) -> Result<()> {
    let cnn_config = WildfireCnnConfig::from_model_config(&config.model);
    let model: WildfireCnn<DefaultBackend> = cnn_config.init(&default_device());
    println!("{}", "📋 Model Architecture:".cyan().bold());
    println!("{}", ModelSummary::of(&model, &cnn_config));

    let layout = DatasetLayout::from_config(&config.data);
    if layout.root.is_dir() {
        for split in config.data.splits() {
            match WildfireDataset::scan(&layout, split) {
                Ok(dataset) => dataset.get_stats().print(),
                Err(e) => println!("{} {}: {}", "Skipped".yellow(), split, e),
            }
        }
    } else {
        println!(
            "\n{} Dataset directory not found: {}",
            "Note:".yellow(),
            layout.root.display()
        );
    }

    let metrics_path = config.output.models_dir.join("metrics.json");
    match TestMetrics::load(&metrics_path) {
        Ok(metrics) => {
            println!("\n{}", "📊 Latest Test Metrics:".cyan().bold());
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Err(_) => println!(
            "\n{} No test metrics at {} (run `wildfire train` first)",
            "Note:".yellow(),
            metrics_path.display()
        ),
    }
    Ok(())
}
