//! Exploratory data analysis of the wildfire dataset
//!
//! This module provides:
//! - Class/split counts with a 2x2 distribution figure
//! - Per-channel pixel statistics over a random sample of the train split
//! - A grid of sample images per class
//! - A plain-text summary report
//!
//! Everything is written to the configured `eda_results/` directory.

pub mod properties;
pub mod report;
pub mod samples;

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::dataset::loader::{display_class, display_split, ClassDistribution, DatasetLayout};
use crate::utils::charts::{
    grouped_bar_chart, pie_chart, stacked_bar_chart, BarData, BarGroup, Figure, COLOR_TEST,
    COLOR_TRAIN, COLOR_VALID,
};
use crate::utils::error::Result;

pub use properties::{analyze_image_properties, display_order, Describe, ImageProperties, PropertyTable};
pub use report::{generate_summary_report, BalanceStatus};
pub use samples::visualize_sample_images;

pub const DISTRIBUTION_FILE: &str = "dataset_distribution.svg";
pub const PIXEL_STATS_FILE: &str = "pixel_statistics.svg";
pub const SAMPLES_FILE: &str = "sample_images.png";
pub const REPORT_FILE: &str = "eda_summary_report.txt";

const SPLIT_COLORS: [&str; 3] = [COLOR_TRAIN, COLOR_VALID, COLOR_TEST];

fn split_color(index: usize) -> &'static str {
    SPLIT_COLORS[index % SPLIT_COLORS.len()]
}

/// Results of [`run_eda`]
#[derive(Debug, Clone)]
pub struct EdaSummary {
    pub distribution: ClassDistribution,
    pub properties: PropertyTable,
    pub output_dir: PathBuf,
    pub report: String,
}

/// Count every split, print the table and write the distribution figure
pub fn analyze_distribution(layout: &DatasetLayout, output_path: &Path) -> Result<ClassDistribution> {
    println!("\n{}", "📊 Analyzing dataset distribution...".cyan());
    let dist = ClassDistribution::from_layout(layout)?;
    dist.print();
    plot_distribution(&dist, output_path)?;
    println!("✅ Saved: {}", DISTRIBUTION_FILE);
    Ok(dist)
}

/// Grouped bars by split, class pie, split pie, bars per class stacked by split
pub fn plot_distribution(dist: &ClassDistribution, output_path: &Path) -> Result<()> {
    let classes: Vec<(usize, &String)> = display_order(&dist.classes)
        .into_iter()
        .filter_map(|name| dist.class_index(&name))
        .map(|i| (i, &dist.classes[i]))
        .collect();

    let by_split: Vec<BarGroup> = dist
        .splits
        .iter()
        .enumerate()
        .map(|(s, split)| BarGroup {
            label: display_split(split),
            bars: classes
                .iter()
                .map(|&(c, name)| {
                    BarData::new(
                        &display_class(name),
                        dist.count(c, s) as f64,
                        properties::class_color(&dist.classes, name),
                    )
                })
                .collect(),
        })
        .collect();

    let class_slices: Vec<BarData> = classes
        .iter()
        .map(|&(c, name)| {
            BarData::new(
                &display_class(name),
                dist.class_total(c) as f64,
                properties::class_color(&dist.classes, name),
            )
        })
        .collect();

    let split_slices: Vec<BarData> = dist
        .splits
        .iter()
        .enumerate()
        .map(|(s, split)| BarData::new(&display_split(split), dist.split_total(s) as f64, split_color(s)))
        .collect();

    let by_class: Vec<BarGroup> = classes
        .iter()
        .map(|&(c, name)| BarGroup {
            label: display_class(name),
            bars: dist
                .splits
                .iter()
                .enumerate()
                .map(|(s, split)| BarData::new(&display_split(split), dist.count(c, s) as f64, split_color(s)))
                .collect(),
        })
        .collect();

    let mut figure = Figure::new("Dataset Distribution", 2, 2);
    figure.push(grouped_bar_chart(
        figure.panel(0),
        "Dataset Distribution by Split",
        "Number of Images",
        &by_split,
    ));
    figure.push(pie_chart(figure.panel(1), "Overall Class Distribution", &class_slices));
    figure.push(pie_chart(figure.panel(2), "Dataset Split Distribution", &split_slices));
    figure.push(stacked_bar_chart(
        figure.panel(3),
        "Images per Class (Stacked by Split)",
        "Number of Images",
        &by_class,
    ));
    figure.save(output_path)?;
    Ok(())
}

/// Run the whole EDA pipeline
pub fn run_eda(config: &PipelineConfig) -> Result<EdaSummary> {
    let rule = "=".repeat(70);
    println!("{rule}");
    println!("{}", "🔍 Wildfire Detection - Exploratory Data Analysis".bold());
    println!("{rule}");

    let out_dir = &config.output.eda_dir;
    fs::create_dir_all(out_dir)?;
    let layout = DatasetLayout::from_config(&config.data);
    let eda = &config.eda;
    info!("EDA over {} -> {}", layout.root.display(), out_dir.display());

    println!("\n{}", "🚀 Starting EDA pipeline...".bold());

    let distribution = analyze_distribution(&layout, &out_dir.join(DISTRIBUTION_FILE))?;

    let properties = analyze_image_properties(
        &layout,
        &config.data.train_split,
        eda.sample_size,
        eda.seed,
        eda.histogram_bins,
        &out_dir.join(PIXEL_STATS_FILE),
    )?;

    visualize_sample_images(
        &layout,
        &config.data.train_split,
        eda.samples_per_class,
        eda.tile_size,
        eda.seed,
        &out_dir.join(SAMPLES_FILE),
    )?;

    let report = generate_summary_report(&distribution, &properties, &out_dir.join(REPORT_FILE))?;

    println!("\n{rule}");
    println!("{}", "🎉 EDA completed successfully!".green().bold());
    println!("📁 Results saved to: {}", out_dir.display());
    println!("{rule}");

    Ok(EdaSummary {
        distribution,
        properties,
        output_dir: out_dir.clone(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_tiny_dataset;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.data.data_dir = dir.path().join("data");
        config.output.eda_dir = dir.path().join("eda_results");
        config.eda.sample_size = 3;
        config.eda.samples_per_class = 2;
        config.eda.tile_size = 16;
        config
    }

    #[test]
    fn test_run_eda_writes_all_outputs() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(&dir.path().join("data"), &[(4, [20, 120, 40]), (5, [220, 60, 20])], 12);
        let config = config_for(&dir);

        let summary = run_eda(&config).unwrap();
        assert_eq!(summary.distribution.total(), 27);
        assert_eq!(summary.properties.len(), 6);

        for file in [DISTRIBUTION_FILE, PIXEL_STATS_FILE, SAMPLES_FILE, REPORT_FILE] {
            assert!(summary.output_dir.join(file).exists(), "missing {file}");
        }
        let svg = fs::read_to_string(summary.output_dir.join(DISTRIBUTION_FILE)).unwrap();
        assert!(svg.contains("Dataset Distribution by Split"));
        assert!(svg.contains("Validation"));
        let stats = fs::read_to_string(summary.output_dir.join(PIXEL_STATS_FILE)).unwrap();
        assert!(stats.contains("MEAN_R Distribution"));
        assert!(stats.contains("STD_B Distribution"));
        assert!(summary.report.contains("Class Imbalance Ratio: 1.25:1"));
    }

    #[test]
    fn test_missing_split_fails() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        assert!(run_eda(&config).is_err());
    }
}
