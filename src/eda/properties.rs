//! Per-image size and pixel statistics over a random sample of the train split

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dataset::loader::{display_class, open_image, DatasetLayout};
use crate::dataset::WILDFIRE_LABEL;
use crate::utils::charts::{histogram, Figure, HistogramSeries, COLOR_NO_WILDFIRE, COLOR_WILDFIRE};
use crate::utils::error::Result;

const CHANNELS: [&str; 3] = ["R", "G", "B"];

/// Size and per-channel statistics of one decoded image
#[derive(Debug, Clone, Serialize)]
pub struct ImageProperties {
    pub path: PathBuf,
    pub class_name: String,
    pub width: u32,
    pub height: u32,
    /// Per-channel mean, RGB order, 0-255 scale
    pub mean: [f64; 3],
    /// Per-channel population standard deviation
    pub std: [f64; 3],
}

impl ImageProperties {
    /// Decode `path` as RGB and measure it
    pub fn measure(path: &Path, class_name: &str) -> Result<Self> {
        let rgb = open_image(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let n = (width as f64 * height as f64).max(1.0);

        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        for pixel in rgb.pixels() {
            for c in 0..3 {
                let v = pixel[c] as f64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }

        let mut mean = [0.0; 3];
        let mut std = [0.0; 3];
        for c in 0..3 {
            mean[c] = sum[c] / n;
            std[c] = (sum_sq[c] / n - mean[c] * mean[c]).max(0.0).sqrt();
        }

        Ok(Self {
            path: path.to_path_buf(),
            class_name: class_name.to_string(),
            width,
            height,
            mean,
            std,
        })
    }
}

/// count / mean / std / min / quartiles / max of a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1), NaN for a single value
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl Describe {
    /// `None` for an empty column
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            q50: quantile(&sorted, 0.50),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Most frequent value, the smallest one on ties
fn mode(values: impl Iterator<Item = u32>) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    counts.into_iter().find(|&(_, n)| n == best).map(|(v, _)| v)
}

/// Measured sample of images, queried per class
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropertyTable {
    pub images: Vec<ImageProperties>,
}

/// Channel mean and average standard deviation of one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    pub mean: f64,
    pub std: f64,
}

impl PropertyTable {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a ImageProperties> + 'a {
        self.images.iter().filter(move |p| p.class_name == class)
    }

    /// One numeric column restricted to `class`
    pub fn column(&self, class: &str, get: impl Fn(&ImageProperties) -> f64) -> Vec<f64> {
        self.of_class(class).map(get).collect()
    }

    /// Most common width and most common height
    pub fn common_size(&self) -> Option<(u32, u32)> {
        let width = mode(self.images.iter().map(|p| p.width))?;
        let height = mode(self.images.iter().map(|p| p.height))?;
        Some((width, height))
    }

    /// Average of per-image means and standard deviations, per channel
    pub fn channel_summary(&self, class: &str) -> Option<[ChannelSummary; 3]> {
        let images: Vec<&ImageProperties> = self.of_class(class).collect();
        if images.is_empty() {
            return None;
        }
        let n = images.len() as f64;
        let mut out = [ChannelSummary { mean: 0.0, std: 0.0 }; 3];
        for (c, summary) in out.iter_mut().enumerate() {
            summary.mean = images.iter().map(|p| p.mean[c]).sum::<f64>() / n;
            summary.std = images.iter().map(|p| p.std[c]).sum::<f64>() / n;
        }
        Some(out)
    }

    /// Print a `describe()` table per class
    pub fn print_summary(&self, classes: &[String]) {
        println!("\n{}", "📊 Image Statistics Summary:".bold());
        type Column = (&'static str, fn(&ImageProperties) -> f64);
        let columns: [Column; 8] = [
            ("width", |p| p.width as f64),
            ("height", |p| p.height as f64),
            ("mean_r", |p| p.mean[0]),
            ("mean_g", |p| p.mean[1]),
            ("mean_b", |p| p.mean[2]),
            ("std_r", |p| p.std[0]),
            ("std_g", |p| p.std[1]),
            ("std_b", |p| p.std[2]),
        ];

        for class in classes {
            println!("\n  {}", class.bold());
            println!(
                "  {:<8}{:>7}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
                "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
            );
            for (name, get) in columns {
                let Some(d) = Describe::of(&self.column(class, get)) else {
                    continue;
                };
                println!(
                    "  {:<8}{:>7}{:>10.2}{:>10.2}{:>10.2}{:>10.2}{:>10.2}{:>10.2}{:>10.2}",
                    name, d.count, d.mean, d.std, d.min, d.q25, d.q50, d.q75, d.max
                );
            }
        }
    }
}

/// Whether `class` is the positive class of the configured `classes`
pub fn is_wildfire(classes: &[String], class: &str) -> bool {
    classes.get(WILDFIRE_LABEL).is_some_and(|c| c == class)
}

/// Classes in report order: the positive class first, the rest as configured
pub fn display_order(classes: &[String]) -> Vec<String> {
    let mut ordered = classes.to_vec();
    if WILDFIRE_LABEL < ordered.len() {
        let wildfire = ordered.remove(WILDFIRE_LABEL);
        ordered.insert(0, wildfire);
    }
    ordered
}

/// Chart colour of `class` within the configured `classes`
pub fn class_color(classes: &[String], class: &str) -> &'static str {
    if is_wildfire(classes, class) {
        COLOR_WILDFIRE
    } else {
        COLOR_NO_WILDFIRE
    }
}

/// Sample up to `sample_size` images per class from `split` and measure them
///
/// Unreadable images are logged and skipped.
pub fn sample_properties(
    layout: &DatasetLayout,
    split: &str,
    sample_size: usize,
    seed: u64,
) -> PropertyTable {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut images = Vec::new();

    for class in display_order(&layout.classes) {
        let files = layout.list_images(&layout.class_dir(split, &class));
        let sampled: Vec<&PathBuf> = files.choose_multiple(&mut rng, sample_size).collect();
        debug!("Sampled {} of {} images from '{}'", sampled.len(), files.len(), class);

        let measured: Vec<ImageProperties> = sampled
            .par_iter()
            .filter_map(|path| match ImageProperties::measure(path, &class) {
                Ok(props) => Some(props),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect();
        images.extend(measured);
    }

    PropertyTable { images }
}

/// Measure a random sample of the train split and draw `pixel_statistics.svg`
pub fn analyze_image_properties(
    layout: &DatasetLayout,
    split: &str,
    sample_size: usize,
    seed: u64,
    bins: usize,
    output_path: &Path,
) -> Result<PropertyTable> {
    println!(
        "\n{}",
        format!("🖼️ Analyzing image properties (sample size: {})...", sample_size).cyan()
    );
    let table = sample_properties(layout, split, sample_size, seed);
    table.print_summary(&display_order(&layout.classes));

    plot_pixel_statistics(&table, &layout.classes, bins, output_path)?;
    println!("✅ Saved: pixel_statistics.svg");
    Ok(table)
}

/// 2x3 grid: channel means on top, channel standard deviations below
///
/// `classes` is the configured class list; series are drawn positive first.
pub fn plot_pixel_statistics(
    table: &PropertyTable,
    classes: &[String],
    bins: usize,
    output_path: &Path,
) -> Result<()> {
    let mut figure = Figure::new("Pixel Statistics by Class", 3, 2);

    for (row, (stat, x_label)) in [("MEAN", "Pixel Value"), ("STD", "Standard Deviation")]
        .into_iter()
        .enumerate()
    {
        for (c, channel) in CHANNELS.iter().enumerate() {
            let series: Vec<HistogramSeries> = display_order(classes)
                .iter()
                .map(|class| HistogramSeries {
                    name: display_class(class),
                    values: table.column(class, |p| if row == 0 { p.mean[c] } else { p.std[c] }),
                    color: class_color(classes, class).to_string(),
                })
                .collect();
            figure.push(histogram(
                figure.panel(row * 3 + c),
                &format!("{stat}_{channel} Distribution"),
                x_label,
                &series,
                bins,
            ));
        }
    }

    figure.save(output_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::dataset::loader::tests::write_tiny_dataset;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_measure_solid_and_split_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half.png");
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 100, 255]));
        for x in 0..4 {
            img.put_pixel(x, 1, Rgb([200, 100, 255]));
        }
        img.save(&path).unwrap();

        let props = ImageProperties::measure(&path, "wildfire").unwrap();
        assert_eq!((props.width, props.height), (4, 2));
        assert!((props.mean[0] - 100.0).abs() < 1e-9);
        assert!((props.std[0] - 100.0).abs() < 1e-9);
        assert!((props.mean[1] - 100.0).abs() < 1e-9);
        assert!(props.std[1].abs() < 1e-9);
    }

    #[test]
    fn test_describe_matches_linear_quantiles() {
        let d = Describe::of(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(d.count, 4);
        assert_eq!(d.mean, 2.5);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 4.0);
        assert!((d.q25 - 1.75).abs() < 1e-12);
        assert!((d.q50 - 2.5).abs() < 1e-12);
        assert!((d.q75 - 3.25).abs() < 1e-12);
        assert!((d.std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert!(Describe::of(&[]).is_none());
        assert!(Describe::of(&[7.0]).unwrap().std.is_nan());
    }

    #[test]
    fn test_mode_prefers_smallest_on_tie() {
        assert_eq!(mode([350, 350, 200, 200, 100].into_iter()), Some(200));
        assert_eq!(mode(std::iter::empty()), None);
    }

    #[test]
    fn test_display_order_puts_wildfire_first() {
        let classes = vec!["nowildfire".to_string(), "wildfire".to_string()];
        assert_eq!(display_order(&classes), vec!["wildfire", "nowildfire"]);
    }

    #[test]
    fn test_positive_class_follows_configured_index() {
        // names that do not follow the "no" prefix convention
        let classes = vec!["clear".to_string(), "burning".to_string()];
        assert_eq!(display_order(&classes), vec!["burning", "clear"]);
        assert!(is_wildfire(&classes, "burning"));
        assert!(!is_wildfire(&classes, "clear"));
        assert_eq!(class_color(&classes, "burning"), COLOR_WILDFIRE);
        assert_eq!(class_color(&classes, "clear"), COLOR_NO_WILDFIRE);

        // a negative class named like the positive one keeps its role
        let classes = vec!["nothing_burning".to_string(), "notable_fire".to_string()];
        assert_eq!(display_order(&classes)[0], "notable_fire");
        assert_eq!(class_color(&classes, "nothing_burning"), COLOR_NO_WILDFIRE);
    }

    #[test]
    fn test_sampling_skips_broken_images() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(3, [20, 120, 40]), (2, [220, 60, 20])], 10);
        fs::write(dir.path().join("train/wildfire/broken.jpg"), b"garbage").unwrap();
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });

        let table = sample_properties(&layout, "train", 100, 42);
        assert_eq!(table.len(), 5);
        assert_eq!(table.of_class("wildfire").count(), 2);
        assert_eq!(table.common_size(), Some((10, 10)));

        let green = table.channel_summary("nowildfire").unwrap();
        assert!((green[1].mean - 120.0).abs() < 1e-9);
        assert!(table.channel_summary("smoke").is_none());
    }

    #[test]
    fn test_sample_size_limits_per_class() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(5, [20, 120, 40]), (5, [220, 60, 20])], 6);
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });

        let a = sample_properties(&layout, "train", 2, 7);
        let b = sample_properties(&layout, "train", 2, 7);
        assert_eq!(a.len(), 4);
        let paths = |t: &PropertyTable| t.images.iter().map(|p| p.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&a), paths(&b));
    }
}
