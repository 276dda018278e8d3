//! Wildfire Dataset Loader
//!
//! Handles the on-disk layout of the satellite dataset:
//!
//! ```text
//! data_dir/
//! ├── train/
//! │   ├── nowildfire/
//! │   └── wildfire/
//! ├── valid/
//! │   └── ...
//! └── test/
//!     └── ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use image::{DynamicImage, ImageReader};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::DataConfig;
use crate::utils::error::{Result, WildfireError};
use crate::utils::{format_number, percentage};

/// A single image sample with its label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    pub path: PathBuf,
    /// Class label index (0 = nowildfire, 1 = wildfire)
    pub label: usize,
    pub class_name: String,
}

/// Resolves split and class directories under the dataset root
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub splits: Vec<String>,
    pub classes: Vec<String>,
    pub extensions: Vec<String>,
}

impl DatasetLayout {
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            splits: config.splits().iter().map(|s| s.to_string()).collect(),
            classes: config.classes.clone(),
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.root.join(split)
    }

    pub fn class_dir(&self, split: &str, class: &str) -> PathBuf {
        self.root.join(split).join(class)
    }

    /// Whether `path` has one of the accepted extensions (case-insensitive)
    pub fn is_image_file(&self, path: &Path) -> bool {
        is_image_file(path, &self.extensions)
    }

    /// Image files directly inside `dir`, sorted by name
    pub fn list_images(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.is_image_file(p))
            .collect();
        files.sort();
        files
    }

    /// Count images per class of one split
    ///
    /// The split directory must exist; a missing class directory counts 0.
    pub fn count_split(&self, split: &str) -> Result<Vec<usize>> {
        let split_dir = self.split_dir(split);
        if !split_dir.is_dir() {
            return Err(WildfireError::PathNotFound(split_dir));
        }
        Ok(self
            .classes
            .iter()
            .map(|class| count_images(&self.class_dir(split, class), &self.extensions))
            .collect())
    }
}

pub fn is_image_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}

/// Number of image files directly inside `dir` (0 if it does not exist)
pub fn count_images(dir: &Path, extensions: &[String]) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| is_image_file(&e.path(), extensions))
        .count()
}

/// Decode an image, mapping failures to [`WildfireError::ImageLoad`]
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| WildfireError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| WildfireError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| WildfireError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Image counts per (class, split)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub classes: Vec<String>,
    pub splits: Vec<String>,
    /// `counts[class][split]`
    pub counts: Vec<Vec<usize>>,
}

impl ClassDistribution {
    /// Count every split of the layout
    pub fn from_layout(layout: &DatasetLayout) -> Result<Self> {
        let mut counts = vec![vec![0usize; layout.splits.len()]; layout.classes.len()];
        for (s, split) in layout.splits.iter().enumerate() {
            let per_class = layout.count_split(split)?;
            for (c, n) in per_class.into_iter().enumerate() {
                counts[c][s] = n;
            }
            debug!("Split '{}' counted", split);
        }
        Ok(Self {
            classes: layout.classes.clone(),
            splits: layout.splits.clone(),
            counts,
        })
    }

    pub fn count(&self, class: usize, split: usize) -> usize {
        self.counts
            .get(class)
            .and_then(|row| row.get(split))
            .copied()
            .unwrap_or(0)
    }

    pub fn class_total(&self, class: usize) -> usize {
        self.counts.get(class).map(|row| row.iter().sum()).unwrap_or(0)
    }

    pub fn split_total(&self, split: usize) -> usize {
        self.counts.iter().filter_map(|row| row.get(split)).sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == name)
    }

    /// Print the distribution table
    pub fn print(&self) {
        println!("\n{}", "📋 Dataset Distribution:".bold());
        print!("  {:<14}", "");
        for split in &self.splits {
            print!("{:>12}", display_split(split));
        }
        println!("{:>12}", "Total");

        for (c, class) in self.classes.iter().enumerate() {
            print!("  {:<14}", display_class(class));
            for s in 0..self.splits.len() {
                print!("{:>12}", format_number(self.count(c, s)));
            }
            println!("{:>12}", format_number(self.class_total(c)));
        }

        let total = self.total();
        println!("\n  Total Images: {}", format_number(total));
        for (c, class) in self.classes.iter().enumerate() {
            let n = self.class_total(c);
            println!(
                "  Total {}: {} ({:.1}%)",
                display_class(class),
                format_number(n),
                percentage(n, total)
            );
        }
    }
}

/// Human label for a class directory name ("nowildfire" -> "No Wildfire")
pub fn display_class(name: &str) -> String {
    let spaced = match name.strip_prefix("no") {
        Some(rest) if !rest.is_empty() => format!("no {}", rest),
        _ => name.to_string(),
    };
    spaced
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human label for a split directory name
pub fn display_split(name: &str) -> String {
    match name {
        "train" => "Train".to_string(),
        "valid" | "val" => "Validation".to_string(),
        "test" => "Test".to_string(),
        other => display_class(other),
    }
}

/// One split of the dataset with labelled samples
#[derive(Debug, Clone)]
pub struct WildfireDataset {
    pub split: String,
    pub samples: Vec<ImageSample>,
    pub class_names: Vec<String>,
}

impl WildfireDataset {
    /// Scan one split; labels follow the order of `layout.classes`
    pub fn scan(layout: &DatasetLayout, split: &str) -> Result<Self> {
        let split_dir = layout.split_dir(split);
        info!("Loading '{}' split from: {:?}", split, split_dir);

        if !split_dir.is_dir() {
            return Err(WildfireError::PathNotFound(split_dir));
        }

        let mut samples = Vec::new();
        for (label, class_name) in layout.classes.iter().enumerate() {
            let class_dir = layout.class_dir(split, class_name);
            if !class_dir.is_dir() {
                return Err(WildfireError::PathNotFound(class_dir));
            }
            let files = layout.list_images(&class_dir);
            debug!("Class '{}' (label {}): {} images", class_name, label, files.len());
            samples.extend(files.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        info!("Found {} images belonging to {} classes", samples.len(), layout.classes.len());

        Ok(Self {
            split: split.to_string(),
            samples,
            class_names: layout.classes.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Shuffle the samples in place with a given seed
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
    }

    pub fn samples_of_class(&self, class_idx: usize) -> Vec<&ImageSample> {
        self.samples.iter().filter(|s| s.label == class_idx).collect()
    }

    pub fn get_stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            split: self.split.clone(),
            total_samples: self.samples.len(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Sample counts of one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub split: String,
    pub total_samples: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!(
            "\n📊 {} split: {} images",
            display_split(&self.split),
            format_number(self.total_samples)
        );
        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = (percentage(count, self.total_samples) / 100.0 * 40.0) as usize;
            println!("    {}. {:12} {:>7} {}", idx, name, format_number(count), "█".repeat(bar_len));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Write `n` solid-colour PNGs per class for every split
    pub(crate) fn write_tiny_dataset(root: &Path, per_class: &[(usize, [u8; 3])], size: u32) {
        let classes = ["nowildfire", "wildfire"];
        for split in ["train", "valid", "test"] {
            for (class, (n, color)) in classes.iter().zip(per_class) {
                let dir = root.join(split).join(class);
                fs::create_dir_all(&dir).unwrap();
                for i in 0..*n {
                    let shade = (i * 7 % 40) as u8;
                    let img = RgbImage::from_pixel(
                        size,
                        size,
                        Rgb([color[0].saturating_add(shade), color[1], color[2]]),
                    );
                    img.save(dir.join(format!("{:.4},{:.4}_{i}.png", -73.5, 45.6)))
                        .unwrap();
                }
            }
        }
    }

    fn layout_for(root: &Path) -> DatasetLayout {
        let config = DataConfig {
            data_dir: root.to_path_buf(),
            ..DataConfig::default()
        };
        DatasetLayout::from_config(&config)
    }

    #[test]
    fn test_is_image_file_case_insensitive() {
        let exts = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
        assert!(is_image_file(Path::new("a/b.JPG"), &exts));
        assert!(is_image_file(Path::new("a/b.Png"), &exts));
        assert!(!is_image_file(Path::new("a/b.txt"), &exts));
        assert!(!is_image_file(Path::new("a/noext"), &exts));
    }

    #[test]
    fn test_count_images_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("b.JPEG"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let exts = DataConfig::default().extensions;
        assert_eq!(count_images(dir.path(), &exts), 2);
        assert_eq!(count_images(&dir.path().join("missing"), &exts), 0);
    }

    #[test]
    fn test_distribution_totals() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(3, [20, 120, 40]), (2, [200, 60, 20])], 8);
        let dist = ClassDistribution::from_layout(&layout_for(dir.path())).unwrap();

        assert_eq!(dist.count(0, 0), 3);
        assert_eq!(dist.count(1, 2), 2);
        assert_eq!(dist.class_total(0), 9);
        assert_eq!(dist.class_total(1), 6);
        assert_eq!(dist.split_total(1), 5);
        assert_eq!(dist.total(), 15);
        assert_eq!(dist.class_index("wildfire"), Some(1));
    }

    #[test]
    fn test_missing_split_is_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("train")).unwrap();
        let result = ClassDistribution::from_layout(&layout_for(dir.path()));
        assert!(matches!(result, Err(WildfireError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_assigns_fixed_labels() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(2, [20, 120, 40]), (3, [200, 60, 20])], 8);
        let ds = WildfireDataset::scan(&layout_for(dir.path()), "train").unwrap();

        assert_eq!(ds.len(), 5);
        let stats = ds.get_stats();
        assert_eq!(stats.class_counts, vec![2, 3]);
        assert!(ds.samples_of_class(1).iter().all(|s| s.class_name == "wildfire"));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(4, [20, 120, 40]), (4, [200, 60, 20])], 8);
        let layout = layout_for(dir.path());
        let mut a = WildfireDataset::scan(&layout, "train").unwrap();
        let mut b = WildfireDataset::scan(&layout, "train").unwrap();
        a.shuffle(42);
        b.shuffle(42);
        let pa: Vec<_> = a.samples.iter().map(|s| s.path.clone()).collect();
        let pb: Vec<_> = b.samples.iter().map(|s| s.path.clone()).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_class("nowildfire"), "No Wildfire");
        assert_eq!(display_class("wildfire"), "Wildfire");
        assert_eq!(display_split("valid"), "Validation");
    }

    #[test]
    fn test_open_image_error_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"not an image").unwrap();
        match open_image(&path) {
            Err(WildfireError::ImageLoad(p, _)) => assert_eq!(p, path),
            other => panic!("expected ImageLoad error, got {:?}", other.map(|_| ())),
        }
    }
}
