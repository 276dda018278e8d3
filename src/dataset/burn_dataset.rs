//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait and `Batcher` for the wildfire images.
//!
//! - `WildfireBatcher`: rescale only (validation, test, inference)
//! - `AugmentingBatcher`: seeded on-the-fly augmentation (training)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::warn;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::loader::{open_image, ImageSample};
use crate::utils::error::Result;

/// A decoded image resized to the model input size
#[derive(Clone)]
pub struct WildfireItem {
    pub image: RgbImage,
    /// 0 = nowildfire, 1 = wildfire
    pub label: usize,
    pub path: PathBuf,
}

impl WildfireItem {
    /// Decode and resize an image from disk
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = open_image(path)?;
        Ok(Self {
            image: resize_rgb(img, image_size as u32),
            label,
            path: path.to_path_buf(),
        })
    }
}

impl std::fmt::Debug for WildfireItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WildfireItem")
            .field("label", &self.label)
            .field("path", &self.path)
            .field(
                "image_size",
                &format!("{}x{}", self.image.width(), self.image.height()),
            )
            .finish()
    }
}

fn resize_rgb(img: DynamicImage, size: u32) -> RgbImage {
    if img.width() == size && img.height() == size {
        img.to_rgb8()
    } else {
        img.resize_exact(size, size, FilterType::Triangle).to_rgb8()
    }
}

/// Wildfire images implementing Burn's Dataset trait
///
/// Either every image is decoded up front (`new_cached`) or images are
/// decoded on each access (`new`).
#[derive(Clone)]
pub struct WildfireImageDataset {
    samples: Vec<(PathBuf, usize)>,
    image_size: usize,
    cached_items: Option<Arc<Vec<WildfireItem>>>,
}

impl std::fmt::Debug for WildfireImageDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WildfireImageDataset")
            .field("len", &self.samples.len())
            .field("image_size", &self.image_size)
            .field("cached", &self.cached_items.is_some())
            .finish()
    }
}

impl WildfireImageDataset {
    /// Lazy dataset, images are decoded in `get`
    pub fn new(samples: &[ImageSample], image_size: usize) -> Self {
        Self {
            samples: samples.iter().map(|s| (s.path.clone(), s.label)).collect(),
            image_size,
            cached_items: None,
        }
    }

    /// Decode and resize every image in parallel, skipping unreadable files
    pub fn new_cached(samples: &[ImageSample], image_size: usize) -> Self {
        let total = samples.len();
        println!("  📦 Pre-loading {} images into memory (parallel)...", total);

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);
        let items: Vec<WildfireItem> = samples
            .par_iter()
            .filter_map(|s| {
                let result = match WildfireItem::from_path(&s.path, s.label, image_size) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping unreadable image: {}", e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    pb.set_position(count as u64);
                }
                result
            })
            .collect();

        pb.finish_with_message(format!("Loaded {} images", items.len()));

        let samples = items.iter().map(|i| (i.path.clone(), i.label)).collect();
        Self {
            samples,
            image_size,
            cached_items: Some(Arc::new(items)),
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Label of every sample, in index order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|(_, l)| *l).collect()
    }

    /// Samples per class (two classes)
    pub fn class_distribution(&self) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for (_, label) in &self.samples {
            if *label < 2 {
                counts[*label] += 1;
            }
        }
        counts
    }
}

impl Dataset<WildfireItem> for WildfireImageDataset {
    fn get(&self, index: usize) -> Option<WildfireItem> {
        if let Some(cached) = &self.cached_items {
            return cached.get(index).cloned();
        }
        let (path, label) = self.samples.get(index)?;
        match WildfireItem::from_path(path, *label, self.image_size) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable image: {}", e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of images with binary targets
#[derive(Clone, Debug)]
pub struct WildfireBatch<B: Backend> {
    /// [batch_size, 3, height, width], values in [0, 1]
    pub images: Tensor<B, 4>,
    /// [batch_size], 0 or 1
    pub targets: Tensor<B, 1, Int>,
}

fn build_batch<B: Backend>(
    pixels: Vec<f32>,
    labels: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> WildfireBatch<B> {
    let batch_size = labels.len();
    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(pixels, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [batch_size]), device);
    WildfireBatch { images, targets }
}

/// Rescale-only batcher
#[derive(Clone, Debug)]
pub struct WildfireBatcher {
    augmenter: Augmenter,
    image_size: usize,
}

impl WildfireBatcher {
    pub fn new(image_size: usize) -> Self {
        Self {
            augmenter: Augmenter::no_augmentation(image_size as u32),
            image_size,
        }
    }
}

impl<B: Backend> Batcher<B, WildfireItem, WildfireBatch<B>> for WildfireBatcher {
    fn batch(&self, items: Vec<WildfireItem>, device: &B::Device) -> WildfireBatch<B> {
        let mut pixels = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut labels = Vec::with_capacity(items.len());
        for item in items {
            pixels.extend(
                self.augmenter
                    .preprocess(DynamicImage::ImageRgb8(item.image), None),
            );
            labels.push(item.label as i64);
        }
        build_batch(pixels, labels, self.image_size, device)
    }
}

/// Batcher that applies random augmentation to every image
///
/// Each call to `batch` derives its RNG from the base seed and a call
/// counter, so a run is reproducible for a fixed batch order.
pub struct AugmentingBatcher {
    augmenter: Augmenter,
    image_size: usize,
    seed: u64,
    calls: AtomicU64,
}

impl Clone for AugmentingBatcher {
    fn clone(&self) -> Self {
        Self {
            augmenter: self.augmenter.clone(),
            image_size: self.image_size,
            seed: self.seed,
            calls: AtomicU64::new(self.calls.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for AugmentingBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentingBatcher")
            .field("image_size", &self.image_size)
            .field("seed", &self.seed)
            .finish()
    }
}

impl AugmentingBatcher {
    pub fn new(config: AugmentationConfig, image_size: usize, seed: u64) -> Self {
        Self {
            augmenter: Augmenter::new(config, image_size as u32),
            image_size,
            seed,
            calls: AtomicU64::new(0),
        }
    }
}

impl<B: Backend> Batcher<B, WildfireItem, WildfireBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<WildfireItem>, device: &B::Device) -> WildfireBatch<B> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(call));

        let mut pixels = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut labels = Vec::with_capacity(items.len());
        for item in items {
            pixels.extend(
                self.augmenter
                    .preprocess(DynamicImage::ImageRgb8(item.image), Some(&mut rng)),
            );
            labels.push(item.label as i64);
        }
        build_batch(pixels, labels, self.image_size, device)
    }
}

/// Training batches per epoch: full batches only, at least one
pub fn steps_per_epoch(num_samples: usize, batch_size: usize) -> usize {
    (num_samples / batch_size.max(1)).max(1)
}

/// Index batches for one pass over `num_samples` items
///
/// With `shuffle_seed` the order is shuffled and only `steps_per_epoch`
/// full batches are produced. Without it every sample is visited in order,
/// the last batch possibly short.
pub fn epoch_batches(
    num_samples: usize,
    batch_size: usize,
    shuffle_seed: Option<u64>,
) -> Vec<Vec<usize>> {
    let batch_size = batch_size.max(1);
    let mut indices: Vec<usize> = (0..num_samples).collect();

    match shuffle_seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
            let steps = steps_per_epoch(num_samples, batch_size);
            indices
                .chunks(batch_size)
                .take(steps)
                .map(|c| c.to_vec())
                .collect()
        }
        None => indices.chunks(batch_size).map(|c| c.to_vec()).collect(),
    }
}

/// Fetch the items of one index batch, dropping unreadable ones
pub fn collect_items<D: Dataset<WildfireItem>>(dataset: &D, indices: &[usize]) -> Vec<WildfireItem> {
    indices.iter().filter_map(|&i| dataset.get(i)).collect()
}
