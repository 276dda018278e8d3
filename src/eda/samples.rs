//! Grid of random sample images, one row per class

use std::path::Path;

use colored::Colorize;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::dataset::loader::{open_image, DatasetLayout};
use crate::eda::properties::{class_color, display_order};
use crate::utils::error::{Result, WildfireError};

const GAP: u32 = 8;
const STRIPE: u32 = 12;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

fn hex_rgb(hex: &str) -> Rgb<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    Rgb([channel(0), channel(2), channel(4)])
}

/// Compose `n` random tiles per class into one image
///
/// Rows follow [`display_order`]; each row starts with a stripe in the class
/// colour. Classes with fewer than `n` images leave the remaining tiles blank.
pub fn sample_grid(
    layout: &DatasetLayout,
    split: &str,
    n: usize,
    tile: u32,
    seed: u64,
) -> Result<RgbImage> {
    if tile == 0 {
        return Err(WildfireError::InvalidInput("tile size must be greater than 0".to_string()));
    }
    let classes = display_order(&layout.classes);
    let (width, height) = canvas_size(n.max(1), classes.len(), tile).ok_or_else(|| {
        WildfireError::InvalidInput(format!(
            "sample grid of {} x {} tiles of {tile}px is too large",
            classes.len(),
            n
        ))
    })?;
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for (row, class) in classes.iter().enumerate() {
        let top = GAP + row as u32 * (tile + GAP);
        let stripe = RgbImage::from_pixel(STRIPE, tile, hex_rgb(class_color(&layout.classes, class)));
        imageops::replace(&mut canvas, &stripe, 0, top as i64);

        let files = layout.list_images(&layout.class_dir(split, class));
        if files.len() < n {
            warn!("Only {} images available for '{}', wanted {}", files.len(), class, n);
        }
        for (col, path) in files.choose_multiple(&mut rng, n).enumerate() {
            let img = match open_image(path) {
                Ok(img) => img,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let thumb = img.resize_to_fill(tile, tile, FilterType::Triangle).to_rgb8();
            let left = STRIPE + GAP + col as u32 * (tile + GAP);
            imageops::replace(&mut canvas, &thumb, left as i64, top as i64);
        }
    }
    Ok(canvas)
}

/// Pixel size of a grid with `cols` tiles per row and `rows` rows
fn canvas_size(cols: usize, rows: usize, tile: u32) -> Option<(u32, u32)> {
    let step = tile.checked_add(GAP)?;
    let width = u32::try_from(cols)
        .ok()?
        .checked_mul(step)?
        .checked_add(STRIPE + GAP)?;
    let height = u32::try_from(rows).ok()?.checked_mul(step)?.checked_add(GAP)?;
    Some((width, height))
}

/// Write `sample_images.png`
pub fn visualize_sample_images(
    layout: &DatasetLayout,
    split: &str,
    n: usize,
    tile: u32,
    seed: u64,
    output_path: &Path,
) -> Result<()> {
    println!(
        "\n{}",
        format!("🖼️ Visualizing {} sample images per class...", n).cyan()
    );
    sample_grid(layout, split, n, tile, seed)?.save(output_path)?;
    println!("✅ Saved: sample_images.png");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::dataset::loader::tests::write_tiny_dataset;
    use tempfile::TempDir;

    #[test]
    fn test_hex_rgb() {
        assert_eq!(hex_rgb("#e63946"), Rgb([0xe6, 0x39, 0x46]));
        assert_eq!(hex_rgb("zz"), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_grid_layout_and_row_order() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(3, [0, 200, 0]), (3, [200, 0, 0])], 12);
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });

        let tile = 10;
        let grid = sample_grid(&layout, "train", 2, tile, 42).unwrap();
        assert_eq!(grid.width(), STRIPE + GAP + 2 * (tile + GAP));
        assert_eq!(grid.height(), GAP + 2 * (tile + GAP));

        // wildfire (red) on the first row, nowildfire (green) below
        let first = grid.get_pixel(STRIPE + GAP + 2, GAP + 2);
        let second = grid.get_pixel(STRIPE + GAP + 2, 2 * GAP + tile + 2);
        assert!(first[0] > 150 && first[1] < 50);
        assert!(second[1] > 150 && second[0] < 50);
    }

    #[test]
    fn test_short_class_leaves_blank_tiles() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(1, [0, 200, 0]), (1, [200, 0, 0])], 12);
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });

        let tile = 10;
        let grid = sample_grid(&layout, "train", 3, tile, 1).unwrap();
        let last_tile = grid.get_pixel(STRIPE + GAP + 2 * (tile + GAP) + 2, GAP + 2);
        assert_eq!(*last_tile, BACKGROUND);
    }

    #[test]
    fn test_degenerate_grid_sizes_are_rejected() {
        let dir = TempDir::new().unwrap();
        write_tiny_dataset(dir.path(), &[(1, [0, 200, 0]), (1, [200, 0, 0])], 12);
        let layout = DatasetLayout::from_config(&DataConfig {
            data_dir: dir.path().to_path_buf(),
            ..DataConfig::default()
        });

        assert!(matches!(
            sample_grid(&layout, "train", 2, 0, 42),
            Err(WildfireError::InvalidInput(_))
        ));
        assert!(sample_grid(&layout, "train", usize::MAX, 10, 42).is_err());
        assert!(canvas_size(2, 2, u32::MAX).is_none());
        assert_eq!(canvas_size(2, 2, 10), Some((STRIPE + GAP + 2 * (10 + GAP), GAP + 2 * (10 + GAP))));
    }
}
