//! Data Augmentation Module
//!
//! On-the-fly geometric augmentation for satellite tiles. Rotation, shift,
//! shear and zoom are combined into one affine transform and applied with
//! a single inverse-mapping pass; flips follow.
//!
//! # Augmentation Strategy
//!
//! - **Training**: random transform per image
//! - **Validation/Test/Inference**: rescale only

use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Pixel scale applied to every image before it reaches the model
pub const RESCALE: f32 = 1.0 / 255.0;

/// How pixels sampled outside the source image are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Repeat the closest edge pixel
    Nearest,
    /// Black
    Constant,
    /// Mirror at the border
    Reflect,
    /// Tile the image
    Wrap,
}

/// Configuration for data augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees, sampled from ±range
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of width
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of height
    pub height_shift_range: f32,
    /// Maximum shear angle in degrees
    pub shear_range: f32,
    /// Per-axis zoom sampled from [1 - range, 1 + range]
    pub zoom_range: f32,
    /// Flip left-right with probability 0.5
    pub horizontal_flip: bool,
    /// Flip top-bottom with probability 0.5
    pub vertical_flip: bool,
    pub fill_mode: FillMode,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
            shear_range: 0.15,
            zoom_range: 0.2,
            horizontal_flip: true,
            vertical_flip: true,
            fill_mode: FillMode::Nearest,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
            vertical_flip: false,
            fill_mode: FillMode::Nearest,
        }
    }

    /// True when no geometric transform can be sampled
    pub fn is_identity(&self) -> bool {
        self.rotation_range == 0.0
            && self.width_shift_range == 0.0
            && self.height_shift_range == 0.0
            && self.shear_range == 0.0
            && self.zoom_range == 0.0
            && !self.horizontal_flip
            && !self.vertical_flip
    }
}

/// One sampled set of transform parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub theta_deg: f32,
    /// Shift in pixels
    pub tx: f32,
    pub ty: f32,
    pub shear_deg: f32,
    pub zx: f32,
    pub zy: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl TransformParams {
    pub fn identity() -> Self {
        Self {
            theta_deg: 0.0,
            tx: 0.0,
            ty: 0.0,
            shear_deg: 0.0,
            zx: 1.0,
            zy: 1.0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    fn is_affine_identity(&self) -> bool {
        self.theta_deg == 0.0
            && self.tx == 0.0
            && self.ty == 0.0
            && self.shear_deg == 0.0
            && self.zx == 1.0
            && self.zy == 1.0
    }

    /// 2x2 matrix mapping output offsets (from the centre) to source offsets
    ///
    /// rotation * shear * zoom
    fn matrix(&self) -> [[f32; 2]; 2] {
        let t = self.theta_deg.to_radians();
        let s = self.shear_deg.to_radians();
        let (cos_t, sin_t) = (t.cos(), t.sin());
        let rotation = [[cos_t, -sin_t], [sin_t, cos_t]];
        let shear = [[1.0, -s.sin()], [0.0, s.cos()]];
        let zoom = [[self.zx, 0.0], [0.0, self.zy]];
        mat_mul(mat_mul(rotation, shear), zoom)
    }
}

fn mat_mul(a: [[f32; 2]; 2], b: [[f32; 2]; 2]) -> [[f32; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Image augmenter that applies random transformations
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentationConfig,
    image_size: u32,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig, image_size: u32) -> Self {
        Self { config, image_size }
    }

    /// Rescale-only augmenter (for validation/inference)
    pub fn no_augmentation(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(), image_size)
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Draw transform parameters for an image of `width` x `height`
    pub fn sample_params(&self, width: u32, height: u32, rng: &mut ChaCha8Rng) -> TransformParams {
        let c = &self.config;
        let symmetric = |rng: &mut ChaCha8Rng, range: f32| {
            if range > 0.0 {
                rng.gen_range(-range..=range)
            } else {
                0.0
            }
        };

        let theta_deg = symmetric(rng, c.rotation_range);
        let tx = symmetric(rng, c.width_shift_range) * width as f32;
        let ty = symmetric(rng, c.height_shift_range) * height as f32;
        let shear_deg = symmetric(rng, c.shear_range);
        let (zx, zy) = if c.zoom_range > 0.0 {
            let lo = 1.0 - c.zoom_range;
            let hi = 1.0 + c.zoom_range;
            (rng.gen_range(lo..=hi), rng.gen_range(lo..=hi))
        } else {
            (1.0, 1.0)
        };
        let flip_horizontal = c.horizontal_flip && rng.gen::<f32>() < 0.5;
        let flip_vertical = c.vertical_flip && rng.gen::<f32>() < 0.5;

        TransformParams {
            theta_deg,
            tx,
            ty,
            shear_deg,
            zx,
            zy,
            flip_horizontal,
            flip_vertical,
        }
    }

    /// Apply a random transform drawn from the configuration
    pub fn augment(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        if self.config.is_identity() {
            return img;
        }
        let rgb = img.to_rgb8();
        let params = self.sample_params(rgb.width(), rgb.height(), rng);
        DynamicImage::ImageRgb8(self.apply(&rgb, &params))
    }

    /// Apply fixed transform parameters
    pub fn apply(&self, img: &RgbImage, params: &TransformParams) -> RgbImage {
        let mut output = if params.is_affine_identity() {
            img.clone()
        } else {
            self.warp(img, params)
        };

        if params.flip_horizontal {
            image::imageops::flip_horizontal_in_place(&mut output);
        }
        if params.flip_vertical {
            image::imageops::flip_vertical_in_place(&mut output);
        }
        output
    }

    /// Inverse-map every output pixel through the affine transform
    fn warp(&self, img: &RgbImage, params: &TransformParams) -> RgbImage {
        let (width, height) = img.dimensions();
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;
        let m = params.matrix();

        let mut output = ImageBuffer::new(width, height);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let src_x = cx + m[0][0] * dx + m[0][1] * dy + params.tx;
            let src_y = cy + m[1][0] * dx + m[1][1] * dy + params.ty;
            *pixel = self.bilinear_sample(img, src_x, src_y);
        }
        output
    }

    /// Bilinear interpolation with out-of-bounds handled by the fill mode
    fn bilinear_sample(&self, img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as i64, height as i64);

        if self.config.fill_mode == FillMode::Constant
            && (x < -0.5 || y < -0.5 || x > w as f32 - 0.5 || y > h as f32 - 0.5)
        {
            return Rgb([0, 0, 0]);
        }

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let fetch = |px: i64, py: i64| {
            let sx = self.resolve(px, w);
            let sy = self.resolve(py, h);
            img.get_pixel(sx, sy)
        };

        let p00 = fetch(x0, y0);
        let p10 = fetch(x0 + 1, y0);
        let p01 = fetch(x0, y0 + 1);
        let p11 = fetch(x0 + 1, y0 + 1);

        let mut result = [0u8; 3];
        for c in 0..3 {
            let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                + p10[c] as f32 * fx * (1.0 - fy)
                + p01[c] as f32 * (1.0 - fx) * fy
                + p11[c] as f32 * fx * fy;
            result[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(result)
    }

    /// Map a possibly out-of-range coordinate into `[0, len)`
    fn resolve(&self, i: i64, len: i64) -> u32 {
        let idx = match self.config.fill_mode {
            FillMode::Nearest | FillMode::Constant => i.clamp(0, len - 1),
            FillMode::Wrap => i.rem_euclid(len),
            FillMode::Reflect => {
                if len == 1 {
                    0
                } else {
                    let period = 2 * len;
                    let m = i.rem_euclid(period);
                    if m < len {
                        m
                    } else {
                        period - 1 - m
                    }
                }
            }
        };
        idx as u32
    }

    /// Resize image to the model input size (always applied, not random)
    pub fn resize(&self, img: DynamicImage) -> DynamicImage {
        if img.width() == self.image_size && img.height() == self.image_size {
            return img;
        }
        img.resize_exact(self.image_size, self.image_size, FilterType::Triangle)
    }

    /// CHW float data rescaled to [0, 1]
    pub fn to_tensor_data(&self, img: &DynamicImage) -> Vec<f32> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    data.push(rgb.get_pixel(x, y)[c] as f32 * RESCALE);
                }
            }
        }
        data
    }

    /// Full preprocessing pipeline: resize, augment (optional), rescale to CHW
    pub fn preprocess(&self, img: DynamicImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let mut result = self.resize(img);
        if let Some(rng) = rng {
            result = self.augment(result, rng);
        }
        self.to_tensor_data(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_image() -> DynamicImage {
        let mut img = ImageBuffer::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 4) as u8, (y * 4) as u8, 128]);
        }
        DynamicImage::ImageRgb8(img)
    }

    fn augmenter(config: AugmentationConfig) -> Augmenter {
        Augmenter::new(config, 64)
    }

    #[test]
    fn test_default_config() {
        let config = AugmentationConfig::default();
        assert_eq!(config.rotation_range, 20.0);
        assert_eq!(config.width_shift_range, 0.2);
        assert_eq!(config.shear_range, 0.15);
        assert_eq!(config.fill_mode, FillMode::Nearest);
        assert!(!config.is_identity());
        assert!(AugmentationConfig::none().is_identity());
    }

    #[test]
    fn test_sampled_params_within_ranges() {
        let aug = augmenter(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let p = aug.sample_params(100, 50, &mut rng);
            assert!(p.theta_deg.abs() <= 20.0);
            assert!(p.tx.abs() <= 20.0 + 1e-4);
            assert!(p.ty.abs() <= 10.0 + 1e-4);
            assert!(p.shear_deg.abs() <= 0.15);
            assert!((0.8..=1.2).contains(&p.zx));
            assert!((0.8..=1.2).contains(&p.zy));
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let aug = augmenter(AugmentationConfig::default());
        let a = aug.augment(create_test_image(), &mut ChaCha8Rng::seed_from_u64(7));
        let b = aug.augment(create_test_image(), &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.to_rgb8().into_raw(), b.to_rgb8().into_raw());
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let aug = augmenter(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let result = aug.augment(create_test_image(), &mut rng);
        assert_eq!((result.width(), result.height()), (64, 64));
    }

    #[test]
    fn test_none_config_is_identity() {
        let aug = augmenter(AugmentationConfig::none());
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = aug.augment(img.clone(), &mut rng);
        assert_eq!(out.to_rgb8().into_raw(), img.to_rgb8().into_raw());
    }

    #[test]
    fn test_flip_horizontal() {
        let aug = augmenter(AugmentationConfig::default());
        let img = create_test_image().to_rgb8();
        let params = TransformParams {
            flip_horizontal: true,
            ..TransformParams::identity()
        };
        let out = aug.apply(&img, &params);
        assert_eq!(out.get_pixel(0, 10), img.get_pixel(63, 10));
    }

    #[test]
    fn test_nearest_fill_has_no_black_border() {
        let mut img = RgbImage::new(32, 32);
        for p in img.pixels_mut() {
            *p = Rgb([200, 100, 50]);
        }
        let aug = Augmenter::new(AugmentationConfig::default(), 32);
        let params = TransformParams {
            theta_deg: 20.0,
            tx: 6.0,
            ty: -6.0,
            ..TransformParams::identity()
        };
        let out = aug.apply(&img, &params);
        assert!(out.pixels().all(|p| *p == Rgb([200, 100, 50])));
    }

    #[test]
    fn test_constant_fill_pads_black() {
        let mut img = RgbImage::new(32, 32);
        for p in img.pixels_mut() {
            *p = Rgb([200, 100, 50]);
        }
        let config = AugmentationConfig {
            fill_mode: FillMode::Constant,
            ..AugmentationConfig::default()
        };
        let aug = Augmenter::new(config, 32);
        let params = TransformParams {
            tx: 16.0,
            ..TransformParams::identity()
        };
        let out = aug.apply(&img, &params);
        assert_eq!(*out.get_pixel(31, 5), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(0, 5), Rgb([200, 100, 50]));
    }

    #[test]
    fn test_shift_moves_content() {
        let img = create_test_image().to_rgb8();
        let aug = augmenter(AugmentationConfig::default());
        let params = TransformParams {
            tx: 4.0,
            ..TransformParams::identity()
        };
        let out = aug.apply(&img, &params);
        // Output pixel x samples source x + 4
        assert_eq!(out.get_pixel(10, 20), img.get_pixel(14, 20));
    }

    #[test]
    fn test_resolve_modes() {
        let mut aug = augmenter(AugmentationConfig::default());
        assert_eq!(aug.resolve(-3, 10), 0);
        assert_eq!(aug.resolve(12, 10), 9);

        aug.config.fill_mode = FillMode::Wrap;
        assert_eq!(aug.resolve(-1, 10), 9);
        assert_eq!(aug.resolve(10, 10), 0);

        aug.config.fill_mode = FillMode::Reflect;
        assert_eq!(aug.resolve(-1, 10), 0);
        assert_eq!(aug.resolve(10, 10), 9);
        assert_eq!(aug.resolve(11, 10), 8);
    }

    #[test]
    fn test_resize() {
        let aug = Augmenter::no_augmentation(32);
        let result = aug.resize(create_test_image());
        assert_eq!((result.width(), result.height()), (32, 32));
    }

    #[test]
    fn test_to_tensor_data_is_chw_rescaled() {
        let aug = Augmenter::no_augmentation(64);
        let data = aug.to_tensor_data(&create_test_image());

        assert_eq!(data.len(), 3 * 64 * 64);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
        // Blue channel plane is constant 128
        assert!((data[2 * 64 * 64] - 128.0 / 255.0).abs() < 1e-6);
        // Red at (x=1, y=0) is 4
        assert!((data[1] - 4.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_with_augmentation() {
        let aug = Augmenter::new(AugmentationConfig::default(), 32);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let data = aug.preprocess(create_test_image(), Some(&mut rng));
        assert_eq!(data.len(), 3 * 32 * 32);
    }

    #[test]
    fn test_fill_mode_serde() {
        let json = serde_json::to_string(&FillMode::Nearest).unwrap();
        assert_eq!(json, "\"nearest\"");
    }
}
