//! CNN Model Architecture for Wildfire Detection
//!
//! A plain sequential network: stacked conv blocks that halve the spatial
//! size, a flattened feature vector, two dropout-regularised dense layers
//! and a single logit for the wildfire class.

use std::fmt;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::config::ModelConfig;

/// Configuration for the WildfireCnn model
#[derive(Config, Debug)]
pub struct WildfireCnnConfig {
    /// Filters of each conv block
    pub conv_filters: Vec<usize>,

    /// Hidden dense layer widths
    pub dense_units: Vec<usize>,

    /// Input image size (square)
    #[config(default = "350")]
    pub image_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Dropout after every hidden dense layer
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl WildfireCnnConfig {
    /// Four conv blocks (32-256 filters) and dense 512/256 at 350x350
    pub fn standard() -> Self {
        Self::new(vec![32, 64, 128, 256], vec![512, 256])
    }

    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self::new(config.conv_filters.clone(), config.dense_units.clone())
            .with_image_size(config.image_size)
            .with_in_channels(config.in_channels)
            .with_dropout(config.dropout)
    }

    /// Spatial side after all pooling layers
    pub fn final_spatial_size(&self) -> usize {
        self.conv_filters
            .iter()
            .fold(self.image_size, |size, _| size / 2)
    }

    /// Length of the flattened feature vector fed to the first dense layer
    pub fn flattened_features(&self) -> usize {
        let side = self.final_spatial_size();
        let channels = self.conv_filters.last().copied().unwrap_or(self.in_channels);
        channels * side * side
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> WildfireCnn<B> {
        WildfireCnn::new(self, device)
    }
}

/// Conv2d (3x3, same) -> ReLU -> BatchNorm -> MaxPool 2x2
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub bn: BatchNorm<B, 2>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            bn: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        let x = self.bn.forward(x);
        self.pool.forward(x)
    }
}

/// Wildfire binary classifier
///
/// Architecture (defaults):
/// - 4 conv blocks: 3 -> 32 -> 64 -> 128 -> 256, 350 -> 175 -> 87 -> 43 -> 21
/// - Flatten to 256 * 21 * 21 features
/// - Dense 512 + ReLU + Dropout, Dense 256 + ReLU + Dropout
/// - Dense 1 (logit of the wildfire class)
#[derive(Module, Debug)]
pub struct WildfireCnn<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub dense: Vec<Linear<B>>,
    pub dropout: Dropout,
    pub head: Linear<B>,
    relu: Relu,
    flattened: usize,
}

impl<B: Backend> WildfireCnn<B> {
    pub fn new(config: &WildfireCnnConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_filters.len());
        let mut channels = config.in_channels;
        for &filters in &config.conv_filters {
            blocks.push(ConvBlock::new(channels, filters, device));
            channels = filters;
        }

        let flattened = config.flattened_features();
        let mut dense = Vec::with_capacity(config.dense_units.len());
        let mut width = flattened;
        for &units in &config.dense_units {
            dense.push(LinearConfig::new(width, units).init(device));
            width = units;
        }

        Self {
            blocks,
            dense,
            dropout: DropoutConfig::new(config.dropout).init(),
            head: LinearConfig::new(width, 1).init(device),
            relu: Relu::new(),
            flattened,
        }
    }

    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width], values in [0, 1]
    ///
    /// # Returns
    /// * Logits of shape [batch_size, 1]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }

        let [batch_size, channels, height, width] = x.dims();
        let mut x = x.reshape([batch_size, channels * height * width]);

        for layer in &self.dense {
            x = layer.forward(x);
            x = self.relu.forward(x);
            x = self.dropout.forward(x);
        }

        self.head.forward(x)
    }

    /// Wildfire probability per image, shape [batch_size]
    pub fn forward_probability(&self, x: Tensor<B, 4>) -> Tensor<B, 1> {
        let logits = self.forward(x);
        let [batch_size, _] = logits.dims();
        sigmoid(logits).reshape([batch_size])
    }

    pub fn flattened_features(&self) -> usize {
        self.flattened
    }
}

/// One row of the layer table
#[derive(Debug, Clone)]
pub struct LayerSummary {
    pub name: String,
    pub output_shape: String,
    pub params: usize,
}

/// Layer-by-layer description of a model
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub layers: Vec<LayerSummary>,
    pub total_params: usize,
}

impl ModelSummary {
    pub fn of<B: Backend>(model: &WildfireCnn<B>, config: &WildfireCnnConfig) -> Self {
        let mut layers = Vec::new();
        let mut side = config.image_size;

        let mut push = |name: String, shape: String, params: usize| {
            layers.push(LayerSummary {
                name,
                output_shape: shape,
                params,
            });
        };

        for (i, (block, &filters)) in model.blocks.iter().zip(&config.conv_filters).enumerate() {
            let n = i + 1;
            let shape = format!("({side}, {side}, {filters})");
            push(format!("conv2d_{n} (Conv2D)"), shape.clone(), block.conv.num_params());
            push(format!("batch_normalization_{n}"), shape, block.bn.num_params());
            side /= 2;
            push(
                format!("max_pooling2d_{n}"),
                format!("({side}, {side}, {filters})"),
                0,
            );
        }

        push("flatten".to_string(), format!("({})", model.flattened), 0);

        for (i, layer) in model.dense.iter().enumerate() {
            let units = config.dense_units[i];
            push(format!("dense_{} (Dense)", i + 1), format!("({units})"), layer.num_params());
            push(format!("dropout_{}", i + 1), format!("({units})"), 0);
        }
        push("output (Dense, sigmoid)".to_string(), "(1)".to_string(), model.head.num_params());

        Self {
            layers,
            total_params: model.num_params(),
        }
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "─".repeat(72);
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<34} {:<22} {:>14}", "Layer", "Output Shape", "Param #")?;
        writeln!(f, "{rule}")?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<34} {:<22} {:>14}",
                layer.name,
                layer.output_shape,
                crate::utils::format_number(layer.params)
            )?;
        }
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Total params: {}",
            crate::utils::format_number(self.total_params)
        )?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> WildfireCnnConfig {
        WildfireCnnConfig::new(vec![4, 8], vec![16, 8]).with_image_size(32)
    }

    #[test]
    fn test_standard_flattened_features() {
        let config = WildfireCnnConfig::standard();
        assert_eq!(config.final_spatial_size(), 21);
        assert_eq!(config.flattened_features(), 256 * 21 * 21);
    }

    #[test]
    fn test_from_model_config() {
        let config = WildfireCnnConfig::from_model_config(&ModelConfig::default());
        assert_eq!(config.image_size, 350);
        assert_eq!(config.conv_filters, vec![32, 64, 128, 256]);
        assert_eq!(config.dense_units, vec![512, 256]);
        assert_eq!(config.dropout, 0.5);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let config = small_config();
        let model = config.init::<TestBackend>(&device);
        assert_eq!(model.flattened_features(), 8 * 8 * 8);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 1]);
    }

    #[test]
    fn test_probability_range() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([3, 3, 32, 32], &device);
        let probs: Vec<f32> = model
            .forward_probability(input)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(probs.len(), 3);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_odd_image_size_floors() {
        let config = WildfireCnnConfig::new(vec![4, 4, 4], vec![8]).with_image_size(45);
        // 45 -> 22 -> 11 -> 5
        assert_eq!(config.flattened_features(), 4 * 5 * 5);

        let device = Default::default();
        let model = config.init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 45, 45], &device);
        assert_eq!(model.forward(input).dims(), [1, 1]);
    }

    #[test]
    fn test_summary_totals() {
        let device = Default::default();
        let config = small_config();
        let model = config.init::<TestBackend>(&device);
        let summary = ModelSummary::of(&model, &config);

        assert_eq!(summary.total_params, model.num_params());
        let listed: usize = summary.layers.iter().map(|l| l.params).sum();
        assert_eq!(listed, summary.total_params);
        // conv1: 3*3*3*4 + 4
        assert_eq!(summary.layers[0].params, 112);
        assert!(summary.to_string().contains("Total params"));
    }
}
