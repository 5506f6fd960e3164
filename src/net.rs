use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::module::{avg_pool2d, max_pool2d};
use burn::tensor::Tensor;

/// Pooling flavor used by a `Layer::Pooling` entry.
///
/// Max pooling is what the classifier networks ship with; average pooling
/// tends to produce smoother gradients for style transfer and can be
/// substituted in via `SessionBuilder::average_pooling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolKind {
    Max,
    Average,
}

/// One entry of an ordered feature-extraction stack.
///
/// The closed set of variants is decided once when the stack is built, so
/// walking it during assembly is a plain `match` instead of downcasting.
pub enum Layer<B: Backend> {
    /// A convolution with its (frozen) filter weights
    Convolution(Conv2d<B>),
    /// A ReLU activation; these delimit the "depth units" probes attach to
    Activation,
    /// A spatial downsampling step with a square window
    Pooling { kind: PoolKind, window: usize },
}

impl<B: Backend> Layer<B> {
    /// A 3x3 same-padded convolution, the only kind the VGG stack uses
    pub fn conv3x3(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self::Convolution(
            Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
        )
    }

    pub fn activation() -> Self {
        Self::Activation
    }

    /// A 2x2 stride-2 max pool
    pub fn max_pool() -> Self {
        Self::Pooling {
            kind: PoolKind::Max,
            window: 2,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Convolution(conv) => conv.forward(x),
            Self::Activation => relu(x),
            Self::Pooling { kind, window } => {
                let w = *window;
                match kind {
                    PoolKind::Max => max_pool2d(x, [w, w], [w, w], [0, 0], [1, 1]),
                    PoolKind::Average => avg_pool2d(x, [w, w], [w, w], [0, 0], true),
                }
            }
        }
    }
}

/// Default style probe depths: the first activation of each VGG block
/// (conv1_1 through conv5_1 in the usual naming).
pub const DEFAULT_STYLE_DEPTHS: [usize; 5] = [1, 3, 7, 11, 15];

/// Default content probe depth: the second activation of block 4 (conv4_2).
pub const DEFAULT_CONTENT_DEPTHS: [usize; 1] = [12];

/// Builds the convolutional prefix of VGG-19 as an ordered layer stack:
/// five blocks of 3x3 same-padded convolutions (2, 2, 4, 4 and 4 of them,
/// at 64, 128, 256, 512 and 512 channels), each convolution followed by an
/// activation and each block closed by a 2x2 max pool.
///
/// Filter weights are randomly initialized; the `Conv2d` parameters are
/// public, so callers that want the published classifier weights can load
/// them into the returned convolutions, or pass an entirely custom stack to
/// `SessionBuilder::layers`.
pub fn vgg19_features<B: Backend>(device: &B::Device) -> Vec<Layer<B>> {
    const BLOCKS: [(usize, usize); 5] = [(2, 64), (2, 128), (4, 256), (4, 512), (4, 512)];

    let mut layers = Vec::with_capacity(16 * 2 + 5);
    let mut in_channels = 3;

    for &(convs, channels) in &BLOCKS {
        for _ in 0..convs {
            layers.push(Layer::conv3x3(in_channels, channels, device));
            layers.push(Layer::activation());
            in_channels = channels;
        }
        layers.push(Layer::max_pool());
    }

    layers
}
