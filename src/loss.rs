use burn::tensor::{backend::Backend, Tensor};

/// Which kind of discrepancy a probe measures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeKind {
    Content,
    Style,
}

/// Computes the gram (correlation) matrix of a `[1, K, H, W]` feature map.
///
/// Each channel is flattened into a vector and the matrix of pairwise inner
/// products is taken, divided by the total element count so that deep, small
/// feature maps weigh the same as shallow, large ones. The result is `K x K`
/// and symmetric, and its shape does not depend on `H` or `W`.
pub fn gram_matrix<B: Backend>(features: &Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, channels, height, width] = features.dims();
    let flat = features
        .clone()
        .reshape([batch * channels, height * width]);
    let scale = (batch * channels * height * width) as f32;

    flat.clone().matmul(flat.transpose()).div_scalar(scale)
}

/// A transparent tap comparing an activation against a frozen target
/// feature map.
///
/// The probe never alters the tensor flowing past it; `evaluate` only reads
/// the activation and reports the weighted mean squared difference.
pub struct ContentProbe<B: Backend> {
    pub(crate) depth: usize,
    weight: f32,
    target: Tensor<B, 4>,
}

impl<B: Backend> ContentProbe<B> {
    /// Freezes `activation` as the target this probe will forever compare
    /// against.
    pub(crate) fn new(depth: usize, weight: f32, activation: Tensor<B, 4>) -> Self {
        Self {
            depth,
            weight,
            target: activation.detach(),
        }
    }

    pub(crate) fn evaluate(&self, activation: &Tensor<B, 4>) -> Tensor<B, 1> {
        activation
            .clone()
            .sub(self.target.clone())
            .powf_scalar(2.0)
            .mean()
            .mul_scalar(self.weight)
    }
}

/// A transparent tap comparing an activation's gram matrix against a frozen
/// target gram matrix.
pub struct StyleProbe<B: Backend> {
    pub(crate) depth: usize,
    weight: f32,
    target: Tensor<B, 2>,
}

impl<B: Backend> StyleProbe<B> {
    pub(crate) fn new(depth: usize, weight: f32, activation: Tensor<B, 4>) -> Self {
        Self {
            depth,
            weight,
            target: gram_matrix(&activation).detach(),
        }
    }

    pub(crate) fn evaluate(&self, activation: &Tensor<B, 4>) -> Tensor<B, 1> {
        gram_matrix(activation)
            .sub(self.target.clone())
            .powf_scalar(2.0)
            .mean()
            .mul_scalar(self.weight)
    }
}
