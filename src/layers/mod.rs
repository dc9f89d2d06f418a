//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the dense implementation. Other
//! layer kinds exist only as serialization tags; the reader rejects them.

pub mod dense;

pub use dense::DenseLayer;

use crate::activations::Activation;
use crate::error::Result;
use crate::matrix::{Matrix, MatrixRead};
use crate::optimizers::ParamPair;

/// Discriminants for the layer kinds the binary format knows about.
///
/// Only [`LayerKind::Dense`] is constructible in this library; the remaining
/// tags exist so the model reader can name what it is rejecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Dense = 0,
    Conv2D = 1,
    Rnn = 2,
    Lstm = 3,
    Attention = 4,
    Dropout = 5,
    BatchNorm = 6,
}

impl LayerKind {
    /// Wire tag for serialization.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Inverse of [`LayerKind::code`].
    pub fn from_code(code: u32) -> Option<LayerKind> {
        match code {
            0 => Some(LayerKind::Dense),
            1 => Some(LayerKind::Conv2D),
            2 => Some(LayerKind::Rnn),
            3 => Some(LayerKind::Lstm),
            4 => Some(LayerKind::Attention),
            5 => Some(LayerKind::Dropout),
            6 => Some(LayerKind::BatchNorm),
            _ => None,
        }
    }
}

/// Core trait for neural network layers.
///
/// Layers own their parameters and gradient accumulators and cache whatever
/// they need from `forward` to serve the next `backward`. The lifecycle is
/// `forward` -> `backward` -> `update`; calling a stage without its
/// predecessor's cached state is a `State` error.
pub trait Layer {
    /// Which kind of layer this is (serialization tag).
    fn kind(&self) -> LayerKind;

    /// Activation applied after the affine transform.
    fn activation(&self) -> Activation;

    /// Expected number of input features per sample.
    fn input_size(&self) -> usize;

    /// Number of output features per sample.
    fn output_size(&self) -> usize;

    /// Total count of learnable parameters (weights plus biases).
    fn parameter_count(&self) -> usize;

    /// Forward propagation. Caches the input and replaces the cached output.
    ///
    /// The input may be an owned matrix or a view (e.g. a batch slice); its
    /// column count must equal [`Layer::input_size`].
    fn forward(&mut self, input: &dyn MatrixRead) -> Result<()>;

    /// Backward propagation.
    ///
    /// Accumulates parameter gradients from `output_grad` and returns the
    /// gradient with respect to this layer's input, which the network hands
    /// to the preceding layer.
    fn backward(&mut self, output_grad: &dyn MatrixRead) -> Result<Matrix>;

    /// Apply plain gradient descent to the parameters and zero the
    /// accumulators. Requires a prior `backward`.
    fn update(&mut self, learning_rate: f32) -> Result<()>;

    /// Output cached by the last `forward` call, if any.
    fn output(&self) -> Option<&Matrix>;

    /// Weight matrix, for layers that have one.
    fn weights(&self) -> Option<&Matrix>;

    /// Bias row-vector, for layers that have one.
    fn biases(&self) -> Option<&Matrix>;

    /// The layer's (parameter, gradient) pairs in a fixed order, for
    /// optimizer binding. Dense layers yield weights first, then biases.
    fn parameters(&mut self) -> Vec<ParamPair<'_>>;
}
