//! Sequential network orchestration.
//!
//! A [`Network`] is an ordered sequence of layers plus an optional compiled
//! optimizer. The forward pass threads each layer's cached output into the
//! next layer; the backward pass seeds the loss gradient at the output layer
//! and threads each layer's true input gradient (`activation_grad x
//! weights^T`, computed by the layer) back to its predecessor by simple
//! reverse iteration.

use crate::activations::Loss;
use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::matrix::{Matrix, MatrixRead};
use crate::optimizers::{Optimizer, ParamPair};

/// Ordered chain of layers with an associated optimizer and loss.
///
/// Layer widths are a construction-time responsibility of the caller (the
/// config loader validates them); the layers themselves reject mismatched
/// inputs at forward time.
///
/// # Example
///
/// ```
/// use gradnet::activations::{Activation, Loss};
/// use gradnet::layers::DenseLayer;
/// use gradnet::matrix::Matrix;
/// use gradnet::network::Network;
/// use gradnet::optimizers::Sgd;
/// use gradnet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let mut net = Network::with_loss(Loss::MeanSquaredError);
/// net.add_layer(Box::new(
///     DenseLayer::new(2, 1, Activation::None, &mut rng).unwrap(),
/// ));
/// net.compile(Box::new(Sgd::new(0.1, 0.0))).unwrap();
///
/// let input = Matrix::from_vec(1, 2, vec![1.0, 0.0]).unwrap();
/// let target = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
/// let loss = net.train(&input, &target).unwrap();
/// assert!(loss.is_finite());
/// ```
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    optimizer: Option<Box<dyn Optimizer>>,
    loss: Loss,
}

impl Network {
    /// Empty network with the default cross-entropy loss.
    pub fn new() -> Self {
        Self::with_loss(Loss::CrossEntropy)
    }

    /// Empty network with an explicit loss function.
    pub fn with_loss(loss: Loss) -> Self {
        Self {
            layers: Vec::new(),
            optimizer: None,
            loss,
        }
    }

    /// Append a layer to the end of the chain.
    pub fn add_layer(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Number of layers in the chain.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The layer chain, in forward order.
    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Configured loss function.
    pub fn loss(&self) -> Loss {
        self.loss
    }

    /// The compiled optimizer, if any.
    pub fn optimizer(&self) -> Option<&dyn Optimizer> {
        self.optimizer.as_deref()
    }

    /// Attach an optimizer: walk the chain once, bind the optimizer to the
    /// parameter shapes in chain order (per layer: weights, then biases),
    /// and keep it for [`Network::train`].
    pub fn compile(&mut self, mut optimizer: Box<dyn Optimizer>) -> Result<()> {
        let mut shapes = Vec::new();
        for layer in &mut self.layers {
            for pair in layer.parameters() {
                shapes.push(pair.param.shape());
            }
        }
        optimizer.bind(&shapes)?;
        self.optimizer = Some(optimizer);
        Ok(())
    }

    /// Forward pass through the whole chain.
    ///
    /// Returns an independent copy of the final output so the caller cannot
    /// mutate cached layer state. An empty network copies the input through.
    pub fn forward(&mut self, input: &dyn MatrixRead) -> Result<Matrix> {
        if self.layers.is_empty() {
            return Ok(input.to_matrix());
        }
        for i in 0..self.layers.len() {
            if i == 0 {
                self.layers[0].forward(input)?;
            } else {
                let (done, rest) = self.layers.split_at_mut(i);
                let previous = done[i - 1]
                    .output()
                    .ok_or(Error::State("layer produced no output"))?;
                rest[0].forward(previous)?;
            }
        }
        let last = self
            .layers
            .last()
            .and_then(|layer| layer.output())
            .ok_or(Error::State("forward produced no output"))?;
        Ok(last.clone())
    }

    /// Backward pass from the cached final output against `target`.
    ///
    /// Seeds with the loss gradient (`output - target` for the
    /// softmax/cross-entropy pairing) and hands each layer's returned input
    /// gradient to its predecessor.
    pub fn backward(&mut self, target: &dyn MatrixRead) -> Result<()> {
        let output = self
            .layers
            .last()
            .and_then(|layer| layer.output())
            .ok_or(Error::State("network backward called before forward"))?;
        let mut grad = self.loss.gradient(output, target)?;
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(())
    }

    /// One optimizer step over every parameter pair in binding order.
    pub fn update(&mut self) -> Result<()> {
        let optimizer = self
            .optimizer
            .as_mut()
            .ok_or(Error::State("network update without a compiled optimizer"))?;
        let mut pairs: Vec<ParamPair<'_>> = Vec::new();
        for layer in &mut self.layers {
            pairs.extend(layer.parameters());
        }
        optimizer.step(&mut pairs)
    }

    /// One training iteration: forward, loss, backward, optimizer step.
    /// Returns the scalar loss measured before the update.
    pub fn train(&mut self, input: &dyn MatrixRead, target: &dyn MatrixRead) -> Result<f32> {
        if self.optimizer.is_none() {
            return Err(Error::State("train requires a compiled network"));
        }
        let output = self.forward(input)?;
        let loss = self.loss.compute(&output, target)?;
        self.backward(target)?;
        self.update()?;
        Ok(loss)
    }

    /// Forward pass and loss only; no gradients, no parameter mutation.
    pub fn test(&mut self, input: &dyn MatrixRead, target: &dyn MatrixRead) -> Result<f32> {
        let output = self.forward(input)?;
        self.loss.compute(&output, target)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}
