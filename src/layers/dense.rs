//! Dense (fully connected) layer implementation.
//!
//! Performs the transformation `output = input x weights + biases` with an
//! optional pointwise activation, and owns the full gradient math for the
//! backward pass: parameter gradients accumulate across backward calls until
//! an update zeroes them, so split minibatches behave like one large batch.

use crate::activations::{activate, activate_derivative, Activation};
use crate::error::{Error, Result};
use crate::layers::{Layer, LayerKind};
use crate::matrix::{multiply, transpose, Matrix, MatrixRead, MatrixWrite};
use crate::optimizers::ParamPair;
use crate::utils::SimpleRng;

/// Initial bias value; a small positive constant avoids dead units at start.
const BIAS_INIT: f32 = 0.1;

/// Dense (fully connected) layer with weights and biases.
///
/// `weights` is `input_size x output_size`, `biases` is a `1 x output_size`
/// row-vector broadcast over the batch. Gradient accumulators mirror the
/// parameter shapes at all times.
///
/// # Example
///
/// ```
/// use gradnet::layers::{DenseLayer, Layer};
/// use gradnet::activations::Activation;
/// use gradnet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new(784, 512, Activation::Relu, &mut rng).unwrap();
/// assert_eq!(layer.input_size(), 784);
/// assert_eq!(layer.output_size(), 512);
/// assert_eq!(layer.parameter_count(), 784 * 512 + 512);
/// ```
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    activation: Activation,
    weights: Matrix,
    biases: Matrix,
    grad_weights: Matrix,
    grad_biases: Matrix,
    input: Option<Matrix>,
    pre_activation: Option<Matrix>,
    output: Option<Matrix>,
    has_gradients: bool,
}

impl DenseLayer {
    /// Create a new layer with Xavier-initialized weights.
    ///
    /// Weights are sampled uniformly from `[-limit, limit]` with
    /// `limit = sqrt(6 / (input_size + output_size))`; biases are filled
    /// with a small constant (0.1).
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(Error::State("dense layer sizes must be nonzero"));
        }

        let mut weights = Matrix::zeros(input_size, output_size)?;
        let limit = (6.0f32 / (input_size + output_size) as f32).sqrt();
        weights.random_uniform(rng, -limit, limit);

        let mut biases = Matrix::zeros(1, output_size)?;
        biases.fill(BIAS_INIT);

        Ok(Self {
            input_size,
            output_size,
            activation,
            weights,
            biases,
            grad_weights: Matrix::zeros(input_size, output_size)?,
            grad_biases: Matrix::zeros(1, output_size)?,
            input: None,
            pre_activation: None,
            output: None,
            has_gradients: false,
        })
    }

    /// Create a layer from explicit parameters (deserialization, tests).
    ///
    /// `weights` must be `input_size x output_size` and `biases`
    /// `1 x output_size`.
    pub fn with_parameters(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        weights: Matrix,
        biases: Matrix,
    ) -> Result<Self> {
        if weights.shape() != (input_size, output_size) {
            return Err(Error::ShapeMismatch {
                op: "dense_weights",
                expected: (input_size, output_size),
                actual: weights.shape(),
            });
        }
        if biases.shape() != (1, output_size) {
            return Err(Error::ShapeMismatch {
                op: "dense_biases",
                expected: (1, output_size),
                actual: biases.shape(),
            });
        }

        Ok(Self {
            input_size,
            output_size,
            activation,
            weights,
            biases,
            grad_weights: Matrix::zeros(input_size, output_size)?,
            grad_biases: Matrix::zeros(1, output_size)?,
            input: None,
            pre_activation: None,
            output: None,
            has_gradients: false,
        })
    }

    /// Gradient accumulator for the weights (tests, inspection).
    pub fn grad_weights(&self) -> &Matrix {
        &self.grad_weights
    }

    /// Gradient accumulator for the biases (tests, inspection).
    pub fn grad_biases(&self) -> &Matrix {
        &self.grad_biases
    }
}

impl Layer for DenseLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Dense
    }

    fn activation(&self) -> Activation {
        self.activation
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn parameter_count(&self) -> usize {
        self.input_size * self.output_size + self.output_size
    }

    fn forward(&mut self, input: &dyn MatrixRead) -> Result<()> {
        if input.cols() != self.input_size {
            return Err(Error::ShapeMismatch {
                op: "dense_forward",
                expected: (input.rows(), self.input_size),
                actual: input.shape(),
            });
        }

        let rows = input.rows();
        let mut out = Matrix::zeros(rows, self.output_size)?;
        multiply(input, &self.weights, &mut out)?;

        // Broadcast the bias row over the batch.
        for r in 0..rows {
            for (value, &bias) in out.row_mut(r).iter_mut().zip(self.biases.row(0)) {
                *value += bias;
            }
        }

        self.input = Some(input.to_matrix());
        if self.activation == Activation::None {
            self.pre_activation = None;
        } else {
            self.pre_activation = Some(out.clone());
            activate(&mut out, self.activation);
        }
        self.output = Some(out);
        Ok(())
    }

    fn backward(&mut self, output_grad: &dyn MatrixRead) -> Result<Matrix> {
        let input = self
            .input
            .as_ref()
            .ok_or(Error::State("dense backward called before forward"))?;
        let rows = input.rows();

        if output_grad.shape() != (rows, self.output_size) {
            return Err(Error::ShapeMismatch {
                op: "dense_backward",
                expected: (rows, self.output_size),
                actual: output_grad.shape(),
            });
        }

        let mut act_grad = output_grad.to_matrix();
        if self.activation != Activation::None {
            let pre = self
                .pre_activation
                .as_ref()
                .ok_or(Error::State("dense backward missing pre-activation cache"))?;
            activate_derivative(pre, &mut act_grad, self.activation)?;
        }

        // grad_weights += input^T x act_grad
        for i in 0..self.input_size {
            for j in 0..self.output_size {
                let mut acc = 0.0f32;
                for k in 0..rows {
                    acc += input.at(k, i) * act_grad.at(k, j);
                }
                let current = self.grad_weights.at(i, j);
                self.grad_weights.set(i, j, current + acc);
            }
        }

        // grad_biases[j] += sum over the batch of act_grad[.][j]
        for j in 0..self.output_size {
            let mut acc = 0.0f32;
            for k in 0..rows {
                acc += act_grad.at(k, j);
            }
            let current = self.grad_biases.at(0, j);
            self.grad_biases.set(0, j, current + acc);
        }

        // Gradient for the preceding layer: act_grad x weights^T.
        let mut weights_t = Matrix::zeros(self.output_size, self.input_size)?;
        transpose(&self.weights, &mut weights_t)?;
        let mut input_grad = Matrix::zeros(rows, self.input_size)?;
        multiply(&act_grad, &weights_t, &mut input_grad)?;

        self.has_gradients = true;
        Ok(input_grad)
    }

    fn update(&mut self, learning_rate: f32) -> Result<()> {
        if !self.has_gradients {
            return Err(Error::State("dense update called before backward"));
        }

        for r in 0..self.weights.rows() {
            for (w, &g) in self
                .weights
                .row_mut(r)
                .iter_mut()
                .zip(self.grad_weights.row(r))
            {
                *w -= learning_rate * g;
            }
        }
        for (b, &g) in self
            .biases
            .row_mut(0)
            .iter_mut()
            .zip(self.grad_biases.row(0))
        {
            *b -= learning_rate * g;
        }

        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
        self.has_gradients = false;
        Ok(())
    }

    fn output(&self) -> Option<&Matrix> {
        self.output.as_ref()
    }

    fn weights(&self) -> Option<&Matrix> {
        Some(&self.weights)
    }

    fn biases(&self) -> Option<&Matrix> {
        Some(&self.biases)
    }

    fn parameters(&mut self) -> Vec<ParamPair<'_>> {
        vec![
            ParamPair {
                param: &mut self.weights,
                grad: &mut self.grad_weights,
            },
            ParamPair {
                param: &mut self.biases,
                grad: &mut self.grad_biases,
            },
        ]
    }
}
