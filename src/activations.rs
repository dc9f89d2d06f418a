//! Activation functions, their derivatives, and scalar loss reductions.
//!
//! Activations mutate matrices in place. Derivatives are applied by
//! multiplying an incoming gradient by the local derivative evaluated at the
//! cached pre-activation values, which is exactly what the dense layer's
//! backward pass needs. Softmax is the one exception: its derivative here is
//! a deliberate no-op because softmax is always paired with cross-entropy
//! loss, whose combined gradient simplifies to `output - target` and is
//! produced at the network boundary instead.

use crate::error::{Error, Result};
use crate::matrix::{Matrix, MatrixRead, MatrixWrite};

const SELU_SCALE: f32 = 1.050_701;
const SELU_ALPHA: f32 = 1.673_263_2;
const SQRT_2_OVER_PI: f32 = 0.797_884_56;
const LOG_EPSILON: f32 = 1e-10;

/// Pointwise activation kinds.
///
/// The discriminants double as the on-disk activation tags in the binary
/// model format, so the order is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    None = 0,
    Sigmoid = 1,
    Relu = 2,
    Tanh = 3,
    Softmax = 4,
    LeakyRelu = 5,
    Elu = 6,
    Selu = 7,
    Swish = 8,
    Mish = 9,
    Gelu = 10,
}

impl Activation {
    /// Stable name, used by config files and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Activation::None => "none",
            Activation::Sigmoid => "sigmoid",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
            Activation::LeakyRelu => "leaky_relu",
            Activation::Elu => "elu",
            Activation::Selu => "selu",
            Activation::Swish => "swish",
            Activation::Mish => "mish",
            Activation::Gelu => "gelu",
        }
    }

    /// Inverse of [`Activation::name`].
    pub fn from_name(name: &str) -> Option<Activation> {
        match name {
            "none" => Some(Activation::None),
            "sigmoid" => Some(Activation::Sigmoid),
            "relu" => Some(Activation::Relu),
            "tanh" => Some(Activation::Tanh),
            "softmax" => Some(Activation::Softmax),
            "leaky_relu" => Some(Activation::LeakyRelu),
            "elu" => Some(Activation::Elu),
            "selu" => Some(Activation::Selu),
            "swish" => Some(Activation::Swish),
            "mish" => Some(Activation::Mish),
            "gelu" => Some(Activation::Gelu),
            _ => None,
        }
    }

    /// Wire tag for serialization.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Inverse of [`Activation::code`].
    pub fn from_code(code: i32) -> Option<Activation> {
        match code {
            0 => Some(Activation::None),
            1 => Some(Activation::Sigmoid),
            2 => Some(Activation::Relu),
            3 => Some(Activation::Tanh),
            4 => Some(Activation::Softmax),
            5 => Some(Activation::LeakyRelu),
            6 => Some(Activation::Elu),
            7 => Some(Activation::Selu),
            8 => Some(Activation::Swish),
            9 => Some(Activation::Mish),
            10 => Some(Activation::Gelu),
            _ => None,
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn gelu_cdf(x: f32) -> f32 {
    0.5 * (1.0 + (SQRT_2_OVER_PI * (x + 0.044715 * x * x * x)).tanh())
}

/// Apply `kind` to every element of `m` in place.
///
/// Softmax is row-wise: each row has its max subtracted before
/// exponentiation (numerical stability) and is normalized by its sum.
pub fn activate<M: MatrixWrite + ?Sized>(m: &mut M, kind: Activation) {
    match kind {
        Activation::None => {}
        Activation::Softmax => {
            for r in 0..m.rows() {
                let row = m.row_mut(r);
                if row.is_empty() {
                    continue;
                }
                let mut max_value = row[0];
                for &value in row.iter().skip(1) {
                    if value > max_value {
                        max_value = value;
                    }
                }
                let mut total = 0.0f32;
                for value in row.iter_mut() {
                    *value = (*value - max_value).exp();
                    total += *value;
                }
                let inv = 1.0 / total;
                for value in row.iter_mut() {
                    *value *= inv;
                }
            }
        }
        _ => {
            for r in 0..m.rows() {
                for value in m.row_mut(r) {
                    let x = *value;
                    *value = match kind {
                        Activation::Sigmoid => sigmoid(x),
                        Activation::Relu => {
                            if x > 0.0 {
                                x
                            } else {
                                0.0
                            }
                        }
                        Activation::Tanh => x.tanh(),
                        Activation::LeakyRelu => {
                            if x > 0.0 {
                                x
                            } else {
                                0.01 * x
                            }
                        }
                        Activation::Elu => {
                            if x > 0.0 {
                                x
                            } else {
                                x.exp() - 1.0
                            }
                        }
                        Activation::Selu => {
                            if x > 0.0 {
                                SELU_SCALE * x
                            } else {
                                SELU_SCALE * SELU_ALPHA * (x.exp() - 1.0)
                            }
                        }
                        Activation::Swish => x * sigmoid(x),
                        Activation::Mish => x * (1.0 + x.exp()).ln().tanh(),
                        Activation::Gelu => x * gelu_cdf(x),
                        Activation::None | Activation::Softmax => unreachable!(),
                    };
                }
            }
        }
    }
}

/// Multiply `grad` in place by the derivative of `kind` evaluated at the
/// pre-activation values in `pre`.
///
/// `pre` and `grad` must share a logical shape. Softmax and `None` leave
/// `grad` untouched (see module docs for why softmax is a no-op).
pub fn activate_derivative<P, G>(pre: &P, grad: &mut G, kind: Activation) -> Result<()>
where
    P: MatrixRead + ?Sized,
    G: MatrixWrite + ?Sized,
{
    if pre.shape() != grad.shape() {
        return Err(Error::ShapeMismatch {
            op: "activate_derivative",
            expected: pre.shape(),
            actual: grad.shape(),
        });
    }
    if matches!(kind, Activation::None | Activation::Softmax) {
        return Ok(());
    }
    for r in 0..pre.rows() {
        for (g, &x) in grad.row_mut(r).iter_mut().zip(pre.row(r)) {
            let d = match kind {
                Activation::Sigmoid => {
                    let s = sigmoid(x);
                    s * (1.0 - s)
                }
                Activation::Relu => {
                    if x > 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                Activation::Tanh => {
                    let t = x.tanh();
                    1.0 - t * t
                }
                Activation::LeakyRelu => {
                    if x > 0.0 {
                        1.0
                    } else {
                        0.01
                    }
                }
                Activation::Elu => {
                    if x > 0.0 {
                        1.0
                    } else {
                        x.exp()
                    }
                }
                Activation::Selu => {
                    if x > 0.0 {
                        SELU_SCALE
                    } else {
                        SELU_SCALE * SELU_ALPHA * x.exp()
                    }
                }
                Activation::Swish => {
                    let s = sigmoid(x);
                    s + x * s * (1.0 - s)
                }
                Activation::Mish => {
                    let ex = x.exp();
                    let omega =
                        4.0 * (x + 1.0) + 4.0 * (2.0 * x).exp() + (3.0 * x).exp() + ex * (4.0 * x + 6.0);
                    let delta = 2.0 * ex + (2.0 * x).exp() + 2.0;
                    ex * omega / (delta * delta)
                }
                Activation::Gelu => {
                    let pdf = (-0.5 * x * x).exp() / (2.0 * std::f32::consts::PI).sqrt();
                    gelu_cdf(x) + x * pdf
                }
                Activation::None | Activation::Softmax => unreachable!(),
            };
            *g *= d;
        }
    }
    Ok(())
}

/// Scalar loss reductions over a network output and a target matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// `-sum(target * ln(output + 1e-10))`, divided by the row count.
    /// Pairs with a softmax output layer.
    CrossEntropy,
    /// Element mean of the squared difference.
    MeanSquaredError,
    /// Element mean of the binary cross-entropy terms.
    BinaryCrossEntropy,
}

impl Loss {
    /// Stable name, used by config files.
    pub fn name(&self) -> &'static str {
        match self {
            Loss::CrossEntropy => "cross_entropy",
            Loss::MeanSquaredError => "mse",
            Loss::BinaryCrossEntropy => "binary_cross_entropy",
        }
    }

    /// Inverse of [`Loss::name`].
    pub fn from_name(name: &str) -> Option<Loss> {
        match name {
            "cross_entropy" => Some(Loss::CrossEntropy),
            "mse" => Some(Loss::MeanSquaredError),
            "binary_cross_entropy" => Some(Loss::BinaryCrossEntropy),
            _ => None,
        }
    }

    /// Scalar loss of `output` against `target`; shapes must match.
    pub fn compute<O, T>(&self, output: &O, target: &T) -> Result<f32>
    where
        O: MatrixRead + ?Sized,
        T: MatrixRead + ?Sized,
    {
        if output.shape() != target.shape() {
            return Err(Error::ShapeMismatch {
                op: "loss",
                expected: output.shape(),
                actual: target.shape(),
            });
        }
        let rows = output.rows();
        let count = rows * output.cols();
        if count == 0 {
            return Ok(0.0);
        }

        let mut total = 0.0f32;
        match self {
            Loss::CrossEntropy => {
                for r in 0..rows {
                    for (&o, &t) in output.row(r).iter().zip(target.row(r)) {
                        total += -t * (o + LOG_EPSILON).ln();
                    }
                }
                Ok(total / rows as f32)
            }
            Loss::MeanSquaredError => {
                for r in 0..rows {
                    for (&o, &t) in output.row(r).iter().zip(target.row(r)) {
                        let diff = o - t;
                        total += diff * diff;
                    }
                }
                Ok(total / count as f32)
            }
            Loss::BinaryCrossEntropy => {
                for r in 0..rows {
                    for (&o, &t) in output.row(r).iter().zip(target.row(r)) {
                        total += -t * (o + LOG_EPSILON).ln()
                            - (1.0 - t) * (1.0 - o + LOG_EPSILON).ln();
                    }
                }
                Ok(total / count as f32)
            }
        }
    }

    /// Analytic gradient of the loss with respect to `output`: the seed the
    /// network backward pass threads into the last layer.
    ///
    /// Cross-entropy assumes the softmax pairing, so its seed is simply
    /// `output - target`.
    pub fn gradient<O, T>(&self, output: &O, target: &T) -> Result<Matrix>
    where
        O: MatrixRead + ?Sized,
        T: MatrixRead + ?Sized,
    {
        if output.shape() != target.shape() {
            return Err(Error::ShapeMismatch {
                op: "loss_gradient",
                expected: output.shape(),
                actual: target.shape(),
            });
        }
        let mut grad = output.to_matrix();
        let count = output.rows() * output.cols();
        match self {
            Loss::CrossEntropy => {
                grad.subtract(target)?;
            }
            Loss::MeanSquaredError => {
                grad.subtract(target)?;
                if count > 0 {
                    grad.scale(2.0 / count as f32);
                }
            }
            Loss::BinaryCrossEntropy => {
                for r in 0..grad.rows() {
                    for (g, &t) in grad.row_mut(r).iter_mut().zip(target.row(r)) {
                        let o = *g;
                        *g = -t / (o + LOG_EPSILON) + (1.0 - t) / (1.0 - o + LOG_EPSILON);
                    }
                }
                if count > 0 {
                    grad.scale(1.0 / count as f32);
                }
            }
        }
        Ok(grad)
    }
}
