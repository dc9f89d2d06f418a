//! Stochastic Gradient Descent optimizer.
//!
//! The vanilla update is `parameter -= learning_rate * gradient`. With a
//! nonzero momentum, per-slot velocity buffers are allocated at bind time
//! and the update becomes `v = momentum * v + gradient;
//! parameter -= learning_rate * v`.

use crate::error::Result;
use crate::matrix::{Matrix, MatrixRead, MatrixWrite};
use crate::optimizers::{check_pairs, Optimizer, ParamPair};

/// Stochastic gradient descent, optionally with momentum.
///
/// # Example
///
/// ```
/// use gradnet::optimizers::{Optimizer, ParamPair, Sgd};
/// use gradnet::matrix::{Matrix, MatrixRead};
///
/// let mut optimizer = Sgd::new(0.1, 0.0);
/// optimizer.bind(&[(1, 3)]).unwrap();
///
/// let mut param = Matrix::from_vec(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
/// let mut grad = Matrix::from_vec(1, 3, vec![0.1, 0.2, 0.3]).unwrap();
/// let mut pairs = vec![ParamPair { param: &mut param, grad: &mut grad }];
/// optimizer.step(&mut pairs).unwrap();
///
/// assert!((param.at(0, 0) - 0.99).abs() < 1e-6);
/// ```
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    shapes: Vec<(usize, usize)>,
    velocity: Vec<Matrix>,
    t: u32,
}

impl Sgd {
    /// Create an SGD optimizer. `momentum` of zero gives the plain update
    /// and allocates no auxiliary state.
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            shapes: Vec::new(),
            velocity: Vec::new(),
            t: 0,
        }
    }

    /// Momentum coefficient.
    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn betas(&self) -> (f32, f32) {
        (self.momentum, 0.0)
    }

    fn epsilon(&self) -> f32 {
        1e-8
    }

    fn bind(&mut self, shapes: &[(usize, usize)]) -> Result<()> {
        self.shapes = shapes.to_vec();
        self.velocity.clear();
        if self.momentum > 0.0 {
            for &(rows, cols) in shapes {
                self.velocity.push(Matrix::zeros(rows, cols)?);
            }
        }
        Ok(())
    }

    fn step(&mut self, pairs: &mut [ParamPair<'_>]) -> Result<()> {
        check_pairs(&self.shapes, pairs)?;

        for (i, pair) in pairs.iter_mut().enumerate() {
            if self.momentum > 0.0 {
                let velocity = &mut self.velocity[i];
                for r in 0..velocity.rows() {
                    for ((v, p), g) in velocity
                        .row_mut(r)
                        .iter_mut()
                        .zip(pair.param.row_mut(r))
                        .zip(pair.grad.row(r))
                    {
                        *v = self.momentum * *v + g;
                        *p -= self.learning_rate * *v;
                    }
                }
            } else {
                for r in 0..pair.param.rows() {
                    for (p, &g) in pair.param.row_mut(r).iter_mut().zip(pair.grad.row(r)) {
                        *p -= self.learning_rate * g;
                    }
                }
            }
            pair.grad.fill(0.0);
        }

        self.t += 1;
        Ok(())
    }

    fn step_count(&self) -> u32 {
        self.t
    }

    fn set_step_count(&mut self, t: u32) {
        self.t = t;
    }
}
