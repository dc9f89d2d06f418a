//! RMSProp optimizer.
//!
//! Keeps a decayed cache of squared gradients per parameter and divides each
//! update by its root:
//!
//! ```text
//! cache = decay * cache + (1 - decay) * g^2
//! parameter -= learning_rate * g / (sqrt(cache) + epsilon)
//! ```

use crate::error::Result;
use crate::matrix::{Matrix, MatrixRead, MatrixWrite};
use crate::optimizers::{check_pairs, Optimizer, ParamPair};

/// RMSProp with per-slot squared-gradient caches.
///
/// Typical hyperparameters: `decay` 0.9, `epsilon` 1e-8.
pub struct RmsProp {
    learning_rate: f32,
    decay: f32,
    epsilon: f32,
    shapes: Vec<(usize, usize)>,
    cache: Vec<Matrix>,
    t: u32,
}

impl RmsProp {
    /// Create an RMSProp optimizer.
    pub fn new(learning_rate: f32, decay: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            decay,
            epsilon,
            shapes: Vec::new(),
            cache: Vec::new(),
            t: 0,
        }
    }

    /// Decay rate of the squared-gradient cache.
    pub fn decay(&self) -> f32 {
        self.decay
    }
}

impl Optimizer for RmsProp {
    fn name(&self) -> &'static str {
        "rmsprop"
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn betas(&self) -> (f32, f32) {
        (self.decay, 0.0)
    }

    fn epsilon(&self) -> f32 {
        self.epsilon
    }

    fn bind(&mut self, shapes: &[(usize, usize)]) -> Result<()> {
        self.shapes = shapes.to_vec();
        self.cache.clear();
        for &(rows, cols) in shapes {
            self.cache.push(Matrix::zeros(rows, cols)?);
        }
        Ok(())
    }

    fn step(&mut self, pairs: &mut [ParamPair<'_>]) -> Result<()> {
        check_pairs(&self.shapes, pairs)?;

        for (i, pair) in pairs.iter_mut().enumerate() {
            let cache = &mut self.cache[i];
            for r in 0..cache.rows() {
                for ((c, p), &g) in cache
                    .row_mut(r)
                    .iter_mut()
                    .zip(pair.param.row_mut(r))
                    .zip(pair.grad.row(r))
                {
                    *c = self.decay * *c + (1.0 - self.decay) * g * g;
                    *p -= self.learning_rate * g / (c.sqrt() + self.epsilon);
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
