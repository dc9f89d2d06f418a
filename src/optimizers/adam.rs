//! Adam (Adaptive Moment Estimation) optimizer.
//!
//! Maintains first- and second-moment estimates per parameter and applies
//! the bias-corrected update:
//!
//! ```text
//! m = beta1 * m + (1 - beta1) * g
//! v = beta2 * v + (1 - beta2) * g^2
//! m_hat = m / (1 - beta1^t)
//! v_hat = v / (1 - beta2^t)
//! parameter -= learning_rate * m_hat / (sqrt(v_hat) + epsilon)
//! ```
//!
//! Reference: Kingma & Ba (2014), "Adam: A Method for Stochastic
//! Optimization".

use crate::error::Result;
use crate::matrix::{Matrix, MatrixRead, MatrixWrite};
use crate::optimizers::{check_pairs, Optimizer, ParamPair};

/// Adam optimizer with per-slot moment matrices.
///
/// Typical hyperparameters (from the paper): `learning_rate` 0.001,
/// `beta1` 0.9, `beta2` 0.999, `epsilon` 1e-8.
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    shapes: Vec<(usize, usize)>,
    /// First moment estimates, shape-matched to the bound parameters.
    m: Vec<Matrix>,
    /// Second moment estimates, shape-matched to the bound parameters.
    v: Vec<Matrix>,
    t: u32,
}

impl Adam {
    /// Create an Adam optimizer with explicit hyperparameters.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            shapes: Vec::new(),
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "adam"
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn betas(&self) -> (f32, f32) {
        (self.beta1, self.beta2)
    }

    fn epsilon(&self) -> f32 {
        self.epsilon
    }

    fn bind(&mut self, shapes: &[(usize, usize)]) -> Result<()> {
        self.shapes = shapes.to_vec();
        self.m.clear();
        self.v.clear();
        for &(rows, cols) in shapes {
            self.m.push(Matrix::zeros(rows, cols)?);
            self.v.push(Matrix::zeros(rows, cols)?);
        }
        Ok(())
    }

    fn step(&mut self, pairs: &mut [ParamPair<'_>]) -> Result<()> {
        check_pairs(&self.shapes, pairs)?;

        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, pair) in pairs.iter_mut().enumerate() {
            let m = &mut self.m[i];
            let v = &mut self.v[i];
            for r in 0..m.rows() {
                for (((mm, vv), p), &g) in m
                    .row_mut(r)
                    .iter_mut()
                    .zip(v.row_mut(r))
                    .zip(pair.param.row_mut(r))
                    .zip(pair.grad.row(r))
                {
                    *mm = self.beta1 * *mm + (1.0 - self.beta1) * g;
                    *vv = self.beta2 * *vv + (1.0 - self.beta2) * g * g;
                    let m_hat = *mm / bias_correction1;
                    let v_hat = *vv / bias_correction2;
                    *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
                }
            }
            pair.grad.fill(0.0);
        }

        Ok(())
    }

    fn step_count(&self) -> u32 {
        self.t
    }

    fn set_step_count(&mut self, t: u32) {
        self.t = t;
    }
}
