//! Optimizer abstractions for neural network parameter updates.
//!
//! Optimizers consume a flattened list of (parameter, gradient) matrix pairs
//! collected from the network's layers in chain order, the fixed binding
//! order that makes repeated runs with identical seeds reproducible. They own
//! only their auxiliary per-parameter state (moment/velocity/cache buffers),
//! never the parameters themselves: the network re-collects fresh
//! [`ParamPair`]s for every step.
//!
//! The compile step calls [`Optimizer::bind`] once with the slot shapes;
//! every subsequent [`Optimizer::step`] must present the same number of
//! pairs with the same shapes. Gradients are zeroed after each step.

pub mod adam;
pub mod rmsprop;
pub mod sgd;

pub use adam::Adam;
pub use rmsprop::RmsProp;
pub use sgd::Sgd;

use crate::error::{Error, Result};
use crate::matrix::{Matrix, MatrixRead};

/// A parameter matrix and its gradient accumulator, borrowed from a layer
/// for the duration of one optimizer step.
pub struct ParamPair<'a> {
    pub param: &'a mut Matrix,
    pub grad: &'a mut Matrix,
}

/// Core trait for optimizers.
///
/// The lifecycle is `bind` once (the network's compile step), then `step`
/// once per training iteration. `step_count`/`set_step_count` expose the
/// time step for checkpoint resume.
pub trait Optimizer {
    /// Short algorithm name, also used by the checkpoint format.
    fn name(&self) -> &'static str;

    /// Base learning rate.
    fn learning_rate(&self) -> f32;

    /// Replace the base learning rate (schedules, decay strategies).
    fn set_learning_rate(&mut self, lr: f32);

    /// Algorithm decay rates as stored in checkpoints: `(beta1, beta2)` for
    /// Adam, `(momentum, 0)` for SGD, `(decay, 0)` for RMSProp.
    fn betas(&self) -> (f32, f32);

    /// Numerical stability constant.
    fn epsilon(&self) -> f32;

    /// Bind to a parameter set: record the slot shapes and allocate any
    /// shape-matched auxiliary state. Called once by the network's compile
    /// step; rebinding resets the auxiliary state.
    fn bind(&mut self, shapes: &[(usize, usize)]) -> Result<()>;

    /// Apply one update over the bound parameter pairs, then zero every
    /// gradient and advance the step counter.
    fn step(&mut self, pairs: &mut [ParamPair<'_>]) -> Result<()>;

    /// Number of completed steps.
    fn step_count(&self) -> u32;

    /// Restore the step counter (checkpoint resume).
    fn set_step_count(&mut self, t: u32);
}

/// Shared validation: the presented pairs must match the bound shapes
/// positionally, and each gradient must mirror its parameter.
pub(crate) fn check_pairs(bound: &[(usize, usize)], pairs: &[ParamPair<'_>]) -> Result<()> {
    if bound.len() != pairs.len() {
        return Err(Error::State(
            "optimizer step with a different parameter count than it was bound to",
        ));
    }
    for (shape, pair) in bound.iter().zip(pairs) {
        if pair.param.shape() != *shape {
            return Err(Error::ShapeMismatch {
                op: "optimizer_step",
                expected: *shape,
                actual: pair.param.shape(),
            });
        }
        if pair.grad.shape() != pair.param.shape() {
            return Err(Error::ShapeMismatch {
                op: "optimizer_step",
                expected: pair.param.shape(),
                actual: pair.grad.shape(),
            });
        }
    }
    Ok(())
}
