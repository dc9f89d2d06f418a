//! gradnet: a minimal neural-network training library.
//!
//! The core is a stride-aware dense matrix engine with non-owning views,
//! a layer abstraction with a complete dense implementation, a family of
//! gradient-based optimizers, and a sequential network that composes layers
//! into a trainable pipeline, plus binary serialization for trained weights.
//!
//! # Modules
//!
//! - `matrix`: dense buffers, borrowed views, strided element operations
//! - `activations`: pointwise activations, derivatives, and loss reductions
//! - `layers`: Layer trait and the dense implementation
//! - `optimizers`: Optimizer trait and SGD/Adam/RMSProp
//! - `network`: sequential orchestration (forward/backward/train/test)
//! - `serialization`: binary model format and optimizer checkpoints
//! - `config`: JSON architecture and training configuration
//! - `utils`: seedable RNG for reproducible initialization

#[cfg(feature = "blas")]
extern crate blas_src;

pub mod activations;
pub mod config;
pub mod error;
pub mod layers;
pub mod matrix;
pub mod network;
pub mod optimizers;
pub mod serialization;
pub mod utils;

pub use error::{Error, Result};
