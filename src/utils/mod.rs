//! Shared utilities for the library.
//!
//! Currently just the seedable RNG used for weight initialization.

pub mod rng;

pub use rng::SimpleRng;
