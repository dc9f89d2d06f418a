//! JSON configuration for architectures and training.
//!
//! Architecture files define the dense-layer stack; training files define
//! the optimizer, its hyperparameters, and the loss. Both are validated
//! before anything is built, so a bad config never yields a half-wired
//! network.
//!
//! # Example architecture file
//!
//! ```json
//! {
//!   "layers": [
//!     { "layer_type": "dense", "input_size": 784, "output_size": 256, "activation": "relu" },
//!     { "layer_type": "dense", "input_size": 256, "output_size": 10, "activation": "softmax" }
//!   ]
//! }
//! ```
//!
//! # Example training file
//!
//! ```json
//! {
//!   "optimizer": "adam",
//!   "learning_rate": 0.001,
//!   "beta1": 0.9,
//!   "beta2": 0.999,
//!   "epsilon": 1e-8,
//!   "loss": "cross_entropy"
//! }
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::activations::{Activation, Loss};
use crate::error::{Error, Result};
use crate::layers::DenseLayer;
use crate::network::Network;
use crate::optimizers::{Adam, Optimizer, RmsProp, Sgd};
use crate::utils::SimpleRng;

/// Configuration for a single layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Layer type; only "dense" is supported.
    pub layer_type: String,
    /// Number of input features.
    pub input_size: usize,
    /// Number of output features.
    pub output_size: usize,
    /// Activation name (see [`Activation::from_name`]); defaults to "none".
    pub activation: Option<String>,
}

/// Configuration for the entire network architecture.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    /// Layer configurations, applied in order.
    pub layers: Vec<LayerConfig>,
}

/// Training hyperparameters.
///
/// Different optimizers read different optional fields: `momentum` for
/// "sgd", `beta1`/`beta2`/`epsilon` for "adam", `decay`/`epsilon` for
/// "rmsprop". Unread fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Optimizer name: "sgd", "adam", or "rmsprop".
    pub optimizer: String,
    /// Base learning rate (must be positive).
    pub learning_rate: f32,
    /// SGD momentum (default 0).
    pub momentum: Option<f32>,
    /// Adam first-moment decay (default 0.9).
    pub beta1: Option<f32>,
    /// Adam second-moment decay (default 0.999).
    pub beta2: Option<f32>,
    /// Stability constant (default 1e-8).
    pub epsilon: Option<f32>,
    /// RMSProp cache decay (default 0.9).
    pub decay: Option<f32>,
    /// Loss name (see [`Loss::from_name`]); defaults to "cross_entropy".
    pub loss: Option<String>,
}

/// Load and validate an architecture configuration from a JSON file.
pub fn load_architecture<P: AsRef<Path>>(path: P) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)
        .map_err(|err| Error::Format(format!("invalid architecture config: {err}")))?;
    validate_architecture(&config)?;
    Ok(config)
}

fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.layers.is_empty() {
        return Err(Error::Format(
            "architecture must have at least one layer".into(),
        ));
    }

    for (i, layer) in config.layers.iter().enumerate() {
        if layer.layer_type != "dense" {
            return Err(Error::Format(format!(
                "layer {i}: unsupported layer type '{}'",
                layer.layer_type
            )));
        }
        if layer.input_size == 0 || layer.output_size == 0 {
            return Err(Error::Format(format!(
                "layer {i}: sizes must be greater than 0"
            )));
        }
        if let Some(ref name) = layer.activation {
            if Activation::from_name(name).is_none() {
                return Err(Error::Format(format!(
                    "layer {i}: unknown activation '{name}'"
                )));
            }
        }
    }

    // Output width of layer i must match input width of layer i + 1.
    for i in 0..config.layers.len() - 1 {
        let current = &config.layers[i];
        let next = &config.layers[i + 1];
        if current.output_size != next.input_size {
            return Err(Error::Format(format!(
                "layer connection mismatch: layer {i} output size ({}) does not match layer {} input size ({})",
                current.output_size,
                i + 1,
                next.input_size
            )));
        }
    }

    Ok(())
}

/// Build a network from a validated architecture configuration.
///
/// The network keeps the default cross-entropy loss; pair with
/// [`build_optimizer`] and [`TrainingConfig`] to override it.
pub fn build_network(config: &ArchitectureConfig, rng: &mut SimpleRng) -> Result<Network> {
    validate_architecture(config)?;

    let mut net = Network::new();
    for layer in &config.layers {
        let activation = match layer.activation {
            Some(ref name) => Activation::from_name(name)
                .ok_or_else(|| Error::Format(format!("unknown activation '{name}'")))?,
            None => Activation::None,
        };
        let dense = DenseLayer::new(layer.input_size, layer.output_size, activation, rng)?;
        net.add_layer(Box::new(dense));
    }
    Ok(net)
}

/// Load and validate a training configuration from a JSON file.
pub fn load_training<P: AsRef<Path>>(path: P) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)
        .map_err(|err| Error::Format(format!("invalid training config: {err}")))?;
    validate_training(&config)?;
    Ok(config)
}

fn validate_training(config: &TrainingConfig) -> Result<()> {
    if !matches!(config.optimizer.as_str(), "sgd" | "adam" | "rmsprop") {
        return Err(Error::Format(format!(
            "unknown optimizer '{}'",
            config.optimizer
        )));
    }
    if config.learning_rate <= 0.0 {
        return Err(Error::Format("learning_rate must be positive".into()));
    }
    for (name, value) in [
        ("momentum", config.momentum),
        ("beta1", config.beta1),
        ("beta2", config.beta2),
        ("decay", config.decay),
    ] {
        if let Some(v) = value {
            if !(0.0..1.0).contains(&v) {
                return Err(Error::Format(format!("{name} must be in range [0, 1)")));
            }
        }
    }
    if let Some(eps) = config.epsilon {
        if eps <= 0.0 {
            return Err(Error::Format("epsilon must be positive".into()));
        }
    }
    if let Some(ref name) = config.loss {
        if Loss::from_name(name).is_none() {
            return Err(Error::Format(format!("unknown loss '{name}'")));
        }
    }
    Ok(())
}

/// Build the configured optimizer.
pub fn build_optimizer(config: &TrainingConfig) -> Result<Box<dyn Optimizer>> {
    validate_training(config)?;

    let lr = config.learning_rate;
    let epsilon = config.epsilon.unwrap_or(1e-8);
    let optimizer: Box<dyn Optimizer> = match config.optimizer.as_str() {
        "sgd" => Box::new(Sgd::new(lr, config.momentum.unwrap_or(0.0))),
        "adam" => Box::new(Adam::new(
            lr,
            config.beta1.unwrap_or(0.9),
            config.beta2.unwrap_or(0.999),
            epsilon,
        )),
        "rmsprop" => Box::new(RmsProp::new(lr, config.decay.unwrap_or(0.9), epsilon)),
        other => return Err(Error::Format(format!("unknown optimizer '{other}'"))),
    };
    Ok(optimizer)
}

/// Loss configured by a training file (default cross-entropy).
pub fn build_loss(config: &TrainingConfig) -> Result<Loss> {
    match config.loss {
        Some(ref name) => {
            Loss::from_name(name).ok_or_else(|| Error::Format(format!("unknown loss '{name}'")))
        }
        None => Ok(Loss::CrossEntropy),
    }
}
