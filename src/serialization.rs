//! Binary serialization of trained networks and optimizer state.
//!
//! Model format (little-endian, fixed-width fields):
//!
//! ```text
//! magic u32 = 0x4E4E4C31 | version u32 = 1 | layer_count u32
//! per layer: layer_type u32
//!   Dense: input_size i32 | output_size i32 | activation i32
//!          w_rows u64 | w_cols u64 | weights f32 x (rows * cols)
//!          b_rows u64 | b_cols u64 | biases  f32 x (rows * cols)
//! ```
//!
//! The loader validates magic and version exactly, rejects unknown layer
//! types, and checks every stored tensor dimension against the freshly
//! constructed layer before copying data; any mismatch aborts the load and
//! drops the partially built network.
//!
//! The optimizer checkpoint is a companion file:
//! `name_len u32 | name | learning_rate f32 | beta1 f32 | beta2 f32 |
//! epsilon f32 | t u32`, enough to resume SGD or Adam.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::activations::Activation;
use crate::error::{Error, Result};
use crate::layers::{DenseLayer, Layer, LayerKind};
use crate::matrix::{Matrix, MatrixRead, MatrixWrite};
use crate::network::Network;
use crate::optimizers::{Adam, Optimizer, Sgd};

/// File magic, "NNL1".
pub const MAGIC: u32 = 0x4E4E_4C31;
/// Format version the reader accepts.
pub const VERSION: u32 = 1;

fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_f32<W: Write>(w: &mut W, value: f32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    r.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn read_f32<R: Read>(r: &mut R) -> Result<f32> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

fn write_tensor<W: Write>(w: &mut W, m: &Matrix) -> Result<()> {
    write_u64(w, m.rows() as u64)?;
    write_u64(w, m.cols() as u64)?;
    for r in 0..m.rows() {
        for &value in m.row(r) {
            write_f32(w, value)?;
        }
    }
    Ok(())
}

// Dimensions are validated against the expected shape before any data is
// read, so a mismatch aborts without a half-filled tensor.
fn read_tensor<R: Read>(r: &mut R, expected: (usize, usize), what: &str) -> Result<Matrix> {
    let rows = read_u64(r)? as usize;
    let cols = read_u64(r)? as usize;
    if (rows, cols) != expected {
        return Err(Error::Format(format!(
            "{what} dimension mismatch: stored {rows}x{cols}, expected {}x{}",
            expected.0, expected.1
        )));
    }
    let mut m = Matrix::zeros(rows, cols)?;
    for row in 0..rows {
        for col in 0..cols {
            let value = read_f32(r)?;
            m.set(row, col, value);
        }
    }
    Ok(m)
}

/// Serialize a network's topology and parameters to `path`.
///
/// Only dense layers are serializable; any other layer kind in the chain is
/// a `Format` error.
pub fn save_network<P: AsRef<Path>>(net: &Network, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write_u32(&mut w, MAGIC)?;
    write_u32(&mut w, VERSION)?;
    write_u32(&mut w, net.layer_count() as u32)?;

    for layer in net.layers() {
        write_u32(&mut w, layer.kind().code())?;
        match layer.kind() {
            LayerKind::Dense => {
                write_i32(&mut w, layer.input_size() as i32)?;
                write_i32(&mut w, layer.output_size() as i32)?;
                write_i32(&mut w, layer.activation().code())?;
                let weights = layer
                    .weights()
                    .ok_or_else(|| Error::Format("dense layer without weights".into()))?;
                write_tensor(&mut w, weights)?;
                let biases = layer
                    .biases()
                    .ok_or_else(|| Error::Format("dense layer without biases".into()))?;
                write_tensor(&mut w, biases)?;
            }
            other => {
                return Err(Error::Format(format!(
                    "unsupported layer type for serialization: {}",
                    other.code()
                )))
            }
        }
    }

    w.flush()?;
    Ok(())
}

/// Deserialize a network saved by [`save_network`].
pub fn load_network<P: AsRef<Path>>(path: P) -> Result<Network> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let magic = read_u32(&mut r)?;
    if magic != MAGIC {
        return Err(Error::Format(format!("bad magic 0x{magic:08X}")));
    }
    let version = read_u32(&mut r)?;
    if version != VERSION {
        return Err(Error::Format(format!(
            "unsupported version {version} (expected {VERSION})"
        )));
    }
    let layer_count = read_u32(&mut r)?;

    let mut net = Network::new();
    for _ in 0..layer_count {
        let type_code = read_u32(&mut r)?;
        match LayerKind::from_code(type_code) {
            Some(LayerKind::Dense) => {
                let input_size = read_i32(&mut r)?;
                let output_size = read_i32(&mut r)?;
                let activation_code = read_i32(&mut r)?;
                if input_size <= 0 || output_size <= 0 {
                    return Err(Error::Format(format!(
                        "invalid dense layer sizes {input_size}x{output_size}"
                    )));
                }
                let activation = Activation::from_code(activation_code).ok_or_else(|| {
                    Error::Format(format!("unknown activation code {activation_code}"))
                })?;

                let input_size = input_size as usize;
                let output_size = output_size as usize;
                let weights = read_tensor(&mut r, (input_size, output_size), "weight matrix")?;
                let biases = read_tensor(&mut r, (1, output_size), "bias matrix")?;
                let layer = DenseLayer::with_parameters(
                    input_size,
                    output_size,
                    activation,
                    weights,
                    biases,
                )?;
                net.add_layer(Box::new(layer));
            }
            _ => {
                return Err(Error::Format(format!("unknown layer type {type_code}")));
            }
        }
    }

    Ok(net)
}

/// Persist an optimizer's hyperparameters and step counter.
pub fn save_optimizer<P: AsRef<Path>>(optimizer: &dyn Optimizer, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    let name = optimizer.name().as_bytes();
    write_u32(&mut w, name.len() as u32)?;
    w.write_all(name)?;

    let (beta1, beta2) = optimizer.betas();
    write_f32(&mut w, optimizer.learning_rate())?;
    write_f32(&mut w, beta1)?;
    write_f32(&mut w, beta2)?;
    write_f32(&mut w, optimizer.epsilon())?;
    write_u32(&mut w, optimizer.step_count())?;

    w.flush()?;
    Ok(())
}

/// Restore an optimizer saved by [`save_optimizer`].
///
/// Only `sgd` and `adam` are resumable; other names are a `Format` error.
pub fn load_optimizer<P: AsRef<Path>>(path: P) -> Result<Box<dyn Optimizer>> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let name_len = read_u32(&mut r)? as usize;
    if name_len > 64 {
        return Err(Error::Format(format!("optimizer name length {name_len}")));
    }
    let mut name_bytes = vec![0u8; name_len];
    r.read_exact(&mut name_bytes)?;
    let name = String::from_utf8(name_bytes)
        .map_err(|_| Error::Format("optimizer name is not utf-8".into()))?;

    let learning_rate = read_f32(&mut r)?;
    let beta1 = read_f32(&mut r)?;
    let beta2 = read_f32(&mut r)?;
    let epsilon = read_f32(&mut r)?;
    let t = read_u32(&mut r)?;

    let mut optimizer: Box<dyn Optimizer> = match name.as_str() {
        "sgd" => Box::new(Sgd::new(learning_rate, beta1)),
        "adam" => Box::new(Adam::new(learning_rate, beta1, beta2, epsilon)),
        other => {
            return Err(Error::Format(format!(
                "optimizer '{other}' cannot be resumed"
            )))
        }
    };
    optimizer.set_step_count(t);
    Ok(optimizer)
}

fn sibling_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Save a `<path>.net` + `<path>.opt` checkpoint pair.
///
/// Requires a compiled network: the optimizer travels with the weights.
pub fn save_checkpoint<P: AsRef<Path>>(net: &Network, path: P) -> Result<()> {
    let base = path.as_ref();
    let optimizer = net
        .optimizer()
        .ok_or(Error::State("checkpoint requires a compiled network"))?;
    save_network(net, sibling_path(base, ".net"))?;
    save_optimizer(optimizer, sibling_path(base, ".opt"))
}

/// Load a checkpoint pair and recompile the network with the restored
/// optimizer. The optimizer's moment state is rebuilt from zero; its
/// hyperparameters and step counter carry over.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Network> {
    let base = path.as_ref();
    let mut net = load_network(sibling_path(base, ".net"))?;
    let optimizer = load_optimizer(sibling_path(base, ".opt"))?;
    net.compile(optimizer)?;
    Ok(net)
}
