//! Error types for the gradnet library.
//!
//! Every fallible operation returns [`Result`] instead of panicking, so shape
//! and state violations surface to the caller before any output is mutated.

use std::fmt;
use std::io;

/// All error conditions raised by this library.
#[derive(Debug)]
pub enum Error {
    /// Matrices with incompatible logical shapes were given to an operation.
    ShapeMismatch {
        /// Operation that rejected the shapes (e.g. `"multiply"`).
        op: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// An operation was invoked in the wrong lifecycle state, e.g. `backward`
    /// before `forward`, or `step` on an unbound optimizer.
    State(&'static str),
    /// File open/read/write failure during serialization.
    Io(io::Error),
    /// Bad magic, unsupported version, unknown layer type, or tensor
    /// dimensions that do not match the expected layer shape on load.
    Format(String),
    /// A buffer of `rows * cols` elements cannot be represented.
    Allocation { rows: usize, cols: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShapeMismatch {
                op,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch in {}: expected {}x{}, got {}x{}",
                op, expected.0, expected.1, actual.0, actual.1
            ),
            Error::State(msg) => write!(f, "invalid state: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Format(msg) => write!(f, "format error: {msg}"),
            Error::Allocation { rows, cols } => {
                write!(f, "cannot allocate a {rows}x{cols} matrix")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shape_mismatch() {
        let err = Error::ShapeMismatch {
            op: "add",
            expected: (2, 3),
            actual: (3, 2),
        };
        assert_eq!(err.to_string(), "shape mismatch in add: expected 2x3, got 3x2");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
    }
}
