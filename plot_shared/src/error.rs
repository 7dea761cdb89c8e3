//! Error types.
//!
//! Nothing here is fatal: scene errors reject a single input and keep the
//! previous state, evaluation errors become NaN grid nodes, and persistence
//! errors leave the in-memory scene untouched.

use thiserror::Error;

/// Rejected scene mutation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("invalid range: min {min} must be below max {max}")]
    InvalidRange { min: f64, max: f64 },
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },
    #[error("field of view {0} is outside (0, 180) degrees")]
    InvalidFov(f64),
    #[error("grid divisions {u}x{v} outside {min}..={max}")]
    InvalidGrid {
        u: usize,
        v: usize,
        min: usize,
        max: usize,
    },
    #[error("no function at index {index} (have {len})")]
    NoSuchFunction { index: usize, len: usize },
    #[error("no axis at index {0}")]
    NoSuchAxis(usize),
    #[error("viewport {width}x{height} must be non-empty")]
    EmptyViewport { width: u32, height: u32 },
    #[error("camera basis is degenerate")]
    DegenerateCamera,
    #[error("grid of histogram `{0}` follows its bins")]
    HistogramGrid(String),
    #[error("histogram grid needs at least 2x2 bins, got {rows}x{cols}")]
    BinGridTooSmall { rows: usize, cols: usize },
}

/// Failure evaluating a function definition at one grid node.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("could not parse `{statement}`: {reason}")]
    Parse { statement: String, reason: String },
    #[error("could not evaluate `{statement}`: {reason}")]
    Evaluate { statement: String, reason: String },
    #[error("`{name}` evaluated to a non-finite value")]
    NonFinite { name: String },
}

/// Scene load/save failure.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("bad signature {found:#010x}, expected {expected:#010x}")]
    BadSignature { found: u32, expected: u32 },
    #[error("stream ended while reading {0}")]
    Truncated(&'static str),
    #[error("string field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("string too long to encode ({0} bytes)")]
    StringTooLong(usize),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("{0} trailing bytes after scene")]
    TrailingBytes(usize),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}
