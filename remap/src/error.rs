use thiserror::Error;

/// Errors returned by remap operations.
#[derive(Error, Debug)]
pub enum RemapError {
    #[error("gtremap: {0}")]
    Io(#[from] std::io::Error),

    #[error("gtremap: hdf5: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("gtremap: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("gtremap: invalid dimension {0}")]
    InvalidDimension(usize),

    #[error("gtremap: invalid format: {0}")]
    InvalidFormat(String),

    #[error("gtremap: invalid config: {0}")]
    InvalidConfig(String),

    #[error("gtremap: neighbors[{row}][{col}] = {value} is outside train (len {len})")]
    NeighborOutOfRange {
        row: usize,
        col: usize,
        value: i32,
        len: usize,
    },

    #[error("gtremap: neighbors[{row}][{col}] refers to unmapped train position {position}")]
    Unmapped {
        row: usize,
        col: usize,
        position: usize,
    },

    #[error("gtremap: index position {0} does not fit in i32")]
    IdOverflow(usize),
}

/// Result alias for remap operations.
pub type Result<T> = std::result::Result<T, RemapError>;
