//! Error types for the CALDERA library

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalderaError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Sparse matrix error: {0}")]
    SparseMatrix(String),

    #[error("No contact matrix for {0}")]
    MissingMatrix(String),

    #[error("No {scheme} normalization vector for {chrom} at {resolution} bp")]
    MissingNormVector {
        scheme: String,
        chrom: String,
        resolution: u32,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Empty data: {0}")]
    EmptyData(String),
}

pub type Result<T, E = CalderaError> = std::result::Result<T, E>;

impl From<nalgebra_sparse::SparseFormatError> for CalderaError {
    fn from(err: nalgebra_sparse::SparseFormatError) -> Self {
        CalderaError::SparseMatrix(format!("Sparse format error: {:?}", err))
    }
}

/// Returns `true` if the error originated from a broken pipe.
#[inline]
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.root_cause()
        .downcast_ref::<io::Error>()
        .map(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
        .unwrap_or(false)
}
