//! Error type shared by the converter, the store and the search engine.

use std::io;
use std::path::{Path, PathBuf};

/// Every failure the core can report. Nothing here is retried: each variant
/// is terminal for the current convert or search invocation.
#[derive(Debug, thiserror::Error)]
pub enum VecError {
    /// The input or store file does not exist.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Any other I/O failure while reading or writing `path`.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record of the fvecs input is truncated or has an invalid length prefix.
    #[error("Corrupt input {path} at record {record}: {detail}")]
    CorruptInput {
        path: PathBuf,
        record: usize,
        detail: String,
    },

    /// A vector does not share the dimensionality of the collection it joins.
    #[error(
        "Inconsistent dimension at record {record}: collection has {expected}, record has {found}"
    )]
    InconsistentDimension {
        record: usize,
        expected: usize,
        found: usize,
    },

    /// Query dimensionality differs from the stored vectors.
    #[error("Dimension mismatch: store has {expected}-dim vectors, query has {found}-dim")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Store corrupted at {path}: {detail}")]
    StoreCorrupted { path: PathBuf, detail: String },

    #[error("Store version mismatch: expected v{expected}, found v{found}")]
    StoreVersionMismatch { expected: u16, found: u16 },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid config for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Query text could not be turned into a vector.
    #[error("Cannot parse query '{input}': {reason}")]
    QueryParse { input: String, reason: String },
}

pub type Result<T> = std::result::Result<T, VecError>;

impl VecError {
    /// Wraps an I/O error, promoting `NotFound` to its own variant.
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            VecError::FileNotFound { path: path.to_path_buf() }
        } else {
            VecError::Io { path: path.to_path_buf(), source }
        }
    }
}
