//! # vecscan - Exact nearest-neighbor search over fvecs datasets
//!
//! vecscan converts `fvecs` files (length-prefixed `f32` records) into a
//! compact store once, then answers exact k-nearest-neighbor queries by
//! streaming that store in bounded chunks and ranking every vector by
//! Euclidean distance. Identifiers are zero-based positions in the
//! original file; ties are broken by ascending identifier.
//!
//! ## Example
//!
//! ```
//! use vecscan::{fvecs, search, convert};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let input = dir.path().join("points.fvecs");
//! let rows: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![5.0, 5.0]];
//! fvecs::write_fvecs(&input, rows.iter().map(|r| r.as_slice())).unwrap();
//!
//! // Convert once
//! let store = convert(&input, 1024).unwrap();
//!
//! // Query many times
//! let ids = search(&[0.0, 0.0], &store, 2).unwrap();
//! assert_eq!(ids, vec![0, 1]);
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod fvecs;
pub mod search;
pub mod server;
pub mod store;
pub mod vector;

pub use collection::VectorCollection;
pub use config::EngineConfig;
pub use error::{Result, VecError};
pub use search::Neighbor;

use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use store::{DEFAULT_CHUNK_SIZE, StoreReader};

/// Outcome of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub count: usize,
    pub dimension: Option<usize>,
}

/// Converts an fvecs file into a store next to it, with the extension
/// replaced by `vstore`. Returns the store path.
pub fn convert(input: impl AsRef<Path>, batch_size: usize) -> Result<PathBuf> {
    let output = store::store_path_for(input.as_ref());
    convert_to(input, output, batch_size).map(|summary| summary.output)
}

/// Converts an fvecs file into a store at an explicit location.
///
/// The input is fully decoded before anything is written, so a corrupt
/// input never leaves a partial store behind.
pub fn convert_to(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    batch_size: usize,
) -> Result<ConvertSummary> {
    let input = input.as_ref();
    let output = output.as_ref();

    let collection = fvecs::read_fvecs(input, batch_size)?;
    store::write_store(&collection, output)?;

    info!(
        "converted {} ({} vectors) into {}",
        input.display(),
        collection.len(),
        output.display()
    );

    Ok(ConvertSummary {
        output: output.to_path_buf(),
        count: collection.len(),
        dimension: collection.dimension(),
    })
}

/// Returns the identifiers of the `k` vectors in the store nearest to
/// `query`, closest first.
pub fn search(query: &[f32], store_path: impl AsRef<Path>, k: usize) -> Result<Vec<usize>> {
    search_with(query, store_path, k, DEFAULT_CHUNK_SIZE)
}

/// Like [`search`] with an explicit chunk size.
pub fn search_with(
    query: &[f32],
    store_path: impl AsRef<Path>,
    k: usize,
    chunk_size: usize,
) -> Result<Vec<usize>> {
    let reader = StoreReader::open(store_path, chunk_size)?;
    search::search_store(query, reader, k)
}
