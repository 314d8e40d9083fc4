//! The persisted store module
//! Write-once, read-many on-disk form of a [`VectorCollection`].
//!
//! Layout, all little-endian:
//!
//! ```text
//! +-----------------------------------------------+
//! | StoreHeader (bincode, 18 bytes)               |
//! |   magic: b"VSTR" | version: u16               |
//! |   dimension: u32 | count: u64                 |
//! +-----------------------------------------------+
//! | count * dimension f32 values, row-major       |
//! +-----------------------------------------------+
//! ```
//!
//! Rows have a fixed size, so [`StoreReader`] streams chunks straight from
//! disk without materializing the whole collection.

use crate::collection::VectorCollection;
use crate::error::{Result, VecError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

pub const STORE_MAGIC: [u8; 4] = *b"VSTR";
pub const STORE_VERSION: u16 = 1;
/// Extension given to stores derived from an input path.
pub const STORE_EXTENSION: &str = "vstore";
/// Default number of rows per chunk handed to the search engine.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

const HEADER_LEN: u64 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct StoreHeader {
    magic: [u8; 4],
    version: u16,
    dimension: u32,
    count: u64,
}

/// Replaces the extension of `input` with the store extension.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use vecscan::store::store_path_for;
///
/// assert_eq!(
///     store_path_for("../datasets/sift/sift_base.fvecs"),
///     PathBuf::from("../datasets/sift/sift_base.vstore")
/// );
/// ```
pub fn store_path_for(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension(STORE_EXTENSION)
}

/// Saves a collection to `path`, replacing any existing store.
///
/// The bytes go to a sibling `.tmp` file which is renamed over `path` once
/// fully flushed.
pub fn write_store(collection: &VectorCollection, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dimension = collection.dimension().unwrap_or(0);
    let header = StoreHeader {
        magic: STORE_MAGIC,
        version: STORE_VERSION,
        dimension: u32::try_from(dimension).map_err(|_| VecError::InvalidConfig {
            field: "dimension",
            reason: format!("{} exceeds the store limit", dimension),
        })?,
        count: collection.len() as u64,
    };

    let tmp = tmp_path(path);
    if let Err(e) = write_to(&tmp, &header, collection) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| VecError::io(path, e))?;

    info!(
        "wrote {} vectors of dimension {} to {}",
        header.count,
        header.dimension,
        path.display()
    );
    Ok(())
}

fn write_to(tmp: &Path, header: &StoreHeader, collection: &VectorCollection) -> Result<()> {
    let file = File::create(tmp).map_err(|e| VecError::io(tmp, e))?;
    let mut writer = BufWriter::new(file);

    bincode::serialize_into(&mut writer, header)?;
    for value in collection.as_flat() {
        writer.write_all(&value.to_le_bytes()).map_err(|e| VecError::io(tmp, e))?;
    }

    let file = writer.into_inner().map_err(|e| VecError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| VecError::io(tmp, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Loads a whole store back into memory.
pub fn load_store(path: impl AsRef<Path>) -> Result<VectorCollection> {
    let reader = StoreReader::open(path, DEFAULT_CHUNK_SIZE)?;
    let dimension = reader.dimension();
    let len = reader.len();

    let mut vectors = Vec::with_capacity(dimension * len);
    for chunk in reader {
        vectors.extend(chunk?.data);
    }

    Ok(VectorCollection::from_flat(dimension, vectors, len))
}

/// A contiguous block of rows read from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    first_id: usize,
    dimension: usize,
    len: usize,
    data: Vec<f32>,
}

impl Chunk {
    /// Identifier of the first row, `chunk_index * chunk_size`.
    pub fn first_id(&self) -> usize {
        self.first_id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row `j` of this chunk, i.e. vector `first_id + j`.
    pub fn row(&self, j: usize) -> &[f32] {
        let start = j * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// `(identifier, row)` pairs in order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[f32])> + '_ {
        (0..self.len).map(move |j| (self.first_id + j, self.row(j)))
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

/// Lazy, finite sequence of [`Chunk`]s over one store file.
///
/// Not resumable: re-open the store to iterate again. Once an error is
/// yielded the iterator is exhausted.
pub struct StoreReader {
    reader: BufReader<File>,
    path: PathBuf,
    dimension: usize,
    len: usize,
    chunk_size: usize,
    next_id: usize,
}

impl StoreReader {
    /// Opens `path` and validates its header against the file size.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<StoreReader> {
        let path = path.as_ref();
        if chunk_size == 0 {
            return Err(VecError::InvalidConfig {
                field: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }

        let file = File::open(path).map_err(|e| VecError::io(path, e))?;
        let file_len = file.metadata().map_err(|e| VecError::io(path, e))?.len();
        let mut reader = BufReader::new(file);

        let corrupted = |detail: String| VecError::StoreCorrupted {
            path: path.to_path_buf(),
            detail,
        };

        if file_len < HEADER_LEN {
            return Err(corrupted(format!("{} bytes is shorter than the header", file_len)));
        }
        let header: StoreHeader = bincode::deserialize_from(&mut reader)
            .map_err(|e| corrupted(format!("unreadable header: {}", e)))?;

        if header.magic != STORE_MAGIC {
            return Err(corrupted(format!("bad magic {:?}", header.magic)));
        }
        if header.version != STORE_VERSION {
            return Err(VecError::StoreVersionMismatch {
                expected: STORE_VERSION,
                found: header.version,
            });
        }

        let expected_len = header
            .count
            .checked_mul(header.dimension as u64)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| corrupted("header sizes overflow".to_string()))?;
        if expected_len != file_len {
            return Err(corrupted(format!(
                "header declares {} bytes but file has {}",
                expected_len, file_len
            )));
        }

        let len = usize::try_from(header.count)
            .map_err(|_| corrupted(format!("{} vectors exceed addressable memory", header.count)))?;

        debug!(
            "opened store {} ({} vectors, dimension {}, chunk size {})",
            path.display(),
            len,
            header.dimension,
            chunk_size
        );

        Ok(StoreReader {
            reader,
            path: path.to_path_buf(),
            dimension: header.dimension as usize,
            len,
            chunk_size,
            next_id: 0,
        })
    }

    /// Dimension of every stored vector (0 for an empty store).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of stored vectors.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_chunk(&mut self) -> Result<Chunk> {
        let rows = self.chunk_size.min(self.len - self.next_id);
        let mut bytes = vec![0u8; rows * self.dimension * 4];
        self.reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => VecError::StoreCorrupted {
                path: self.path.clone(),
                detail: format!("body ends inside chunk starting at {}", self.next_id),
            },
            _ => VecError::io(&self.path, e),
        })?;

        let data = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let chunk = Chunk {
            first_id: self.next_id,
            dimension: self.dimension,
            len: rows,
            data,
        };
        self.next_id += rows;
        Ok(chunk)
    }
}

impl Iterator for StoreReader {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id >= self.len {
            return None;
        }
        let chunk = self.read_chunk();
        if chunk.is_err() {
            self.next_id = self.len;
        }
        Some(chunk)
    }
}
