//! Reader for the `fvecs` binary vector format.
//!
//! A file is a plain sequence of records, each one a little-endian `i32`
//! dimension followed by that many little-endian `f32` components. There is
//! no header, trailer or padding.

use crate::collection::VectorCollection;
use crate::error::{Result, VecError};
use log::debug;
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

/// Default number of records decoded per batch.
pub const DEFAULT_READ_BATCH_SIZE: usize = 1024;

/// Batched decoder over any byte stream.
pub struct FvecsReader<R> {
    reader: R,
    source: PathBuf,
    batch_size: usize,
    record: usize,
}

impl<R: Read> FvecsReader<R> {
    /// Wraps a byte stream. `batch_size` must be at least 1.
    pub fn new(reader: R, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(VecError::InvalidConfig {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(FvecsReader {
            reader,
            source: PathBuf::from("<stream>"),
            batch_size,
            record: 0,
        })
    }

    /// Names the stream in error messages.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Number of records decoded so far.
    pub fn records_read(&self) -> usize {
        self.record
    }

    /// Decodes up to `batch_size` records. An empty batch means end of stream.
    pub fn next_batch(&mut self) -> Result<Vec<Vec<f32>>> {
        let mut batch = Vec::with_capacity(self.batch_size.min(DEFAULT_READ_BATCH_SIZE));
        while batch.len() < self.batch_size {
            match self.read_record()? {
                Some(vector) => batch.push(vector),
                None => break,
            }
        }
        Ok(batch)
    }

    fn read_record(&mut self) -> Result<Option<Vec<f32>>> {
        let mut prefix = [0u8; 4];
        let filled = self.fill(&mut prefix)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < prefix.len() {
            return Err(self.corrupt(format!(
                "length prefix cut short after {} of 4 bytes",
                filled
            )));
        }

        let dim = i32::from_le_bytes(prefix);
        if dim < 0 {
            return Err(self.corrupt(format!("negative dimension {}", dim)));
        }

        // `take` bounds the allocation by the bytes actually present, so a
        // garbage prefix cannot reserve gigabytes up front.
        let expected = dim as u64 * 4;
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(expected)
            .read_to_end(&mut payload)
            .map_err(|e| VecError::io(&self.source, e))?;
        if (payload.len() as u64) < expected {
            return Err(self.corrupt(format!(
                "declared dimension {} needs {} bytes but only {} remain",
                dim,
                expected,
                payload.len()
            )));
        }

        let vector = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        self.record += 1;
        Ok(Some(vector))
    }

    /// Reads until `buf` is full or the stream ends; returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(VecError::io(&self.source, e)),
            }
        }
        Ok(filled)
    }

    fn corrupt(&self, detail: String) -> VecError {
        VecError::CorruptInput {
            path: self.source.clone(),
            record: self.record,
            detail,
        }
    }
}

/// Reads a whole fvecs file into memory, decoding `batch_size` records at a time.
///
/// # Examples
///
/// ```no_run
/// use vecscan::fvecs::read_fvecs;
///
/// let collection = read_fvecs("sift_base.fvecs", 1024).unwrap();
/// println!("{} vectors", collection.len());
/// ```
pub fn read_fvecs(path: impl AsRef<Path>, batch_size: usize) -> Result<VectorCollection> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VecError::io(path, e))?;
    let mut reader = FvecsReader::new(BufReader::new(file), batch_size)?.with_source(path);

    let mut collection = VectorCollection::new();
    loop {
        let batch = reader.next_batch()?;
        if batch.is_empty() {
            break;
        }
        debug!("decoded batch of {} records from {}", batch.len(), path.display());
        for vector in batch {
            collection.push(vector)?;
        }
    }

    Ok(collection)
}

/// Writes vectors in fvecs layout, replacing `path`.
pub fn write_fvecs<'a, I>(path: impl AsRef<Path>, vectors: I) -> Result<()>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| VecError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    for vector in vectors {
        let dim = i32::try_from(vector.len()).map_err(|_| VecError::InvalidConfig {
            field: "dimension",
            reason: format!("{} does not fit an i32 length prefix", vector.len()),
        })?;
        writer.write_all(&dim.to_le_bytes()).map_err(|e| VecError::io(path, e))?;
        for value in vector {
            writer.write_all(&value.to_le_bytes()).map_err(|e| VecError::io(path, e))?;
        }
    }

    writer.flush().map_err(|e| VecError::io(path, e))
}

#[cfg(test)]
mod fvecs_test {
    use super::*;
    use std::io::Cursor;

    fn encode(records: &[&[f32]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for record in records {
            bytes.extend((record.len() as i32).to_le_bytes());
            for value in record.iter() {
                bytes.extend(value.to_le_bytes());
            }
        }
        bytes
    }

    fn read_all(bytes: Vec<u8>, batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut reader = FvecsReader::new(Cursor::new(bytes), batch_size)?;
        let mut out = Vec::new();
        loop {
            let batch = reader.next_batch()?;
            if batch.is_empty() {
                return Ok(out);
            }
            out.extend(batch);
        }
    }

    #[test]
    fn test_reads_two_records() {
        let bytes = encode(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let vectors = read_all(bytes, 1024).unwrap();

        assert_eq!(vectors, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_empty_stream_is_empty() {
        let vectors = read_all(Vec::new(), 4).unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_batches_respect_batch_size() {
        let rows: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, -(i as f32)]).collect();
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        let mut reader = FvecsReader::new(Cursor::new(encode(&refs)), 2).unwrap();

        assert_eq!(reader.next_batch().unwrap().len(), 2);
        assert_eq!(reader.next_batch().unwrap().len(), 2);
        assert_eq!(reader.next_batch().unwrap().len(), 1);
        assert!(reader.next_batch().unwrap().is_empty());
        assert_eq!(reader.records_read(), 5);
    }

    #[test]
    fn test_batch_size_does_not_change_result() {
        let rows: Vec<Vec<f32>> = (0..37).map(|i| vec![i as f32 * 0.5; 3]).collect();
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        let bytes = encode(&refs);

        let reference = read_all(bytes.clone(), 1).unwrap();
        for batch_size in [2, 5, 36, 37, 1024] {
            assert_eq!(read_all(bytes.clone(), batch_size).unwrap(), reference);
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = FvecsReader::new(Cursor::new(Vec::new()), 0);
        assert!(matches!(result, Err(VecError::InvalidConfig { field: "batch_size", .. })));
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let mut bytes = encode(&[&[1.0, 2.0, 3.0]]);
        bytes.extend(3i32.to_le_bytes());
        bytes.extend(4.0f32.to_le_bytes()); // only 1 of 3 floats

        match read_all(bytes, 8) {
            Err(VecError::CorruptInput { record, detail, .. }) => {
                assert_eq!(record, 1);
                assert!(detail.contains("only 4 remain"));
            }
            other => panic!("Expected corrupt input, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_prefix_is_corrupt() {
        let mut bytes = encode(&[&[1.0]]);
        bytes.extend([3u8, 0]);

        assert!(matches!(read_all(bytes, 8), Err(VecError::CorruptInput { record: 1, .. })));
    }

    #[test]
    fn test_negative_dimension_is_corrupt() {
        let bytes = (-1i32).to_le_bytes().to_vec();
        match read_all(bytes, 8) {
            Err(VecError::CorruptInput { detail, .. }) => assert!(detail.contains("negative")),
            other => panic!("Expected corrupt input, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_dimension_record() {
        let bytes = encode(&[&[], &[]]);
        assert_eq!(read_all(bytes, 8).unwrap(), vec![Vec::<f32>::new(), Vec::new()]);
    }

    #[test]
    fn test_read_fvecs_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.fvecs");
        std::fs::write(&path, encode(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]])).unwrap();

        let collection = read_fvecs(&path, 1).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(collection.get(1), Some(&[4.0, 5.0, 6.0][..]));
    }

    #[test]
    fn test_read_fvecs_mixed_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.fvecs");
        std::fs::write(&path, encode(&[&[1.0, 2.0], &[1.0, 2.0, 3.0]])).unwrap();

        assert!(matches!(
            read_fvecs(&path, 16),
            Err(VecError::InconsistentDimension { record: 1, expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_read_fvecs_missing_file() {
        match read_fvecs("definitely_missing.fvecs", 16) {
            Err(VecError::FileNotFound { path }) => {
                assert_eq!(path, PathBuf::from("definitely_missing.fvecs"))
            }
            other => panic!("Expected file not found, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_fvecs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("written.fvecs");
        let rows = vec![vec![0.5f32, -1.25], vec![3.0, f32::MAX]];

        write_fvecs(&path, rows.iter().map(|r| r.as_slice())).unwrap();
        let collection = read_fvecs(&path, 1024).unwrap();

        let decoded: Vec<Vec<f32>> = collection.iter().map(|v| v.to_vec()).collect();
        assert_eq!(decoded, rows);
    }
}
