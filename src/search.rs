//! Exact k-nearest-neighbor search over a persisted store.
//!
//! Every stored vector is compared against the query (full scan). The best
//! `k` candidates are kept in a bounded max-heap, so memory stays O(k) no
//! matter how large the store is.

use crate::error::{Result, VecError};
use crate::store::StoreReader;
use crate::vector::squared_euclidean;
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Default number of neighbors returned.
pub const DEFAULT_K: usize = 10;

/// One search hit: identifier plus its Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Heap entry ordered by `(distance, id)`.
///
/// `BinaryHeap` is a max-heap, so the top is always the worst candidate kept.
/// Equal distances rank the larger identifier as worse, which makes ties
/// resolve to ascending identifier.
#[derive(Debug, Clone, Copy)]
struct Candidate(Neighbor);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .total_cmp(&other.0.distance)
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

/// Bounded accumulator of the `k` smallest `(distance, id)` pairs.
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    pub fn new(k: usize) -> TopK {
        TopK { k, heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)) }
    }

    /// Offers a candidate; it is kept only if it beats the current worst.
    ///
    /// Every NaN is canonicalized to positive `f32::NAN`, which `total_cmp`
    /// ranks above all real distances, so NaN never beats a real number
    /// whatever its sign bit.
    pub fn offer(&mut self, id: usize, distance: f32) {
        if self.k == 0 {
            return;
        }
        let distance = if distance.is_nan() { f32::NAN } else { distance };
        let candidate = Candidate(Neighbor { id, distance });
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate < *worst {
                *worst = candidate;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Kept candidates, ascending by distance then identifier.
    pub fn into_sorted(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec().into_iter().map(|c| c.0).collect()
    }
}

/// Scans every chunk of `reader` and returns the `k` nearest neighbors of
/// `query` with their distances.
///
/// # Returns
///
/// * `Ok(Vec<Neighbor>)` - At most `k` hits sorted by ascending distance,
///   ties by ascending identifier. Empty for an empty store.
/// * `Err(VecError::DimensionMismatch)` - Query length differs from the
///   stored vectors; checked before any distance is computed.
pub fn search_with_distances(
    query: &[f32],
    reader: StoreReader,
    k: usize,
) -> Result<Vec<Neighbor>> {
    if reader.is_empty() {
        return Ok(Vec::new());
    }
    if reader.dimension() != query.len() {
        return Err(VecError::DimensionMismatch {
            expected: reader.dimension(),
            found: query.len(),
        });
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    debug!(
        "scanning {} in chunks of {}",
        reader.path().display(),
        reader.chunk_size()
    );
    let mut top = TopK::new(k);
    let mut chunks = 0usize;
    for chunk in reader {
        let chunk = chunk?;
        for (id, row) in chunk.rows() {
            top.offer(id, squared_euclidean(query, row).sqrt());
        }
        chunks += 1;
    }

    debug!("scanned {} chunks, kept {} of k={}", chunks, top.len(), k);
    Ok(top.into_sorted())
}

/// Same as [`search_with_distances`] but returns identifiers only.
pub fn search_store(query: &[f32], reader: StoreReader, k: usize) -> Result<Vec<usize>> {
    Ok(search_with_distances(query, reader, k)?
        .into_iter()
        .map(|n| n.id)
        .collect())
}
