//! This is the vector math module
//! Provide Euclidean distance between two vectors

use crate::error::{Result, VecError};

/// Euclidean Distance
/// dist = sqrt(sum((a[i] - b[i])^2)) for i = 0..a.len()
/// Can only process vectors with same dimensions
pub fn euclidean_distance(left: &[f32], right: &[f32]) -> Result<f32> {
    if left.len() != right.len() {
        return Err(VecError::DimensionMismatch {
            expected: left.len(),
            found: right.len(),
        });
    }

    Ok(squared_euclidean(left, right).sqrt())
}

/// Sum of squared component differences, no length check.
/// Callers must already have verified `left.len() == right.len()`.
pub(crate) fn squared_euclidean(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
