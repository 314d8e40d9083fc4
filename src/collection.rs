//! The collection module
//! Ordered, append-only storage for fixed-dimension vectors

use crate::error::{Result, VecError};

/// An ordered sequence of vectors sharing one dimensionality.
///
/// A vector's identifier is its position in insertion order. Components are
/// kept in one flat row-major array: `[v0_d0, v0_d1, ..., v1_d0, v1_d1, ...]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorCollection {
    vectors: Vec<f32>,
    dimension: Option<usize>,
    len: usize,
}

impl VectorCollection {
    /// Creates an empty collection.
    ///
    /// The dimension is fixed by the first vector pushed.
    ///
    /// # Examples
    ///
    /// ```
    /// use vecscan::VectorCollection;
    ///
    /// let collection = VectorCollection::new();
    /// assert!(collection.is_empty());
    /// assert_eq!(collection.dimension(), None);
    /// ```
    pub fn new() -> VectorCollection {
        VectorCollection { vectors: Vec::new(), dimension: None, len: 0 }
    }

    /// Builds a collection from owned vectors, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use vecscan::VectorCollection;
    ///
    /// let collection = VectorCollection::from_vectors(vec![
    ///     vec![1.0, 2.0, 3.0],
    ///     vec![4.0, 5.0, 6.0],
    /// ]).unwrap();
    /// assert_eq!(collection.len(), 2);
    /// assert_eq!(collection.get(1), Some(&[4.0, 5.0, 6.0][..]));
    ///
    /// // Rows must share a dimension
    /// assert!(VectorCollection::from_vectors(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    /// ```
    pub fn from_vectors<I>(vectors: I) -> Result<VectorCollection>
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let mut collection = VectorCollection::new();
        for vector in vectors {
            collection.push(vector)?;
        }
        Ok(collection)
    }

    /// Rebuilds a collection from a flat row-major block.
    pub(crate) fn from_flat(dimension: usize, vectors: Vec<f32>, len: usize) -> VectorCollection {
        debug_assert_eq!(vectors.len(), dimension * len);
        if len == 0 {
            return VectorCollection::new();
        }
        VectorCollection { vectors, dimension: Some(dimension), len }
    }

    /// Appends a vector and returns its identifier.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Zero-based identifier of the new vector
    /// * `Err(VecError::InconsistentDimension)` - The vector's length differs
    ///   from the collection's dimension
    pub fn push(&mut self, vector: Vec<f32>) -> Result<usize> {
        let dim = vector.len();
        match self.dimension {
            None => {
                self.dimension = Some(dim);
            }
            Some(d) => {
                if dim != d {
                    return Err(VecError::InconsistentDimension {
                        record: self.len,
                        expected: d,
                        found: dim,
                    });
                }
            }
        }

        self.vectors.extend(vector);
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Retrieves a vector by identifier.
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        if index >= self.len {
            return None;
        }
        Some(self.get_vector(index))
    }

    /// Iterates vectors in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.len).map(move |i| self.get_vector(i))
    }

    /// Number of vectors in the collection.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shared dimensionality, `None` while the collection is empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// All components, row-major.
    pub fn as_flat(&self) -> &[f32] {
        &self.vectors
    }

    /// Slices the flat array at `index`. Works for zero-dimension rows too.
    fn get_vector(&self, index: usize) -> &[f32] {
        let dim = self.dimension.unwrap_or(0);
        let start = index * dim;
        &self.vectors[start..start + dim]
    }
}
