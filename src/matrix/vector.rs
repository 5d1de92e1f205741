//! Sparse vector.

/// Sparse vector of logical length `len` holding `(index, value)` pairs
/// sorted by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    len: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Empty vector of logical length `len`.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from entries that are already sorted by index and unique.
    pub(crate) fn from_sorted(len: usize, indices: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self { len, indices, values }
    }

    /// Build from entries in any order; duplicate indices are summed.
    pub fn from_entries(len: usize, mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_by_key(|&(i, _)| i);
        let mut indices: Vec<usize> = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        for (i, v) in entries {
            if indices.last() == Some(&i) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                indices.push(i);
                values.push(v);
            }
        }
        Self { len, indices, values }
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Value at `i`; zero when no entry is stored.
    pub fn get(&self, i: usize) -> f64 {
        match self.indices.binary_search(&i) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over stored `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Expand to a dense vector.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.len];
        for (i, v) in self.iter() {
            dense[i] = v;
        }
        dense
    }
}
