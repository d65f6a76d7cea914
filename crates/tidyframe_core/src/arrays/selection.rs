use std::ops::Range;

/// An ordered list of row indices to pick out of a table or array.
///
/// Indices may repeat and may be out of order. Used for filter (kept rows),
/// arrange (sorted permutation) and grouping (partition rows).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionVector {
    indices: Vec<usize>,
}

impl SelectionVector {
    pub const fn empty() -> Self {
        SelectionVector {
            indices: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        SelectionVector {
            indices: Vec::with_capacity(cap),
        }
    }

    /// Create a selection vector with a linear mapping to a range of rows.
    pub fn with_range(range: Range<usize>) -> Self {
        SelectionVector {
            indices: range.collect(),
        }
    }

    pub fn get(&self, idx: usize) -> Option<usize> {
        self.indices.get(idx).copied()
    }

    pub fn iter_locations(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn num_rows(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn push_location(&mut self, location: usize) {
        self.indices.push(location)
    }

    /// Compute the inverse of a permutation.
    ///
    /// If this selection is a permutation of `0..n`, then
    /// `OUT[SELF[IDX]] = IDX`. Returns None if it isn't a permutation.
    pub fn invert(&self) -> Option<SelectionVector> {
        let mut out = vec![usize::MAX; self.indices.len()];
        for (idx, &loc) in self.indices.iter().enumerate() {
            let slot = out.get_mut(loc)?;
            if *slot != usize::MAX {
                return None;
            }
            *slot = idx;
        }
        Some(SelectionVector { indices: out })
    }
}

impl FromIterator<usize> for SelectionVector {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        SelectionVector {
            indices: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<usize>> for SelectionVector {
    fn from(indices: Vec<usize>) -> Self {
        SelectionVector { indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_permutation() {
        let perm = SelectionVector::from_iter([2, 0, 1]);
        let inv = perm.invert().unwrap();
        assert_eq!(SelectionVector::from_iter([1, 2, 0]), inv);
        for idx in 0..3 {
            assert_eq!(Some(idx), inv.get(perm.get(idx).unwrap()));
        }
    }

    #[test]
    fn invert_not_permutation() {
        assert_eq!(None, SelectionVector::from_iter([0, 0]).invert());
        assert_eq!(None, SelectionVector::from_iter([0, 5]).invert());
    }
}
