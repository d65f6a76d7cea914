/// Packed bitmap, used as the validity mask for arrays.
///
/// A set bit means the value at that position is valid (not null).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitmap {
    len: usize,
    data: Vec<u8>,
}

impl Bitmap {
    pub fn new_with_all_true(len: usize) -> Self {
        let mut bitmap = Bitmap {
            len,
            data: vec![u8::MAX; len.div_ceil(8)],
        };
        bitmap.clear_trailing();
        bitmap
    }

    pub fn new_with_all_false(len: usize) -> Self {
        Bitmap {
            len,
            data: vec![0; len.div_ceil(8)],
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Bitmap {
            len: 0,
            data: Vec::with_capacity(cap.div_ceil(8)),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the value at `idx`.
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn value(&self, idx: usize) -> bool {
        assert!(idx < self.len, "bitmap index {idx} out of bounds ({})", self.len);
        self.data[idx / 8] & (1 << (idx % 8)) != 0
    }

    /// Set the value at `idx`.
    ///
    /// Panics if `idx` is out of bounds.
    pub fn set(&mut self, idx: usize, val: bool) {
        assert!(idx < self.len, "bitmap index {idx} out of bounds ({})", self.len);
        let mask = 1 << (idx % 8);
        if val {
            self.data[idx / 8] |= mask;
        } else {
            self.data[idx / 8] &= !mask;
        }
    }

    pub fn push(&mut self, val: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, val);
    }

    /// Number of set bits.
    pub fn count_trues(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn all_true(&self) -> bool {
        self.count_trues() == self.len
    }

    pub fn iter(&self) -> BitmapIter<'_> {
        BitmapIter {
            bitmap: self,
            idx: 0,
        }
    }

    /// Bitwise AND with another bitmap of the same length.
    pub fn bit_and(&self, other: &Bitmap) -> Bitmap {
        debug_assert_eq!(self.len, other.len);
        Bitmap {
            len: self.len,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    /// Zero any bits past `len` in the last byte so that `count_trues` and
    /// equality only look at logical bits.
    fn clear_trailing(&mut self) {
        let rem = self.len % 8;
        if rem != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= (1u8 << rem) - 1;
            }
        }
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut bitmap = Bitmap::with_capacity(iter.size_hint().0);
        for v in iter {
            bitmap.push(v);
        }
        bitmap
    }
}

impl Extend<bool> for Bitmap {
    fn extend<T: IntoIterator<Item = bool>>(&mut self, iter: T) {
        for v in iter {
            self.push(v);
        }
    }
}

#[derive(Debug)]
pub struct BitmapIter<'a> {
    bitmap: &'a Bitmap,
    idx: usize,
}

impl Iterator for BitmapIter<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.bitmap.len {
            return None;
        }
        let v = self.bitmap.value(self.idx);
        self.idx += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.bitmap.len - self.idx;
        (rem, Some(rem))
    }
}

impl ExactSizeIterator for BitmapIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_true_trailing_bits() {
        let bitmap = Bitmap::new_with_all_true(10);
        assert_eq!(10, bitmap.count_trues());
        assert!(bitmap.all_true());
        assert_eq!(Bitmap::from_iter(std::iter::repeat_n(true, 10)), bitmap);
    }

    #[test]
    fn set_and_get() {
        let mut bitmap = Bitmap::new_with_all_false(9);
        bitmap.set(8, true);
        bitmap.set(3, true);
        bitmap.set(3, false);

        let got: Vec<_> = bitmap.iter().collect();
        let mut expected = vec![false; 9];
        expected[8] = true;
        assert_eq!(expected, got);
    }

    #[test]
    fn bit_and() {
        let a = Bitmap::from_iter([true, true, false, true]);
        let b = Bitmap::from_iter([true, false, false, true]);
        assert_eq!(Bitmap::from_iter([true, false, false, true]), a.bit_and(&b));
    }
}
