//! Bit fields packed into 64-bit words, and their dataset storage form.

use crate::mdarray::{MDArray, ShapeError};

const ADDRESS_BITS_PER_WORD: usize = 6;
const BITS_PER_WORD: usize = 1 << ADDRESS_BITS_PER_WORD;
const BIT_INDEX_MASK: usize = BITS_PER_WORD - 1;

/// Given a bit index, returns the index of the word containing it.
#[inline]
pub const fn word_index(bit: usize) -> usize {
    bit >> ADDRESS_BITS_PER_WORD
}

/// Given a bit index, returns the mask of that bit within its word.
#[inline]
pub const fn bit_mask_in_word(bit: usize) -> u64 {
    1 << (bit & BIT_INDEX_MASK)
}

/// A set of bits stored LSB-first in 64-bit words; word 0 holds bits
/// 0..=63. The storage form used in datasets is the word sequence with
/// trailing all-zero words trimmed.
#[derive(Clone, Default)]
pub struct BitField {
    words: Vec<u64>,
}

impl PartialEq for BitField {
    fn eq(&self, other: &Self) -> bool {
        self.words[..self.words_in_use()] == other.words[..other.words_in_use()]
    }
}

impl Eq for BitField {}

impl BitField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bit field with the given bit indices set.
    pub fn from_bits<I: IntoIterator<Item = usize>>(bits: I) -> Self {
        let mut bs = Self::new();
        for bit in bits {
            bs.set(bit);
        }
        bs
    }

    pub fn set(&mut self, bit: usize) {
        let word = word_index(bit);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= bit_mask_in_word(bit);
    }

    pub fn clear(&mut self, bit: usize) {
        let word = word_index(bit);
        if word < self.words.len() {
            self.words[word] &= !bit_mask_in_word(bit);
        }
    }

    pub fn get(&self, bit: usize) -> bool {
        let word = word_index(bit);
        word < self.words.len() && self.words[word] & bit_mask_in_word(bit) != 0
    }

    /// The index of the highest set bit plus one, or 0 if no bit is set.
    pub fn len(&self) -> usize {
        for (i, &word) in self.words.iter().enumerate().rev() {
            if word != 0 {
                return i * BITS_PER_WORD + (64 - word.leading_zeros() as usize);
            }
        }
        0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterates over the indices of all set bits, in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..BITS_PER_WORD).filter(move |bit| word & (1 << bit) != 0).map(move |bit| {
                wi * BITS_PER_WORD + bit
            })
        })
    }

    fn words_in_use(&self) -> usize {
        let mut n = self.words.len();
        while n > 0 && self.words[n - 1] == 0 {
            n -= 1;
        }
        n
    }

    /// The minimal word sequence: trailing all-zero words are trimmed.
    pub fn to_storage_form(&self) -> Vec<u64> {
        self.words[..self.words_in_use()].to_vec()
    }

    /// A word sequence of exactly `num_words` words; bits beyond the
    /// padded length are dropped.
    pub fn to_storage_form_padded(&self, num_words: usize) -> Vec<u64> {
        let mut out = vec![0; num_words];
        let n = self.words_in_use().min(num_words);
        out[..n].copy_from_slice(&self.words[..n]);
        out
    }

    /// Reconstructs a bit field from its storage form. Any length is
    /// accepted; the field has exactly that many backing words.
    pub fn from_storage_form(words: &[u64]) -> Self {
        Self::from_storage_form_slice(words, 0, words.len())
    }

    pub fn from_storage_form_slice(words: &[u64], start: usize, len: usize) -> Self {
        let mut n = len.min(words.len().saturating_sub(start));
        while n > 0 && words[start + n - 1] == 0 {
            n -= 1;
        }
        Self { words: words[start..start + n].to_vec() }
    }

    /// Splits a 2-D word table of shape `[rows, words_per_row]` into one
    /// bit field per row.
    pub fn from_storage_form_2d(table: &MDArray<u64>) -> Result<Vec<Self>, ShapeError> {
        if table.rank() != 2 {
            return Err(ShapeError::RankMismatch { expected: 2, actual: table.rank() });
        }
        let words_per_row = table.dims()[1];
        let flat = table.as_slice();
        Ok((0..table.dims()[0])
            .map(|row| Self::from_storage_form_slice(flat, row * words_per_row, words_per_row))
            .collect())
    }

    /// Serializes several bit fields as one flat table, each row padded
    /// to `words_per_row` words.
    pub fn to_storage_form_2d(fields: &[Self], words_per_row: usize) -> Vec<u64> {
        let mut out = Vec::with_capacity(fields.len() * words_per_row);
        for bs in fields {
            out.extend(bs.to_storage_form_padded(words_per_row));
        }
        out
    }

    /// The largest `len()` among the given bit fields.
    pub fn max_length(fields: &[Self]) -> usize {
        fields.iter().map(Self::len).max().unwrap_or(0)
    }
}

impl std::fmt::Debug for BitField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_set_get_clear() {
        let mut bs = BitField::new();
        assert!(!bs.get(0));
        bs.set(0);
        bs.set(5);
        bs.set(64);
        assert!(bs.get(0) && bs.get(5) && bs.get(64));
        assert!(!bs.get(63));
        assert_eq!(bs.len(), 65);
        bs.clear(64);
        assert_eq!(bs.len(), 6);
    }

    #[test]
    pub fn test_storage_form() {
        let bs = BitField::from_bits([0, 5, 64]);
        assert_eq!(bs.to_storage_form(), vec![0x21, 0x01]);
        assert_eq!(BitField::from_storage_form(&[0x21, 0x01]), bs);

        // no bits beyond bit 63 => a single word
        let small = BitField::from_bits([1, 63]);
        assert_eq!(small.to_storage_form().len(), 1);

        // trailing zero words are trimmed
        let trimmed = BitField::from_storage_form(&[0x21, 0, 0]);
        assert_eq!(trimmed.to_storage_form(), vec![0x21]);
    }

    #[test]
    pub fn test_storage_roundtrip() {
        let bs = BitField::from_bits([3, 17, 100, 200, 511]);
        assert_eq!(BitField::from_storage_form(&bs.to_storage_form()), bs);
        assert_eq!(BitField::from_storage_form(&[]), BitField::new());
    }

    #[test]
    pub fn test_padded_form() {
        let bs = BitField::from_bits([0, 70]);
        assert_eq!(bs.to_storage_form_padded(3), vec![1, 0x40, 0]);
        // padding below the used length drops high bits
        assert_eq!(bs.to_storage_form_padded(1), vec![1]);
    }

    #[test]
    pub fn test_2d_table() {
        let a = BitField::from_bits([0]);
        let b = BitField::from_bits([1, 64]);
        let words = BitField::to_storage_form_2d(&[a.clone(), b.clone()], 2);
        assert_eq!(words, vec![1, 0, 2, 1]);
        let table = MDArray::new(words, vec![2, 2]).unwrap();
        let back = BitField::from_storage_form_2d(&table).unwrap();
        assert_eq!(back, vec![a, b]);

        let flat = MDArray::new(vec![0u64; 4], vec![4]).unwrap();
        assert!(BitField::from_storage_form_2d(&flat).is_err());
    }

    #[test]
    pub fn test_iter() {
        let bits = vec![2usize, 40, 66, 190];
        let bs = BitField::from_bits(bits.iter().copied());
        assert_eq!(bs.iter().collect::<Vec<_>>(), bits);
        assert_eq!(BitField::max_length(&[bs, BitField::new()]), 191);
    }
}
