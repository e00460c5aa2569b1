//! # Free-space bitmap
//!
//! One bit per resource: `0` means free, `1` means in use. The same type
//! tracks free disk sectors (persisted through the free-map file), free
//! physical frames and free address-space ids.
//!
//! The bitmap itself is not synchronized; owners keep it behind a
//! `kernel_sync::SpinLock` so that a find/clear burst is atomic.
//!
//! ## Persistence format
//!
//! [`Bitmap::to_bytes`] emits `ceil(len / 8)` bytes; bit `i` lives in byte
//! `i / 8` at position `i % 8` (LSB first). [`Bitmap::from_bytes`] reverses it.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

const BITS_PER_WORD: usize = u32::BITS as usize;

/// Fixed-size vector of in-use bits.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: usize,
    words: Vec<u32>,
}

impl Bitmap {
    /// Create a bitmap of `bits` entries, all free.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self {
            bits,
            words: vec![0; bits.div_ceil(BITS_PER_WORD)],
        }
    }

    /// Number of entries tracked.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bits
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[inline]
    const fn locate(bit: usize) -> (usize, u32) {
        (bit / BITS_PER_WORD, 1 << (bit % BITS_PER_WORD))
    }

    /// Mark `bit` as in use.
    ///
    /// # Panics
    /// If `bit` is out of range.
    pub fn mark(&mut self, bit: usize) {
        assert!(bit < self.bits, "bit {bit} out of range (len {})", self.bits);
        let (word, mask) = Self::locate(bit);
        self.words[word] |= mask;
    }

    /// Mark `bit` as free.
    ///
    /// # Panics
    /// If `bit` is out of range.
    pub fn clear(&mut self, bit: usize) {
        assert!(bit < self.bits, "bit {bit} out of range (len {})", self.bits);
        let (word, mask) = Self::locate(bit);
        self.words[word] &= !mask;
    }

    /// Whether `bit` is in use.
    ///
    /// # Panics
    /// If `bit` is out of range.
    #[must_use]
    pub fn test(&self, bit: usize) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range (len {})", self.bits);
        let (word, mask) = Self::locate(bit);
        self.words[word] & mask != 0
    }

    /// Find the lowest free entry, mark it in use and return it.
    ///
    /// Returns `None` when every entry is in use; callers that must not fail
    /// halfway check [`num_clear`](Self::num_clear) first.
    pub fn find(&mut self) -> Option<usize> {
        let (word_index, word) = self
            .words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u32::MAX)?;
        let bit = word_index * BITS_PER_WORD + word.trailing_ones() as usize;
        if bit >= self.bits {
            return None;
        }
        self.mark(bit);
        Some(bit)
    }

    /// Number of free entries.
    #[must_use]
    pub fn num_clear(&self) -> usize {
        self.bits - self.num_set()
    }

    /// Number of entries in use.
    #[must_use]
    pub fn num_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the indices of in-use entries in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bits).filter(|&bit| self.test(bit))
    }

    /// Number of bytes produced by [`to_bytes`](Self::to_bytes).
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.bits.div_ceil(8)
    }

    /// Serialize for persistence.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .take(self.byte_len())
            .collect()
    }

    /// Rebuild a bitmap of `bits` entries from [`to_bytes`](Self::to_bytes) output.
    ///
    /// Missing trailing bytes read as free; bits past `bits` are ignored.
    #[must_use]
    pub fn from_bytes(bits: usize, bytes: &[u8]) -> Self {
        let mut map = Self::new(bits);
        for (word, chunk) in map.words.iter_mut().zip(bytes.chunks(4)) {
            let mut raw = [0u8; 4];
            raw[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(raw);
        }
        let tail = bits % BITS_PER_WORD;
        if tail != 0
            && let Some(last) = map.words.last_mut()
        {
            *last &= (1 << tail) - 1;
        }
        map
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("len", &self.bits)
            .field("clear", &self.num_clear())
            .finish()
    }
}

/// Diagnostic dump of the in-use entries.
impl fmt::Display for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap set ({}/{}):", self.num_set(), self.bits)?;
        for bit in self.iter_set() {
            write!(f, " {bit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_hands_out_lowest_free_bit() {
        let mut map = Bitmap::new(40);
        map.mark(0);
        map.mark(1);
        assert_eq!(map.find(), Some(2));
        map.clear(0);
        assert_eq!(map.find(), Some(0));
        assert_eq!(map.num_clear(), 37);
    }

    #[test]
    fn find_fails_when_full_without_overrunning_len() {
        let mut map = Bitmap::new(3);
        assert_eq!(map.find(), Some(0));
        assert_eq!(map.find(), Some(1));
        assert_eq!(map.find(), Some(2));
        assert_eq!(map.find(), None);
        assert_eq!(map.num_clear(), 0);
    }

    #[test]
    fn find_crosses_word_boundary() {
        let mut map = Bitmap::new(64);
        for bit in 0..32 {
            map.mark(bit);
        }
        assert_eq!(map.find(), Some(32));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn clear_out_of_range_panics() {
        Bitmap::new(8).clear(8);
    }

    #[test]
    fn bytes_round_trip() {
        let mut map = Bitmap::new(45);
        for bit in [0, 7, 8, 31, 32, 44] {
            map.mark(bit);
        }
        let bytes = map.to_bytes();
        assert_eq!(bytes.len(), 6);
        assert_eq!(bytes[0], 0b1000_0001);
        assert_eq!(Bitmap::from_bytes(45, &bytes), map);
    }

    #[test]
    fn display_lists_set_bits() {
        let mut map = Bitmap::new(10);
        map.mark(3);
        map.mark(9);
        assert_eq!(alloc::format!("{map}"), "Bitmap set (2/10): 3 9");
    }
}
