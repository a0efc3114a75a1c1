// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::{Deserialize, Serialize};

/// Packed participation mask: bit `i` (byte `i / 8`, least significant bit first)
/// stands for the `i`-th member of the consensus group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bitmap(Vec<u8>);

impl Bitmap {
    /// Empty bitmap able to hold `group_size` bits
    ///
    /// ```
    /// # use spos_signature::Bitmap;
    /// assert_eq!(Bitmap::new(9).as_bytes().len(), 2);
    /// assert_eq!(Bitmap::new(8).as_bytes().len(), 1);
    /// ```
    pub fn new(group_size: usize) -> Self {
        Bitmap(vec![0u8; (group_size + 7) / 8])
    }

    /// Wraps raw bytes received from the network
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Bitmap(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bits the bitmap can address
    pub fn capacity(&self) -> usize {
        self.0.len() * 8
    }

    /// Sets bit `index`. Returns false if the bitmap is too short.
    pub fn set(&mut self, index: usize) -> bool {
        match self.0.get_mut(index / 8) {
            Some(byte) => {
                *byte |= 1 << (index % 8);
                true
            }
            None => false,
        }
    }

    /// Reads bit `index`. Bits past the end read as unset.
    pub fn is_set(&self, index: usize) -> bool {
        self.0
            .get(index / 8)
            .map(|byte| byte & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// Indexes of the set bits among the first `group_size` positions.
    /// A group larger than the bitmap is truncated to the bitmap capacity.
    pub fn selected(&self, group_size: usize) -> impl Iterator<Item = usize> + '_ {
        (0..group_size.min(self.capacity())).filter(move |i| self.is_set(*i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout_is_lsb_first() {
        let mut bitmap = Bitmap::new(10);
        assert!(bitmap.set(0));
        assert!(bitmap.set(9));
        assert_eq!(bitmap.as_bytes(), &[0b0000_0001, 0b0000_0010]);
        assert!(!bitmap.set(16));
        assert_eq!(bitmap.count_ones(), 2);
    }

    #[test]
    fn test_selected_truncates_to_smaller_size() {
        let bitmap = Bitmap::from_bytes(vec![0xff]);
        assert_eq!(bitmap.selected(20).count(), 8);
        assert_eq!(bitmap.selected(3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(!bitmap.is_set(12));
    }
}
