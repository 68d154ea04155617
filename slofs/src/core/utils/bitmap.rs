// SPDX-License-Identifier: MIT

//! Bitmap operations on byte slices.
//!
//! Used for the block allocation bitmap, the record occupancy map and the
//! checker's reachability tracking.

/// Extension trait for bitmap operations on byte slices.
///
/// Bit ordering is little-endian within bytes: bit 0 is the LSB of byte 0,
/// bit 8 the LSB of byte 1.
pub trait BitmapOps {
    /// Sets or clears a bit. Does nothing if `bit` is out of bounds.
    fn set_bit(&mut self, bit: usize, value: bool);

    /// Returns `false` if `bit` is out of bounds.
    fn get_bit(&self, bit: usize) -> bool;

    /// Sets or clears `len` bits starting at `start`.
    fn set_range(&mut self, start: usize, len: usize, value: bool);

    /// Counts the set bits in `[start, end)`.
    fn count_ones_in_range(&self, start: usize, end: usize) -> usize;

    /// Finds the first zero bit at or after `start`.
    fn find_first_zero(&self, start: usize) -> Option<usize>;

    fn count_ones(&self) -> usize;
}

impl BitmapOps for [u8] {
    #[inline]
    fn set_bit(&mut self, bit: usize, value: bool) {
        if let Some(byte) = self.get_mut(bit / 8) {
            let mask = 1u8 << (bit % 8);
            if value {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    #[inline]
    fn get_bit(&self, bit: usize) -> bool {
        self.get(bit / 8)
            .is_some_and(|b| (b & (1 << (bit % 8))) != 0)
    }

    fn set_range(&mut self, start: usize, len: usize, value: bool) {
        let mut bit = start;
        let end = start.saturating_add(len).min(self.len() * 8);
        while bit < end {
            // Whole bytes at once when aligned.
            if bit % 8 == 0 && end - bit >= 8 {
                self[bit / 8] = if value { 0xFF } else { 0x00 };
                bit += 8;
            } else {
                self.set_bit(bit, value);
                bit += 1;
            }
        }
    }

    fn count_ones_in_range(&self, start: usize, end: usize) -> usize {
        let end = end.min(self.len() * 8);
        let mut bit = start;
        let mut count = 0;
        while bit < end {
            if bit % 8 == 0 && end - bit >= 8 {
                count += self[bit / 8].count_ones() as usize;
                bit += 8;
            } else {
                count += self.get_bit(bit) as usize;
                bit += 1;
            }
        }
        count
    }

    fn find_first_zero(&self, start: usize) -> Option<usize> {
        let start_byte = start / 8;
        let start_bit_in_byte = start % 8;

        for (byte_idx, &byte) in self.iter().enumerate().skip(start_byte) {
            if byte == 0xFF {
                continue;
            }

            let first_bit = if byte_idx == start_byte {
                start_bit_in_byte
            } else {
                0
            };

            for bit_in_byte in first_bit..8 {
                if (byte & (1 << bit_in_byte)) == 0 {
                    return Some(byte_idx * 8 + bit_in_byte);
                }
            }
        }
        None
    }

    fn count_ones(&self) -> usize {
        self.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_bit() {
        let mut bitmap = [0u8; 4];

        bitmap.set_bit(0, true);
        bitmap.set_bit(7, true);
        bitmap.set_bit(8, true);
        assert_eq!(bitmap[0], 0b1000_0001);
        assert_eq!(bitmap[1], 0b0000_0001);

        bitmap.set_bit(0, false);
        assert!(!bitmap.get_bit(0));
        assert_eq!(bitmap[0], 0b1000_0000);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut bitmap = [0u8; 2];
        bitmap.set_bit(100, true);
        assert_eq!(bitmap, [0, 0]);
        assert!(!bitmap.get_bit(100));
    }

    #[test]
    fn test_set_range_unaligned() {
        let mut bitmap = [0u8; 4];
        bitmap.set_range(3, 14, true);
        assert_eq!(bitmap.count_ones(), 14);
        assert!(!bitmap.get_bit(2));
        assert!(bitmap.get_bit(3));
        assert!(bitmap.get_bit(16));
        assert!(!bitmap.get_bit(17));

        bitmap.set_range(8, 8, false);
        assert_eq!(bitmap[1], 0);
        assert_eq!(bitmap.count_ones_in_range(0, 32), 6);

        // Clamped to the slice.
        bitmap.set_range(30, 100, true);
        assert_eq!(bitmap.count_ones_in_range(30, 32), 2);
    }

    #[test]
    fn test_find_first_zero() {
        let bitmap = [0b1111_1111u8, 0b1111_1101, 0b0000_0000];
        assert_eq!(bitmap.find_first_zero(0), Some(9));
        assert_eq!(bitmap.find_first_zero(10), Some(16));

        let full = [0xFFu8; 4];
        assert_eq!(full.find_first_zero(0), None);
    }
}
