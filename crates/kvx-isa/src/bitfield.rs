//! Scattering an operand value into non-contiguous bit ranges of a syllable
//! stream, and gathering it back.
//!
//! A [`Bitfield`] copies `size` bits starting at bit `from_offset` of the
//! (already transformed) operand value to bit `to_offset` of the syllable
//! stream. `to_offset` counts across syllables: syllable `to_offset / 32`,
//! bit `to_offset % 32`. Bits outside the field are preserved, so operands
//! can be packed in any order on top of the fixed opcode bits.

use crate::error::IsaError;

/// One contiguous slice of an operand's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bitfield {
    /// Number of bits, 1 to 32.
    pub size: u8,
    /// First bit taken from the operand value.
    pub from_offset: u8,
    /// First bit written in the syllable stream.
    pub to_offset: u16,
}

#[inline]
const fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl Bitfield {
    /// Creates a bitfield.
    #[inline]
    pub const fn new(size: u8, from_offset: u8, to_offset: u16) -> Self {
        Self {
            size,
            from_offset,
            to_offset,
        }
    }

    /// Index of the syllable the field lives in.
    #[inline]
    pub const fn word(&self) -> usize {
        (self.to_offset / 32) as usize
    }

    /// Bit position of the field inside its syllable.
    #[inline]
    pub const fn shift(&self) -> u32 {
        (self.to_offset % 32) as u32
    }

    /// Syllable mask covered by the field.
    #[inline]
    pub const fn mask(&self) -> u32 {
        (low_mask(self.size as u32) as u32) << self.shift()
    }

    /// Mask of the operand-value bits the field carries.
    #[inline]
    pub const fn source_mask(&self) -> u64 {
        low_mask(self.size as u32) << self.from_offset
    }

    /// Whether the field stays inside one syllable.
    #[inline]
    pub const fn is_well_formed(&self) -> bool {
        self.size >= 1
            && self.size <= 32
            && (self.from_offset as u32) + (self.size as u32) <= 64
            && self.shift() + (self.size as u32) <= 32
    }

    /// Writes the field's slice of `value` into `words`.
    ///
    /// # Panics
    ///
    /// Panics if `words` is too short for the field's syllable.
    #[inline]
    pub fn insert(&self, words: &mut [u32], value: u64) {
        let piece = ((value >> self.from_offset) & low_mask(self.size as u32)) as u32;
        let word = &mut words[self.word()];
        *word = (*word & !self.mask()) | (piece << self.shift());
    }

    /// Reads the field's slice, positioned at `from_offset`.
    ///
    /// # Panics
    ///
    /// Panics if `words` is too short for the field's syllable.
    #[inline]
    pub fn extract(&self, words: &[u32]) -> u64 {
        let piece = (words[self.word()] & self.mask()) >> self.shift();
        u64::from(piece) << self.from_offset
    }

    /// Checked variant of [`Bitfield::insert`] for caller-supplied buffers.
    pub fn try_insert(&self, words: &mut [u32], value: u64) -> Result<(), IsaError> {
        if self.word() >= words.len() {
            return Err(IsaError::Truncated {
                needed: self.word() + 1,
                available: words.len(),
            });
        }
        self.insert(words, value);
        Ok(())
    }
}

/// Scatters `value` into every field, most significant field first.
pub fn scatter(fields: &[Bitfield], words: &mut [u32], value: u64) {
    for field in fields {
        field.insert(words, value);
    }
}

/// Reassembles the value scattered by [`scatter`].
pub fn gather(fields: &[Bitfield], words: &[u32]) -> u64 {
    fields.iter().fold(0, |acc, field| acc | field.extract(words))
}

/// Per-syllable union of the masks of `fields`.
pub fn coverage(fields: &[Bitfield], word: usize) -> u32 {
    fields
        .iter()
        .filter(|f| f.word() == word)
        .fold(0, |acc, f| acc | f.mask())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_round_trip() {
        let f = Bitfield::new(6, 0, 18);
        let mut words = [0u32; 1];
        f.insert(&mut words, 0x2a);
        assert_eq!(words[0], 0x2a << 18);
        assert_eq!(f.extract(&words), 0x2a);
    }

    #[test]
    fn insert_preserves_surrounding_bits() {
        let f = Bitfield::new(10, 0, 2);
        let mut words = [0xffff_ffffu32];
        f.insert(&mut words, 0);
        assert_eq!(words[0], 0xffff_f003);
        f.insert(&mut words, 0x3ff);
        assert_eq!(words[0], 0xffff_ffff);
    }

    #[test]
    fn insert_ignores_bits_outside_source_slice() {
        let f = Bitfield::new(4, 4, 0);
        let mut words = [0u32];
        f.insert(&mut words, 0xabc);
        assert_eq!(words[0], 0xb);
    }

    #[test]
    fn scatter_across_syllables() {
        // low 10 bits in the primary syllable, upper 27 in the extension
        let fields = [Bitfield::new(27, 10, 32), Bitfield::new(10, 0, 2)];
        let value = 0x1f_ffff_fc01u64 & low_mask(37);
        let mut words = [0u32; 2];
        scatter(&fields, &mut words, value);
        assert_eq!(words[0], 0x001 << 2);
        assert_eq!(words[1], (value >> 10) as u32);
        assert_eq!(gather(&fields, &words), value);
    }

    #[test]
    fn three_syllable_split() {
        let fields = [
            Bitfield::new(27, 37, 64),
            Bitfield::new(27, 10, 32),
            Bitfield::new(10, 0, 2),
        ];
        let value = 0xfedc_ba98_7654_3210u64;
        let mut words = [0u32; 3];
        scatter(&fields, &mut words, value);
        assert_eq!(gather(&fields, &words), value);
        assert_eq!(words[2], ((value >> 37) & low_mask(27)) as u32);
    }

    #[test]
    fn full_width_field_mask() {
        let f = Bitfield::new(32, 0, 32);
        assert_eq!(f.mask(), u32::MAX);
        assert_eq!(f.word(), 1);
        assert!(f.is_well_formed());
    }

    #[test]
    fn straddling_field_is_malformed() {
        assert!(!Bitfield::new(6, 0, 28).is_well_formed());
        assert!(!Bitfield::new(0, 0, 0).is_well_formed());
    }

    #[test]
    fn coverage_per_word() {
        let fields = [Bitfield::new(27, 10, 32), Bitfield::new(10, 0, 2)];
        assert_eq!(coverage(&fields, 0), 0x3ff << 2);
        assert_eq!(coverage(&fields, 1), 0x07ff_ffff);
        assert_eq!(coverage(&fields, 2), 0);
    }

    #[test]
    fn try_insert_reports_short_buffer() {
        let f = Bitfield::new(8, 0, 40);
        let mut words = [0u32; 1];
        assert_eq!(
            f.try_insert(&mut words, 1),
            Err(IsaError::Truncated {
                needed: 2,
                available: 1
            })
        );
    }
}
