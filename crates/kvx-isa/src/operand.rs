//! Operand descriptions: value policy, affine transform and bit layout.

use alloc::string::String;
use alloc::vec::Vec;

use crate::bitfield::{self, Bitfield};
use crate::error::IsaError;
use crate::register::RegClassId;
use crate::reloc::RelocId;

table_id! {
    /// Index of an [`OperandSpec`] in an architecture descriptor.
    OperandId
}

// ── Flags ───────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Value policy flags. No flags means an unsigned magnitude.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct OperandFlags: u8 {
        /// Two's complement value.
        const SIGNED = 1;
        /// Bits live partly in IMMX extension syllables.
        const CAN_EXTEND = 2;
        /// A bit pattern: accepted zero- or sign-extended.
        const BITMASK = 4;
        /// Reduced modulo `2^width` instead of range-checked.
        const WRAPPED = 8;
    }
}

// ── OperandSpec ─────────────────────────────────────────────────────────

/// What an operand holds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    /// Integer or symbol.
    Immediate,
    /// Register from a class.
    Register(RegClassId),
    /// Modifier suffix, encoded as the index into the list.
    Modifier(Vec<String>),
}

/// One operand slot of an instruction format.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperandSpec {
    /// Type name, e.g. `signed10`.
    pub name: String,
    /// Register class, modifier list or immediate.
    pub kind: OperandKind,
    /// Encoded width: the sum of the bitfield sizes.
    pub width: u8,
    /// Low bits dropped from the value; they must be zero.
    pub shift: u8,
    /// Added to the value before encoding.
    pub bias: i64,
    /// Value policy.
    pub flags: OperandFlags,
    /// Relocations allowed for symbolic values, default first.
    pub relocations: Vec<RelocId>,
    /// Bit layout, most significant field first.
    pub bitfields: Vec<Bitfield>,
}

impl OperandSpec {
    fn with_kind(name: &str, kind: OperandKind, width: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            width,
            shift: 0,
            bias: 0,
            flags: OperandFlags::empty(),
            relocations: Vec::new(),
            bitfields: Vec::new(),
        }
    }

    /// Immediate operand.
    pub fn immediate(name: &str, width: u8) -> Self {
        Self::with_kind(name, OperandKind::Immediate, width)
    }

    /// Register operand of class `class`.
    pub fn register(name: &str, class: RegClassId, width: u8) -> Self {
        Self::with_kind(name, OperandKind::Register(class), width)
    }

    /// Modifier operand over `values`.
    pub fn modifier(name: &str, values: &[&str], width: u8) -> Self {
        let values = values.iter().map(|v| String::from(*v)).collect();
        Self::with_kind(name, OperandKind::Modifier(values), width)
    }

    /// Sets the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: OperandFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the shift.
    #[must_use]
    pub fn with_shift(mut self, shift: u8) -> Self {
        self.shift = shift;
        self
    }

    /// Sets the bias.
    #[must_use]
    pub fn with_bias(mut self, bias: i64) -> Self {
        self.bias = bias;
        self
    }

    /// Sets the allowed relocations, default first.
    #[must_use]
    pub fn with_relocations(mut self, relocs: &[RelocId]) -> Self {
        self.relocations = relocs.to_vec();
        self
    }

    /// Sets the layout from `(size, from_offset, to_offset)` triples, most
    /// significant first.
    #[must_use]
    pub fn with_bitfields(mut self, fields: &[(u8, u8, u16)]) -> Self {
        self.bitfields = fields
            .iter()
            .map(|&(size, from, to)| Bitfield::new(size, from, to))
            .collect();
        self
    }

    /// Whether the operand is an immediate.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        matches!(self.kind, OperandKind::Immediate)
    }

    /// Register class, for register operands.
    #[inline]
    pub fn register_class(&self) -> Option<RegClassId> {
        match self.kind {
            OperandKind::Register(class) => Some(class),
            _ => None,
        }
    }

    /// Relocation used for a plain symbol.
    #[inline]
    pub fn default_relocation(&self) -> Option<RelocId> {
        self.relocations.first().copied()
    }

    /// Number of syllables the operand reaches into.
    pub fn word_span(&self) -> usize {
        self.bitfields.iter().map(|f| f.word() + 1).max().unwrap_or(0)
    }

    /// Syllable bits owned by this operand in syllable `word`.
    #[inline]
    pub fn coverage(&self, word: usize) -> u32 {
        bitfield::coverage(&self.bitfields, word)
    }

    /// Accepted range in the caller's terms: after shift, before bias.
    pub fn range(&self) -> (i128, i128) {
        let (lo, hi) = self.biased_range();
        let bias = i128::from(self.bias);
        (lo.saturating_sub(bias), hi.saturating_sub(bias))
    }

    fn biased_range(&self) -> (i128, i128) {
        let w = u32::from(self.width);
        let (lo, hi) = if self.flags.contains(OperandFlags::BITMASK) {
            (-(1i128 << (w - 1)), (1i128 << w) - 1)
        } else if self.flags.contains(OperandFlags::SIGNED) {
            (-(1i128 << (w - 1)), (1i128 << (w - 1)) - 1)
        } else {
            (0, (1i128 << w) - 1)
        };
        match self.scale() {
            Some(scale) => (lo.saturating_mul(scale), hi.saturating_mul(scale)),
            None => (0, -1),
        }
    }

    /// `2^shift`, or `None` when the shift does not fit an `i128`.
    #[inline]
    fn scale(&self) -> Option<i128> {
        1i128
            .checked_shl(u32::from(self.shift))
            .filter(|scale| *scale > 0)
    }

    #[inline]
    fn field_mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Applies bias, range policy and shift, returning the raw field value.
    ///
    /// Nothing is written; a failing value leaves no trace.
    pub fn to_field(&self, value: i128) -> Result<u64, IsaError> {
        let Some(align) = self.scale() else {
            let (min, max) = self.range();
            return Err(IsaError::Range { value, min, max });
        };
        let wrapped = self.flags.contains(OperandFlags::WRAPPED);
        let biased = if wrapped {
            value.wrapping_add(i128::from(self.bias))
        } else {
            let (min, max) = self.range();
            let out_of_range = || IsaError::Range { value, min, max };
            let biased = value
                .checked_add(i128::from(self.bias))
                .ok_or_else(out_of_range)?;
            let (lo, hi) = self.biased_range();
            if biased < lo || biased > hi {
                return Err(out_of_range());
            }
            biased
        };
        if biased & (align - 1) != 0 {
            return Err(IsaError::Alignment {
                value,
                alignment: align as u64,
            });
        }
        Ok(((biased >> self.shift) as u64) & self.field_mask())
    }

    /// Inverse of [`OperandSpec::to_field`].
    ///
    /// Signed operands are sign-extended from `width`; bitmask and wrapped
    /// operands come back as their zero-extended pattern.
    pub fn from_field(&self, raw: u64) -> i128 {
        let raw = raw & self.field_mask();
        let mut value = i128::from(raw);
        if self.flags.contains(OperandFlags::SIGNED) && !self.flags.contains(OperandFlags::BITMASK)
        {
            let unused = 128 - u32::from(self.width);
            value = (value << unused) >> unused;
        }
        self.scale()
            .map_or(0, |scale| value.wrapping_mul(scale))
            .wrapping_sub(i128::from(self.bias))
    }

    /// Scatters a raw field value into `words`.
    #[inline]
    pub fn insert_field(&self, words: &mut [u32], raw: u64) {
        bitfield::scatter(&self.bitfields, words, raw);
    }

    /// Gathers the raw field value from `words`.
    #[inline]
    pub fn extract_field(&self, words: &[u32]) -> u64 {
        bitfield::gather(&self.bitfields, words)
    }

    /// Encodes `value` into `words`, touching only this operand's bits.
    pub fn encode(&self, value: i128, words: &mut [u32]) -> Result<(), IsaError> {
        let raw = self.to_field(value)?;
        if self.word_span() > words.len() {
            return Err(IsaError::Truncated {
                needed: self.word_span(),
                available: words.len(),
            });
        }
        self.insert_field(words, raw);
        Ok(())
    }

    /// Decodes the operand's value from `words`.
    ///
    /// # Panics
    ///
    /// Panics if `words` is shorter than [`OperandSpec::word_span`].
    pub fn decode(&self, words: &[u32]) -> i128 {
        self.from_field(self.extract_field(words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed16() -> OperandSpec {
        OperandSpec::immediate("signed16", 16)
            .with_flags(OperandFlags::SIGNED)
            .with_bitfields(&[(16, 0, 0)])
    }

    #[test]
    fn signed16_scenario() {
        let op = signed16();
        let mut words = [0u32];
        op.encode(-100, &mut words).unwrap();
        assert_eq!(words[0], 0xff9c);
        assert_eq!(op.decode(&words), -100);
        assert_eq!(
            op.encode(40000, &mut words),
            Err(IsaError::Range {
                value: 40000,
                min: -32768,
                max: 32767
            })
        );
        // failed encode leaves the buffer alone
        assert_eq!(words[0], 0xff9c);
    }

    #[test]
    fn signed_extremes() {
        let op = signed16();
        let mut words = [0u32];
        for v in [-1, 32767, -32768] {
            op.encode(v, &mut words).unwrap();
            assert_eq!(op.decode(&words), v);
        }
        assert!(op.encode(-32769, &mut words).is_err());
    }

    #[test]
    fn oversized_shift_is_an_error() {
        let op = OperandSpec::immediate("scaled", 10)
            .with_shift(200)
            .with_bitfields(&[(10, 0, 0)]);
        let mut words = [0u32];
        assert!(matches!(op.encode(0, &mut words), Err(IsaError::Range { .. })));
        assert_eq!(op.decode(&[0x3ff]), 0);

        let op = OperandSpec::immediate("scaled", 10)
            .with_shift(127)
            .with_bitfields(&[(10, 0, 0)]);
        assert!(matches!(op.encode(4, &mut words), Err(IsaError::Range { .. })));
    }

    #[test]
    fn unsigned_rejects_negative() {
        let op = OperandSpec::immediate("unsigned6", 6).with_bitfields(&[(6, 0, 6)]);
        let mut words = [0u32];
        assert!(matches!(
            op.encode(-1, &mut words),
            Err(IsaError::Range { min: 0, max: 63, .. })
        ));
        op.encode(63, &mut words).unwrap();
        assert_eq!(words[0], 63 << 6);
    }

    #[test]
    fn shift_requires_alignment() {
        let op = OperandSpec::immediate("pcrel17", 17)
            .with_flags(OperandFlags::SIGNED)
            .with_shift(2)
            .with_bitfields(&[(17, 0, 4)]);
        let mut words = [0u32];
        assert_eq!(
            op.encode(6, &mut words),
            Err(IsaError::Alignment {
                value: 6,
                alignment: 4
            })
        );
        op.encode(-8, &mut words).unwrap();
        assert_eq!(op.decode(&words), -8);
        assert_eq!(op.range(), (-(1 << 18), (1 << 18) - 4));
    }

    #[test]
    fn bias_is_added_then_subtracted() {
        let op = OperandSpec::immediate("count", 4)
            .with_bias(-1)
            .with_bitfields(&[(4, 0, 0)]);
        let mut words = [0u32];
        op.encode(16, &mut words).unwrap();
        assert_eq!(words[0], 15);
        assert_eq!(op.decode(&words), 16);
        assert_eq!(op.range(), (1, 16));
        assert!(op.encode(0, &mut words).is_err());
    }

    #[test]
    fn wrapped_reduces_modulo() {
        let op = OperandSpec::immediate("wrapped32", 32)
            .with_flags(OperandFlags::WRAPPED)
            .with_bitfields(&[(27, 5, 32), (5, 0, 2)]);
        let mut words = [0u32; 2];
        op.encode(-1, &mut words).unwrap();
        assert_eq!(op.decode(&words), 0xffff_ffff);
        op.encode(0x1_2345_6789, &mut words).unwrap();
        assert_eq!(op.decode(&words), 0x2345_6789);
    }

    #[test]
    fn bitmask_accepts_both_extensions() {
        let op = OperandSpec::immediate("bitmask10", 10)
            .with_flags(OperandFlags::BITMASK)
            .with_bitfields(&[(10, 0, 2)]);
        let mut a = [0u32];
        let mut b = [0u32];
        op.encode(-1, &mut a).unwrap();
        op.encode(0x3ff, &mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(op.decode(&a), 0x3ff);
        assert!(op.encode(0x400, &mut a).is_err());
        assert!(op.encode(-513, &mut a).is_err());
    }

    #[test]
    fn sixty_four_bit_signed_extremes() {
        let op = OperandSpec::immediate("signed64", 64)
            .with_flags(OperandFlags::SIGNED)
            .with_bitfields(&[(27, 37, 64), (27, 10, 32), (10, 0, 2)]);
        let mut words = [0u32; 3];
        for v in [i128::from(i64::MIN), i128::from(i64::MAX), -1, 0] {
            op.encode(v, &mut words).unwrap();
            assert_eq!(op.decode(&words), v);
        }
        assert!(op.encode(i128::from(u64::MAX), &mut words).is_err());
    }

    #[test]
    fn encode_leaves_other_bits() {
        let op = OperandSpec::immediate("signed10", 10)
            .with_flags(OperandFlags::SIGNED)
            .with_bitfields(&[(10, 0, 2)]);
        let mut words = [0xa5a5_a5a5u32];
        op.encode(-1, &mut words).unwrap();
        assert_eq!(words[0] & !op.coverage(0), 0xa5a5_a5a5 & !op.coverage(0));
    }

    #[test]
    fn short_buffer_is_truncated() {
        let op = OperandSpec::immediate("signed37", 37)
            .with_flags(OperandFlags::SIGNED | OperandFlags::CAN_EXTEND)
            .with_bitfields(&[(27, 10, 32), (10, 0, 2)]);
        let mut words = [0u32; 1];
        assert!(matches!(
            op.encode(5, &mut words),
            Err(IsaError::Truncated { needed: 2, .. })
        ));
    }

    #[test]
    fn flags_debug_lists_names() {
        let flags = OperandFlags::SIGNED | OperandFlags::CAN_EXTEND;
        assert_eq!(alloc::format!("{:?}", flags), "OperandFlags(SIGNED | CAN_EXTEND)");
        assert!(flags.contains(OperandFlags::SIGNED));
        assert!(!flags.contains(OperandFlags::WRAPPED));
    }
}
