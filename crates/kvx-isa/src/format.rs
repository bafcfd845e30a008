//! Codewords and instruction formats.

use alloc::string::String;
use alloc::vec::Vec;

use crate::bundle::{BundlingId, ReservationId};
use crate::ir::{Mnemonic, PointerMode};
use crate::operand::OperandId;

table_id! {
    /// Index of an [`InstructionFormat`] in an architecture descriptor.
    FormatId
}

bitflags::bitflags! {
    /// Codeword flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CodewordFlags: u8 {
        /// Immediate extension syllable.
        const IMMX = 1;
        /// Conditional execution.
        const COND = 2;
        /// Call: writes the return address.
        const CALL = 4;
        /// Memory load.
        const LOAD = 8;
        /// Memory store.
        const STORE = 16;
        /// Only valid in 32-bit mode.
        const MODE32 = 32;
        /// Only valid in 64-bit mode.
        const MODE64 = 64;
        /// RISC-V compatible encoding.
        const RISCV = 128;
    }
}

/// Fixed bits of one syllable of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Codeword {
    /// Fixed bit values.
    pub opcode: u32,
    /// 1 where the bit is fixed.
    pub mask: u32,
    /// Semantic flags.
    pub flags: CodewordFlags,
}

impl Codeword {
    /// Whether `word` carries this codeword's fixed bits.
    #[inline]
    pub const fn matches(&self, word: u32) -> bool {
        word & self.mask == self.opcode
    }

    /// Whether this is an immediate extension syllable.
    #[inline]
    pub const fn is_extension(&self) -> bool {
        self.flags.contains(CodewordFlags::IMMX)
    }

    /// Whether two codewords can match the same syllable.
    #[inline]
    pub const fn overlaps(&self, other: &Codeword) -> bool {
        (self.opcode ^ other.opcode) & self.mask & other.mask == 0
    }
}

/// One encoding of a mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionFormat {
    /// Mnemonic, without modifiers.
    pub mnemonic: Mnemonic,
    /// One codeword per syllable; extension syllables follow the first.
    pub codewords: Vec<Codeword>,
    /// Operands in assembly order.
    pub operands: Vec<OperandId>,
    /// Bundling class.
    pub bundling: BundlingId,
    /// Reservation class.
    pub reservation: ReservationId,
    /// Display layout after the mnemonic; `%s` stands for each operand.
    pub format_string: String,
}

impl InstructionFormat {
    /// Number of syllables.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.codewords.len()
    }

    /// Flags of the leading codeword.
    #[inline]
    pub fn flags(&self) -> CodewordFlags {
        self.codewords.first().map_or(CodewordFlags::empty(), |c| c.flags)
    }

    /// Whether the format may be used in `mode`.
    pub fn allows(&self, mode: PointerMode) -> bool {
        let flags = self.flags();
        match mode {
            PointerMode::Bits32 => !flags.contains(CodewordFlags::MODE64),
            PointerMode::Bits64 => !flags.contains(CodewordFlags::MODE32),
        }
    }

    /// Whether some mode allows both formats.
    pub fn shares_mode_with(&self, other: &InstructionFormat) -> bool {
        [PointerMode::Bits32, PointerMode::Bits64]
            .into_iter()
            .any(|m| self.allows(m) && other.allows(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(flags: CodewordFlags) -> InstructionFormat {
        InstructionFormat {
            mnemonic: Mnemonic::from("make"),
            codewords: alloc::vec![Codeword {
                opcode: 0x2000_0000,
                mask: 0x7f00_0003,
                flags,
            }],
            operands: Vec::new(),
            bundling: BundlingId(0),
            reservation: ReservationId(0),
            format_string: String::from(" %s = %s"),
        }
    }

    #[test]
    fn codeword_match_ignores_operand_bits() {
        let cw = Codeword {
            opcode: 0x2000_0000,
            mask: 0x7f00_0003,
            flags: CodewordFlags::empty(),
        };
        assert!(cw.matches(0x20ff_fffc));
        assert!(cw.matches(0xa000_0000));
        assert!(!cw.matches(0x2000_0001));
    }

    #[test]
    fn overlap_detection() {
        let a = Codeword {
            opcode: 0x2000_0000,
            mask: 0x7f00_0000,
            flags: CodewordFlags::empty(),
        };
        let b = Codeword {
            opcode: 0x2100_0000,
            mask: 0x7f00_0000,
            flags: CodewordFlags::empty(),
        };
        let c = Codeword {
            opcode: 0x2000_0000,
            mask: 0x7800_0000,
            flags: CodewordFlags::empty(),
        };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c) && c.overlaps(&b));
    }

    #[test]
    fn mode_restriction() {
        let both = format(CodewordFlags::empty());
        let only32 = format(CodewordFlags::MODE32);
        let only64 = format(CodewordFlags::MODE64 | CodewordFlags::LOAD);
        assert!(both.allows(PointerMode::Bits32) && both.allows(PointerMode::Bits64));
        assert!(only32.allows(PointerMode::Bits32) && !only32.allows(PointerMode::Bits64));
        assert!(!only64.allows(PointerMode::Bits32));
        assert!(!only32.shares_mode_with(&only64));
        assert!(both.shares_mode_with(&only64));
    }

    #[test]
    fn flags_debug() {
        let flags = CodewordFlags::LOAD | CodewordFlags::MODE64;
        assert_eq!(alloc::format!("{:?}", flags), "CodewordFlags(LOAD | MODE64)");
    }
}
