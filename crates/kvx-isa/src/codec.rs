//! Mode-carrying front end over one architecture descriptor.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::bundle::{
    check_bundle, decode_bundle, encode_bundle, BundleSlot, DecodedBundle, EncodedBundle,
};
use crate::decoder::{decode_instruction, DecodedInstruction};
use crate::descriptor::ArchDescriptor;
use crate::encoder::{encode_instruction, EncodedInstruction};
use crate::error::IsaError;
use crate::ir::{Instruction, PointerMode};
use crate::operand::OperandId;
use crate::reloc::{resolve_data_relocation, resolve_pseudo_function, DataRelocation, RelocationPiece};

/// Encoder, decoder and bundle checker bound to one descriptor and one
/// pointer-size mode.
///
/// Cheap to create; the descriptor is borrowed, never copied.
///
/// # Examples
///
/// ```rust
/// use kvx_isa::{ArchDescriptor, Codec, Core, Instruction, Operand, PointerMode, Reg};
///
/// let arch = ArchDescriptor::new(Core::Kv3V2).unwrap();
/// let mut codec = Codec::new(&arch);
/// codec.mode(PointerMode::Bits32);
///
/// let insn = Instruction::new("make")
///     .with(Operand::reg(Reg::gpr(0)))
///     .with(Operand::imm(42));
/// let encoded = codec.encode(&insn).unwrap();
/// let decoded = codec.decode(&encoded.words).unwrap();
/// assert_eq!(decoded.to_instruction(), insn);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    arch: &'a ArchDescriptor,
    mode: PointerMode,
}

impl<'a> Codec<'a> {
    /// A codec for `arch` in 64-bit mode.
    pub fn new(arch: &'a ArchDescriptor) -> Self {
        Self {
            arch,
            mode: PointerMode::default(),
        }
    }

    /// Sets the pointer-size mode.
    pub fn mode(&mut self, mode: PointerMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// The descriptor.
    #[inline]
    pub fn arch(&self) -> &'a ArchDescriptor {
        self.arch
    }

    /// The active mode.
    #[inline]
    pub fn pointer_mode(&self) -> PointerMode {
        self.mode
    }

    /// Encodes one instruction.
    pub fn encode(&self, insn: &Instruction) -> Result<EncodedInstruction, IsaError> {
        encode_instruction(self.arch, insn, self.mode)
    }

    /// Decodes the instruction at the start of `words`.
    pub fn decode(&self, words: &[u32]) -> Result<DecodedInstruction, IsaError> {
        decode_instruction(self.arch, words, self.mode)
    }

    /// Resolves `@name(...)` applied to `operand`.
    pub fn resolve(&self, name: &str, operand: OperandId) -> Result<Vec<RelocationPiece>, IsaError> {
        resolve_pseudo_function(self.arch, name, operand, self.mode)
    }

    /// Relocation for a data word of `bits` bits.
    pub fn resolve_data(&self, function: Option<&str>, bits: u32) -> Result<DataRelocation, IsaError> {
        resolve_data_relocation(self.arch, function, bits, self.mode)
    }

    /// Checks bundle legality.
    pub fn check(&self, slots: &[BundleSlot]) -> Result<(), IsaError> {
        check_bundle(self.arch, slots)
    }

    /// Encodes and checks one bundle.
    pub fn encode_bundle(&self, instructions: &[Instruction]) -> Result<EncodedBundle, IsaError> {
        encode_bundle(self.arch, instructions, self.mode)
    }

    /// Decodes the bundle at the start of `words`.
    pub fn decode_bundle(&self, words: &[u32]) -> Result<DecodedBundle, IsaError> {
        decode_bundle(self.arch, words, self.mode)
    }

    /// Disassembles a syllable stream into a listing.
    ///
    /// One line per instruction: byte offset, syllables, text. `;;` closes
    /// every bundle.
    ///
    /// ```text
    /// 00000000  b0040040                    addd $r1 = $r0, 16
    /// 00000004  61084000                    copyd $r2 = $r4
    ///                                       ;;
    /// ```
    ///
    /// # Errors
    ///
    /// The first bundle that fails to decode.
    pub fn disassemble(&self, words: &[u32]) -> Result<String, IsaError> {
        let mut out = String::new();
        let mut offset = 0;
        while offset < words.len() {
            let bundle = self.decode_bundle(&words[offset..])?;
            let mut at = offset;
            for insn in &bundle.instructions {
                let _ = write!(out, "{:08x} ", at * 4);
                for w in &words[at..at + insn.word_count] {
                    let _ = write!(out, " {:08x}", w);
                }
                let pad = 3usize.saturating_sub(insn.word_count) * 9;
                let _ = writeln!(out, "{:pad$}  {}", "", insn.render(self.arch), pad = pad);
                at += insn.word_count;
            }
            let _ = writeln!(out, "{:38};;", "");
            offset += bundle.word_count;
        }
        Ok(out)
    }
}

#[cfg(all(test, feature = "kv3-1"))]
mod tests {
    use super::*;
    use crate::descriptor::Core;
    use crate::ir::{Operand, SymbolRef};
    use crate::register::Reg;
    use crate::reloc::RelocType;
    use alloc::format;

    fn kv3_1() -> ArchDescriptor {
        ArchDescriptor::new(Core::Kv3V1).unwrap()
    }

    #[test]
    fn listing_layout() {
        let arch = kv3_1();
        let codec = Codec::new(&arch);
        let bundle = codec
            .encode_bundle(&[
                Instruction::new("addd")
                    .with(Operand::reg(Reg::gpr(1)))
                    .with(Operand::reg(Reg::gpr(0)))
                    .with(Operand::imm(16)),
                Instruction::new("copyd")
                    .with(Operand::reg(Reg::gpr(2)))
                    .with(Operand::reg(Reg::gpr(4))),
            ])
            .unwrap();
        assert_eq!(bundle.words, [0xb004_0040, 0x6108_4000]);

        let text = codec.disassemble(&bundle.words).unwrap();
        let expected = format!(
            "00000000  b0040040{pad}addd $r1 = $r0, 16\n\
             00000004  61084000{pad}copyd $r2 = $r4\n\
             {end:38};;\n",
            pad = "                    ",
            end = ""
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn listing_stops_at_bad_bundle() {
        let arch = kv3_1();
        let codec = Codec::new(&arch);
        // no syllable with the parallel bit clear
        assert!(matches!(
            codec.disassemble(&[0xe100_0000]),
            Err(IsaError::Truncated { .. })
        ));
        assert_eq!(codec.disassemble(&[]).unwrap(), "");
    }

    #[test]
    fn mode_selects_wide_form() {
        let arch = kv3_1();
        let make = Instruction::new("make")
            .with(Operand::reg(Reg::gpr(3)))
            .with(Operand::symbol(SymbolRef::new("table")));

        let mut codec = Codec::new(&arch);
        let wide = codec.encode(&make).unwrap();
        assert_eq!(wide.word_count(), 3);
        assert_eq!(wide.fixups[2].piece.reloc, RelocType::S43_EX6);

        codec.mode(PointerMode::Bits32);
        let narrow = codec.encode(&make).unwrap();
        assert_eq!(narrow.word_count(), 2);
        assert_eq!(narrow.fixups[0].piece.reloc, RelocType::S32_LO5);
        assert_eq!(codec.pointer_mode(), PointerMode::Bits32);
    }

    #[test]
    fn data_words() {
        let arch = kv3_1();
        let codec = Codec::new(&arch);
        assert_eq!(
            codec.resolve_data(Some("pcrel"), 32).map(|r| r.reloc),
            Ok(RelocType::R32_PCREL)
        );
        assert_eq!(
            codec.resolve_data(Some("dtpoff"), 64).map(|r| r.reloc),
            Ok(RelocType::R64_DTPOFF)
        );
        assert!(codec.resolve_data(Some("dtpoff"), 32).is_err());
    }
}
