//! Instruction encoding: format selection and operand packing.
//!
//! Formats of a mnemonic are tried in table order; the first whose operand
//! shapes match and whose operands all encode wins. Symbolic operands are
//! encoded as zero and reported as [`Fixup`]s for the object writer.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::bundle::{BundlingId, ReservationId};
use crate::descriptor::ArchDescriptor;
use crate::error::IsaError;
use crate::format::{FormatId, InstructionFormat};
use crate::ir::{Instruction, Mnemonic, Operand, PointerMode, SymbolRef};
use crate::operand::{OperandKind, OperandSpec};
use crate::reloc::{place_default_relocation, resolve_pseudo_function, RelativeKind, RelocationPiece};

// ── Syllables ───────────────────────────────────────────────────────────

/// Inline buffer for the syllables of one instruction (at most 3).
///
/// Avoids a heap allocation per encoded instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Syllables {
    data: [u32; 3],
    len: u8,
}

impl Syllables {
    /// Capacity in syllables.
    pub const CAPACITY: usize = 3;

    /// An empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; 3],
            len: 0,
        }
    }

    /// `len` zero syllables.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`Syllables::CAPACITY`].
    #[inline]
    pub fn zeroed(len: usize) -> Self {
        assert!(
            len <= Self::CAPACITY,
            "Syllables overflow: {} exceeds {} syllables",
            len,
            Self::CAPACITY
        );
        Self {
            data: [0; 3],
            len: len as u8,
        }
    }

    /// A buffer holding a copy of `words`.
    ///
    /// # Panics
    ///
    /// Panics if `words` is longer than [`Syllables::CAPACITY`].
    #[inline]
    pub fn from_slice(words: &[u32]) -> Self {
        let mut buf = Self::zeroed(words.len());
        buf.data[..words.len()].copy_from_slice(words);
        buf
    }

    /// Appends a syllable.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    #[inline]
    pub fn push(&mut self, word: u32) {
        assert!(
            (self.len as usize) < Self::CAPACITY,
            "Syllables overflow: cannot push beyond {} syllables",
            Self::CAPACITY
        );
        self.data[self.len as usize] = word;
        self.len += 1;
    }

    /// Number of syllables.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The syllables as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.data[..self.len as usize]
    }

    /// Heap copy of the syllables.
    #[inline]
    pub fn to_vec(&self) -> Vec<u32> {
        self.as_slice().to_vec()
    }

    /// Little-endian byte image, syllables in order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.as_slice().iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

impl core::ops::Deref for Syllables {
    type Target = [u32];
    #[inline]
    fn deref(&self) -> &[u32] {
        self.as_slice()
    }
}

impl core::ops::DerefMut for Syllables {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u32] {
        &mut self.data[..self.len as usize]
    }
}

impl AsRef<[u32]> for Syllables {
    #[inline]
    fn as_ref(&self) -> &[u32] {
        self.as_slice()
    }
}

impl core::fmt::Debug for Syllables {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut list = f.debug_list();
        for w in self.as_slice() {
            list.entry(&format_args!("{:#010x}", w));
        }
        list.finish()
    }
}

/// Splits a little-endian byte stream into syllables.
///
/// # Errors
///
/// [`IsaError::Truncated`] when the length is not a multiple of four.
pub fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, IsaError> {
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return Err(IsaError::Truncated {
            needed: bytes.len() / 4 + 1,
            available: bytes.len() / 4,
        });
    }
    Ok(chunks
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

// ── Encoding ────────────────────────────────────────────────────────────

/// A relocation the object writer must emit for an encoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fixup {
    /// Operand position in the instruction.
    pub operand: usize,
    /// Symbol name; empty for argument-less pseudo-functions.
    pub symbol: String,
    /// Constant added to the symbol value.
    pub addend: i64,
    /// Where the relocated value goes.
    pub piece: RelocationPiece,
}

/// Result of encoding one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInstruction {
    /// Format used.
    pub format: FormatId,
    /// Syllables, parallel bit clear.
    pub words: Syllables,
    /// Pending relocations, in operand order then piece order.
    pub fixups: Vec<Fixup>,
    /// Reservation class of the format.
    pub reservation: ReservationId,
    /// Bundling class of the format.
    pub bundling: BundlingId,
}

impl EncodedInstruction {
    /// Number of syllables.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Encodes `insn` for `mode`.
///
/// ```rust
/// use kvx_isa::{encode_instruction, ArchDescriptor, Core, Instruction, Operand, PointerMode, Reg};
///
/// let arch = ArchDescriptor::new(Core::Kv3V1).unwrap();
/// let insn = Instruction::new("addd")
///     .with(Operand::reg(Reg::gpr(1)))
///     .with(Operand::reg(Reg::gpr(2)))
///     .with(Operand::imm(-3));
/// let encoded = encode_instruction(&arch, &insn, PointerMode::Bits64).unwrap();
/// assert_eq!(encoded.words.len(), 1);
/// ```
///
/// # Errors
///
/// [`IsaError::NoSuchFormat`] when no format of the mnemonic takes the
/// operand shapes; otherwise the error of the last format tried, such as
/// [`IsaError::Range`] for an immediate no form can hold.
pub fn encode_instruction(
    arch: &ArchDescriptor,
    insn: &Instruction,
    mode: PointerMode,
) -> Result<EncodedInstruction, IsaError> {
    if insn.mnemonic.is_truncated() {
        return Err(IsaError::NoSuchFormat {
            mnemonic: insn.mnemonic.as_str().into(),
            detail: format!("mnemonic longer than {} bytes", Mnemonic::MAX_LEN),
        });
    }
    let mut last_error = None;
    for id in arch.formats_for(&insn.mnemonic) {
        let format = arch.format(id);
        if !format.allows(mode) || !shape_matches(arch, format, insn) {
            continue;
        }
        match encode_format(arch, id, insn, mode) {
            Ok(encoded) => {
                log::trace!(
                    "{}: format #{} ({} syllables)",
                    insn.mnemonic,
                    id.0,
                    encoded.words.len()
                );
                return Ok(encoded);
            }
            Err(e) => {
                log::trace!("{}: format #{} rejected: {}", insn.mnemonic, id.0, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| no_such_format(arch, insn, mode)))
}

/// Whether every operand of `insn` has a kind the format's slot takes.
fn shape_matches(arch: &ArchDescriptor, format: &InstructionFormat, insn: &Instruction) -> bool {
    insn.operands.len() == format.operands.len()
        && insn
            .operands
            .iter()
            .zip(&format.operands)
            .all(|(op, &id)| operand_fits(arch, arch.operand(id), op))
}

fn operand_fits(arch: &ArchDescriptor, spec: &OperandSpec, op: &Operand) -> bool {
    match (op, &spec.kind) {
        (Operand::Register(reg), OperandKind::Register(class)) => {
            arch.registers().class(*class).accepts_shape(*reg)
        }
        (Operand::Immediate(_), OperandKind::Immediate) => true,
        (Operand::Modifier(m), OperandKind::Modifier(values)) => values.iter().any(|v| v == m),
        (Operand::Symbol(sym), OperandKind::Immediate) => symbol_fits(arch, spec, sym),
        _ => false,
    }
}

/// Pseudo-functions need a relocatable slot; plain symbols need a
/// pc-relative default relocation or a slot wide enough for an address.
fn symbol_fits(arch: &ArchDescriptor, spec: &OperandSpec, sym: &SymbolRef) -> bool {
    if sym.function.is_some() {
        return !spec.relocations.is_empty();
    }
    spec.default_relocation().is_some_and(|id| {
        arch.relocation(id).relative == RelativeKind::PcRelative || spec.width >= 32
    })
}

fn encode_format(
    arch: &ArchDescriptor,
    id: FormatId,
    insn: &Instruction,
    mode: PointerMode,
) -> Result<EncodedInstruction, IsaError> {
    let format = arch.format(id);
    let mut words = Syllables::zeroed(format.word_count());
    for (word, cw) in words.iter_mut().zip(&format.codewords) {
        *word = cw.opcode;
    }
    let mut fixups = Vec::new();
    for (i, (op, &spec_id)) in insn.operands.iter().zip(&format.operands).enumerate() {
        let spec = arch.operand(spec_id);
        match (op, &spec.kind) {
            (Operand::Register(reg), OperandKind::Register(class)) => {
                let raw = arch.registers().field(*class, *reg)?;
                spec.insert_field(&mut words, raw);
            }
            (Operand::Immediate(value), _) => spec.encode(*value, &mut words)?,
            (Operand::Modifier(m), OperandKind::Modifier(values)) => {
                let raw = values
                    .iter()
                    .position(|v| v == m)
                    .ok_or_else(|| kind_mismatch(insn, i, spec))?;
                spec.insert_field(&mut words, raw as u64);
            }
            (Operand::Symbol(sym), _) => {
                let pieces = match &sym.function {
                    Some(function) => resolve_pseudo_function(arch, function, spec_id, mode)?,
                    None => place_default_relocation(arch, spec_id)?,
                };
                fixups.extend(pieces.into_iter().map(|piece| Fixup {
                    operand: i,
                    symbol: sym.name.clone(),
                    addend: sym.addend,
                    piece,
                }));
            }
            _ => return Err(kind_mismatch(insn, i, spec)),
        }
    }
    Ok(EncodedInstruction {
        format: id,
        words,
        fixups,
        reservation: format.reservation,
        bundling: format.bundling,
    })
}

fn kind_mismatch(insn: &Instruction, index: usize, spec: &OperandSpec) -> IsaError {
    IsaError::NoSuchFormat {
        mnemonic: insn.mnemonic.as_str().into(),
        detail: format!("operand {} does not fit {}", index, spec.name),
    }
}

fn no_such_format(arch: &ArchDescriptor, insn: &Instruction, mode: PointerMode) -> IsaError {
    let mut formats = arch.formats_for(&insn.mnemonic).map(|id| arch.format(id)).peekable();
    let detail = if formats.peek().is_none() {
        String::from("unknown mnemonic")
    } else if !formats.any(|f| f.allows(mode)) {
        format!("not available in {} mode", mode)
    } else {
        let kinds: Vec<&str> = insn.operands.iter().map(Operand::kind_name).collect();
        format!("no form takes ({})", kinds.join(", "))
    };
    IsaError::NoSuchFormat {
        mnemonic: insn.mnemonic.as_str().into(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use crate::format::CodewordFlags;
    use crate::operand::OperandFlags;
    use crate::register::{Bank, BankInfo, Reg};
    use crate::reloc::{Availability, RelocType, SplitScheme};

    fn arch() -> ArchDescriptor {
        let mut b = DescriptorBuilder::new("enc");
        let issue = b.resource("ISSUE", 1);
        let alu = b.reservation("ALU", &[&[issue]]);
        let lane = b.bundling("ALU");
        b.registers_mut()
            .add_bank(BankInfo::numbered(Bank::Gpr, "$r", 64));
        let single = b.registers_mut().add_class("single", Bank::Gpr, 1, 1, 0, 63);
        let paired = b.registers_mut().add_class("paired", Bank::Gpr, 2, 2, 0, 63);
        let abs37 = b.relocation(
            "signed37",
            37,
            RelativeKind::Absolute,
            &[RelocType::S37_LO10, RelocType::S37_UP27],
        );
        let gotoff37 = b.relocation(
            "gotoff_signed37",
            37,
            RelativeKind::GotRelative,
            &[RelocType::S37_GOTOFF_LO10, RelocType::S37_GOTOFF_UP27],
        );
        b.pseudo_function("gotoff", SplitScheme::S37Lo10Up27, Availability::All, gotoff37);
        let w = b.operand(OperandSpec::register("reg_w", single, 6).with_bitfields(&[(6, 0, 18)]));
        let z = b.operand(OperandSpec::register("reg_z", single, 6).with_bitfields(&[(6, 0, 12)]));
        let y = b.operand(OperandSpec::register("reg_y", single, 6).with_bitfields(&[(6, 0, 6)]));
        let p = b.operand(OperandSpec::register("reg_p", paired, 5).with_bitfields(&[(5, 0, 19)]));
        let s10 = b.operand(
            OperandSpec::immediate("signed10", 10)
                .with_flags(OperandFlags::SIGNED)
                .with_bitfields(&[(10, 0, 2)]),
        );
        let s37 = b.operand(
            OperandSpec::immediate("signed37", 37)
                .with_flags(OperandFlags::SIGNED | OperandFlags::CAN_EXTEND)
                .with_relocations(&[abs37, gotoff37])
                .with_bitfields(&[(27, 10, 32), (10, 0, 2)]),
        );
        let cond = b.operand(OperandSpec::modifier("comparison", &[".ne", ".eq", ".lt"], 2).with_bitfields(&[(2, 0, 0)]));
        b.format("addd", " %s = %s, %s")
            .opcode(&[0x2800_0000])
            .operands(&[w, z, y])
            .classes(lane, alu)
            .add();
        b.format("addd", " %s = %s, %s")
            .opcode(&[0x3000_0000])
            .operands(&[w, z, s10])
            .classes(lane, alu)
            .add();
        b.format("addd", " %s = %s, %s")
            .opcode(&[0x3800_0000, 0])
            .operands(&[w, z, s37])
            .classes(lane, alu)
            .add();
        b.format("compd", "%s %s = %s, %s")
            .opcode(&[0x4000_0000])
            .operands(&[cond, w, z, y])
            .classes(lane, alu)
            .add();
        b.format("copyp", " %s = %s")
            .opcode(&[0x4800_0000])
            .operands(&[p, y])
            .classes(lane, alu)
            .add();
        b.format("wide", " %s")
            .opcode(&[0x5000_0000, 0])
            .operands(&[s37])
            .classes(lane, alu)
            .flags(CodewordFlags::MODE64)
            .add();
        b.build()
    }

    fn addd(c: Operand) -> Instruction {
        Instruction::new("addd")
            .with(Operand::reg(Reg::gpr(1)))
            .with(Operand::reg(Reg::gpr(2)))
            .with(c)
    }

    #[test]
    fn register_form() {
        let arch = arch();
        let enc = encode_instruction(&arch, &addd(Operand::reg(Reg::gpr(3))), PointerMode::Bits64)
            .unwrap();
        assert_eq!(enc.words.as_slice(), [0x2800_0000 | 1 << 18 | 2 << 12 | 3 << 6]);
        assert!(enc.fixups.is_empty());
    }

    #[test]
    fn first_fitting_immediate_form_wins() {
        let arch = arch();
        let small = encode_instruction(&arch, &addd(Operand::imm(-1)), PointerMode::Bits64).unwrap();
        assert_eq!(small.words.len(), 1);
        assert_eq!(small.words[0] & 0xffc, 0xffc);
        let big = encode_instruction(&arch, &addd(Operand::imm(1 << 20)), PointerMode::Bits64).unwrap();
        assert_eq!(big.words.len(), 2);
        assert_eq!(arch.operand(arch.format(big.format).operands[2]).decode(&big.words), 1 << 20);
    }

    #[test]
    fn oversized_immediate_reports_range() {
        let arch = arch();
        assert!(matches!(
            encode_instruction(&arch, &addd(Operand::imm(1 << 40)), PointerMode::Bits64),
            Err(IsaError::Range { .. })
        ));
    }

    #[test]
    fn plain_symbol_takes_wide_form_with_fixups() {
        let arch = arch();
        let enc = encode_instruction(
            &arch,
            &addd(Operand::symbol(SymbolRef::new("table").addend(8))),
            PointerMode::Bits64,
        )
        .unwrap();
        assert_eq!(enc.words.len(), 2);
        assert_eq!(enc.words[1], 0);
        let relocs: Vec<_> = enc.fixups.iter().map(|f| f.piece.reloc).collect();
        assert_eq!(relocs, [RelocType::S37_LO10, RelocType::S37_UP27]);
        assert!(enc.fixups.iter().all(|f| f.operand == 2 && f.symbol == "table" && f.addend == 8));
    }

    #[test]
    fn pseudo_function_symbol() {
        let arch = arch();
        let enc = encode_instruction(
            &arch,
            &addd(Operand::symbol(SymbolRef::with_function("x", "gotoff"))),
            PointerMode::Bits32,
        )
        .unwrap();
        assert_eq!(enc.fixups[0].piece.reloc, RelocType::S37_GOTOFF_LO10);
        assert_eq!(enc.fixups[1].piece.syllable, 1);
    }

    #[test]
    fn modifier_encodes_index() {
        let arch = arch();
        let insn = Instruction::new("compd")
            .with(Operand::modifier(".lt"))
            .with(Operand::reg(Reg::gpr(0)))
            .with(Operand::reg(Reg::gpr(1)))
            .with(Operand::reg(Reg::gpr(2)));
        let enc = encode_instruction(&arch, &insn, PointerMode::Bits64).unwrap();
        assert_eq!(enc.words[0] & 3, 2);
        let bad = Instruction::new("compd")
            .with(Operand::modifier(".gtu"))
            .with(Operand::reg(Reg::gpr(0)))
            .with(Operand::reg(Reg::gpr(1)))
            .with(Operand::reg(Reg::gpr(2)));
        assert!(matches!(
            encode_instruction(&arch, &bad, PointerMode::Bits64),
            Err(IsaError::NoSuchFormat { .. })
        ));
    }

    #[test]
    fn paired_register_alignment() {
        let arch = arch();
        let ok = Instruction::new("copyp")
            .with(Operand::reg(Reg::gpr_pair(4)))
            .with(Operand::reg(Reg::gpr(7)));
        let enc = encode_instruction(&arch, &ok, PointerMode::Bits64).unwrap();
        assert_eq!((enc.words[0] >> 19) & 0x1f, 2);
        let odd = Instruction::new("copyp")
            .with(Operand::reg(Reg::gpr_pair(5)))
            .with(Operand::reg(Reg::gpr(7)));
        assert!(matches!(
            encode_instruction(&arch, &odd, PointerMode::Bits64),
            Err(IsaError::MisalignedRegister { index: 5, .. })
        ));
        // a single register is not a pair
        let single = Instruction::new("copyp")
            .with(Operand::reg(Reg::gpr(4)))
            .with(Operand::reg(Reg::gpr(7)));
        assert!(matches!(
            encode_instruction(&arch, &single, PointerMode::Bits64),
            Err(IsaError::NoSuchFormat { .. })
        ));
    }

    #[test]
    fn no_such_format_details() {
        let arch = arch();
        let unknown = Instruction::new("frob");
        assert_eq!(
            encode_instruction(&arch, &unknown, PointerMode::Bits64),
            Err(IsaError::NoSuchFormat {
                mnemonic: "frob".into(),
                detail: "unknown mnemonic".into()
            })
        );
        let arity = Instruction::new("addd").with(Operand::reg(Reg::gpr(1)));
        assert_eq!(
            encode_instruction(&arch, &arity, PointerMode::Bits64),
            Err(IsaError::NoSuchFormat {
                mnemonic: "addd".into(),
                detail: "no form takes (register)".into()
            })
        );
        let mode = Instruction::new("wide").with(Operand::imm(0));
        assert_eq!(
            encode_instruction(&arch, &mode, PointerMode::Bits32),
            Err(IsaError::NoSuchFormat {
                mnemonic: "wide".into(),
                detail: "not available in 32-bit mode".into()
            })
        );
    }

    #[test]
    fn overlong_mnemonic_matches_nothing() {
        let arch = arch();
        let long = Instruction::new("addd.with.a.tail.x")
            .with(Operand::reg(Reg::gpr(1)))
            .with(Operand::reg(Reg::gpr(2)));
        assert_eq!(
            encode_instruction(&arch, &long, PointerMode::Bits64),
            Err(IsaError::NoSuchFormat {
                mnemonic: "addd.with.a.tail".into(),
                detail: "mnemonic longer than 16 bytes".into()
            })
        );
    }

    #[test]
    fn syllables_buffer() {
        let mut s = Syllables::new();
        assert!(s.is_empty());
        s.push(0x0403_0201);
        s.push(0x0807_0605);
        assert_eq!(s.to_le_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(format!("{:?}", s), "[0x04030201, 0x08070605]");
        assert_eq!(words_from_le_bytes(&s.to_le_bytes()).unwrap(), s.to_vec());
        assert!(matches!(
            words_from_le_bytes(&[1, 2, 3, 4, 5]),
            Err(IsaError::Truncated { needed: 2, available: 1 })
        ));
        assert_eq!(Syllables::from_slice(&[7]).as_slice(), [7]);
    }

    #[test]
    #[should_panic(expected = "Syllables overflow")]
    fn syllables_overflow_panics() {
        let mut s = Syllables::zeroed(3);
        s.push(0);
    }
}
