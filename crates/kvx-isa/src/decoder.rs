//! Instruction decoding and display.

use alloc::string::String;
use core::fmt::Write;

use crate::bundle::{BundlingId, ReservationId};
use crate::descriptor::ArchDescriptor;
use crate::error::IsaError;
use crate::format::FormatId;
use crate::ir::{Instruction, Mnemonic, Operand, OperandList, PointerMode};
use crate::operand::{OperandFlags, OperandKind, OperandSpec};

/// An instruction recovered from syllables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedInstruction {
    /// Format that matched.
    pub format: FormatId,
    /// Mnemonic of the format.
    pub mnemonic: Mnemonic,
    /// Operand values in format order.
    pub operands: OperandList,
    /// Syllables consumed, extension syllables included.
    pub word_count: usize,
    /// Reservation class of the format.
    pub reservation: ReservationId,
    /// Bundling class of the format.
    pub bundling: BundlingId,
}

impl DecodedInstruction {
    /// The abstract instruction, ready to be re-encoded.
    pub fn to_instruction(&self) -> Instruction {
        Instruction {
            mnemonic: self.mnemonic,
            operands: self.operands.clone(),
        }
    }

    /// Assembly text following the format's layout.
    ///
    /// Registers use canonical names; signed immediates print in decimal,
    /// other immediates in hexadecimal.
    pub fn render(&self, arch: &ArchDescriptor) -> String {
        let format = arch.format(self.format);
        let mut out = String::from(self.mnemonic.as_str());
        let mut rest = format.format_string.as_str();
        for (op, &id) in self.operands.iter().zip(&format.operands) {
            let Some(pos) = rest.find("%s") else {
                break;
            };
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 2..];
            write_operand(&mut out, arch, arch.operand(id), op);
        }
        out.push_str(rest);
        out
    }
}

fn write_operand(out: &mut String, arch: &ArchDescriptor, spec: &OperandSpec, op: &Operand) {
    match op {
        Operand::Register(reg) => out.push_str(&arch.registers().name(*reg)),
        Operand::Modifier(m) => out.push_str(m),
        Operand::Immediate(v) => {
            let signed = spec.flags.contains(OperandFlags::SIGNED)
                && !spec.flags.contains(OperandFlags::BITMASK);
            let _ = if signed || *v < 0 {
                write!(out, "{}", v)
            } else {
                write!(out, "0x{:x}", v)
            };
        }
        Operand::Symbol(sym) => {
            if let Some(function) = &sym.function {
                let _ = write!(out, "@{}({})", function, sym.name);
            } else {
                out.push_str(&sym.name);
            }
            if sym.addend != 0 {
                let _ = write!(out, "{:+}", sym.addend);
            }
        }
    }
}

/// Decodes the instruction at the start of `words`.
///
/// Only formats available in `mode` are considered. The parallel bit is
/// ignored; bundle boundaries are [`crate::decode_bundle`]'s concern.
///
/// # Errors
///
/// [`IsaError::Truncated`] when `words` is empty or stops inside the
/// instruction, [`IsaError::IllegalInstruction`] when no format matches or
/// a field decodes to a value its operand cannot name.
pub fn decode_instruction(
    arch: &ArchDescriptor,
    words: &[u32],
    mode: PointerMode,
) -> Result<DecodedInstruction, IsaError> {
    let Some(&first) = words.first() else {
        return Err(IsaError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    let illegal = IsaError::IllegalInstruction { word: first };
    let Some((index, format)) = arch
        .formats()
        .iter()
        .enumerate()
        .find(|(_, f)| f.allows(mode) && f.codewords[0].matches(first))
    else {
        log::trace!("no format matches {:#010x} in {} mode", first, mode);
        return Err(illegal);
    };
    let count = format.word_count();
    if words.len() < count {
        return Err(IsaError::Truncated {
            needed: count,
            available: words.len(),
        });
    }
    let words = &words[..count];
    if !format.codewords[1..]
        .iter()
        .zip(&words[1..])
        .all(|(cw, &w)| cw.matches(w))
    {
        log::trace!("{}: extension syllable mismatch", format.mnemonic);
        return Err(illegal);
    }

    let mut operands = OperandList::new();
    for &id in &format.operands {
        let spec = arch.operand(id);
        let op = match &spec.kind {
            OperandKind::Immediate => Operand::Immediate(spec.decode(words)),
            OperandKind::Register(class) => {
                let raw = spec.extract_field(words);
                let reg = arch
                    .registers()
                    .from_field(*class, raw)
                    .ok_or_else(|| illegal.clone())?;
                Operand::Register(reg)
            }
            OperandKind::Modifier(values) => {
                let raw = spec.extract_field(words);
                let value = usize::try_from(raw)
                    .ok()
                    .and_then(|i| values.get(i))
                    .ok_or_else(|| illegal.clone())?;
                Operand::Modifier(value.clone())
            }
        };
        operands.push(op);
    }
    Ok(DecodedInstruction {
        format: FormatId(index as u16),
        mnemonic: format.mnemonic,
        operands,
        word_count: count,
        reservation: format.reservation,
        bundling: format.bundling,
    })
}
