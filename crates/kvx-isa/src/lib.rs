//! # kvx-isa: Table-Driven KVX Instruction Codec
//!
//! `kvx-isa` encodes and decodes instructions of the KVX VLIW cores
//! (kv3-1, kv3-2 and kv4-1), resolves relocatable operands into
//! relocation pieces and checks that a group of instructions may issue
//! together in one bundle.
//!
//! The built-in descriptors are a synthetic subset: they follow the KVX
//! operand, relocation, register and reservation model, but their opcode
//! values and mnemonic coverage are not binary-compatible with real KVX
//! object code. Real encodings go through [`DescriptorBuilder`].
//!
//! ## Quick Start
//!
//! ```rust
//! use kvx_isa::{ArchDescriptor, Codec, Core, Instruction, Operand, Reg};
//!
//! let arch = ArchDescriptor::new(Core::Kv3V1).unwrap();
//! let codec = Codec::new(&arch);
//!
//! let bundle = codec
//!     .encode_bundle(&[
//!         Instruction::new("addd")
//!             .with(Operand::reg(Reg::gpr(1)))
//!             .with(Operand::reg(Reg::gpr(0)))
//!             .with(Operand::imm(16)),
//!         Instruction::new("copyd")
//!             .with(Operand::reg(Reg::gpr(2)))
//!             .with(Operand::reg(Reg::gpr(4))),
//!     ])
//!     .unwrap();
//! assert_eq!(bundle.words.len(), 2);
//! assert!(bundle.words[0] & arch.parallel_bit() != 0);
//! ```
//!
//! ## Features
//!
//! - **Table-driven**: every format, operand and reservation row is data
//!   in an [`ArchDescriptor`]; custom descriptors via [`DescriptorBuilder`].
//! - **Bit-exact**: operands scatter across non-contiguous fields and
//!   immediate extension syllables.
//! - **Relocations**: pseudo-functions such as `@gotoff` split into
//!   `R_KVX_*` pieces per pointer-size mode.
//! - **Bundle legality**: per-cycle resource unit counts against capacities.
//! - **`no_std` + `alloc`**: disable the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Bit-level encoding narrows and sign-changes integers constantly
// (i128→u64, u64→u32, usize→u16 ids) and opcode constants are written as
// raw hex. The lints below are expected in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::map_unwrap_or,
    clippy::many_single_char_names,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_continue
)]

extern crate alloc;

/// Declares a `u16` table index newtype.
macro_rules! table_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u16);

        impl $name {
            /// Position in the owning table.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

/// Bitfields: scatter/gather of operand values across syllables.
pub mod bitfield;
/// Resource reservation tables and the bundle legality checker.
pub mod bundle;
/// `Codec` front end bound to a descriptor and a pointer-size mode.
pub mod codec;
/// Instruction decoding and display.
pub mod decoder;
/// Architecture descriptors, built-in cores and the descriptor builder.
pub mod descriptor;
/// Instruction encoding and format selection.
pub mod encoder;
/// Error type.
pub mod error;
/// Codewords and instruction formats.
pub mod format;
/// Abstract instructions and operands.
pub mod ir;
/// Operand descriptions and value policy.
pub mod operand;
/// Register banks, classes and names.
pub mod register;
/// Relocations and pseudo-functions.
pub mod reloc;
pub(crate) mod tables;

// Re-exports
pub use bitfield::Bitfield;
pub use bundle::{
    BundleSlot, BundlingClass, BundlingId, DecodedBundle, EncodedBundle, ReservationClass,
    ReservationId, ReservationTable, Resource, ResourceId,
};
pub use codec::Codec;
pub use decoder::DecodedInstruction;
pub use descriptor::{ArchDescriptor, Core, DescriptorBuilder, FormatBuilder};
pub use encoder::{words_from_le_bytes, EncodedInstruction, Fixup, Syllables};
pub use error::{BundleLimit, IsaError};
pub use format::{Codeword, CodewordFlags, FormatId, InstructionFormat};
pub use ir::{Instruction, Mnemonic, Operand, OperandList, PointerMode, SymbolRef};
pub use operand::{OperandFlags, OperandId, OperandKind, OperandSpec};
pub use register::{Bank, BankInfo, Reg, RegClassId, RegisterClass, RegisterFile};
pub use reloc::{
    resolve_data_relocation, Availability, DataRelocation, PseudoFunctionSpec, PseudoId,
    RelativeKind, RelocId, RelocType, RelocationPiece, RelocationSpec, SplitScheme,
};

use alloc::vec::Vec;

/// Encodes one instruction.
///
/// Formats of the mnemonic are tried in table order and the first whose
/// operands all fit is used.
///
/// # Errors
///
/// Returns [`IsaError`] when no format takes the operands or an operand
/// value does not fit; see [`encoder::encode_instruction`].
pub fn encode_instruction(
    arch: &ArchDescriptor,
    instr: &Instruction,
    mode: PointerMode,
) -> Result<EncodedInstruction, IsaError> {
    encoder::encode_instruction(arch, instr, mode)
}

/// Decodes the instruction at the start of `words`.
///
/// # Errors
///
/// Returns [`IsaError::IllegalInstruction`] or [`IsaError::Truncated`];
/// see [`decoder::decode_instruction`].
pub fn decode_instruction(
    arch: &ArchDescriptor,
    words: &[u32],
    mode: PointerMode,
) -> Result<DecodedInstruction, IsaError> {
    decoder::decode_instruction(arch, words, mode)
}

/// Resolves pseudo-function `name` applied to `operand`.
///
/// # Examples
///
/// ```rust
/// use kvx_isa::{resolve_pseudo_function, ArchDescriptor, Core, IsaError, PointerMode, RelocType};
///
/// let arch = ArchDescriptor::new(Core::Kv3V1).unwrap();
/// let s43 = arch.find_operand("signed43").unwrap();
/// let pieces = resolve_pseudo_function(&arch, "gotoff", s43, PointerMode::Bits64).unwrap();
/// assert_eq!(pieces[2].reloc, RelocType::S43_GOTOFF_EX6);
/// assert!(matches!(
///     resolve_pseudo_function(&arch, "gotoff", s43, PointerMode::Bits32),
///     Err(IsaError::ModeMismatch { .. })
/// ));
/// ```
///
/// # Errors
///
/// See [`reloc::resolve_pseudo_function`].
pub fn resolve_pseudo_function(
    arch: &ArchDescriptor,
    name: &str,
    operand: OperandId,
    mode: PointerMode,
) -> Result<Vec<RelocationPiece>, IsaError> {
    reloc::resolve_pseudo_function(arch, name, operand, mode)
}

/// Checks that `slots` may issue in one bundle.
///
/// # Errors
///
/// [`IsaError::ResourceConflict`] or [`IsaError::BundleOverflow`].
pub fn check_bundle(arch: &ArchDescriptor, slots: &[BundleSlot]) -> Result<(), IsaError> {
    bundle::check_bundle(arch, slots)
}

/// Encodes, checks and lays out one bundle.
///
/// # Errors
///
/// The first encoding error, or the legality error of the bundle.
pub fn encode_bundle(
    arch: &ArchDescriptor,
    instructions: &[Instruction],
    mode: PointerMode,
) -> Result<EncodedBundle, IsaError> {
    bundle::encode_bundle(arch, instructions, mode)
}

/// Decodes the bundle at the start of `words`.
///
/// # Errors
///
/// See [`bundle::decode_bundle`].
pub fn decode_bundle(
    arch: &ArchDescriptor,
    words: &[u32],
    mode: PointerMode,
) -> Result<DecodedBundle, IsaError> {
    bundle::decode_bundle(arch, words, mode)
}
