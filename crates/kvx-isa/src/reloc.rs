//! Relocations and pseudo-functions.
//!
//! A symbolic operand cannot be encoded until link time. The resolver picks
//! the relocation that applies to the operand and splits it into pieces,
//! one per operand bitfield, each tagged with the ELF relocation that will
//! fill it in. The encoded syllables carry zero in those bits meanwhile.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bitfield::Bitfield;
use crate::descriptor::ArchDescriptor;
use crate::error::IsaError;
use crate::ir::PointerMode;
use crate::operand::{OperandId, OperandSpec};

table_id! {
    /// Index of a [`RelocationSpec`] in an architecture descriptor.
    RelocId
}

table_id! {
    /// Index of a [`PseudoFunctionSpec`] in an architecture descriptor.
    PseudoId
}

/// What a relocation value is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelativeKind {
    /// Absolute address.
    Absolute,
    /// Relative to the instruction address.
    PcRelative,
    /// Relative to the global pointer.
    GpRelative,
    /// Relative to the thread pointer.
    TpRelative,
    /// Relative to the GOT.
    GotRelative,
    /// Relative to the load base address.
    BaseRelative,
}

macro_rules! reloc_types {
    ($($variant:ident = $code:literal, $name:literal;)*) => {
        /// ELF relocation types of the KVX psABI.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[allow(non_camel_case_types)]
        pub enum RelocType {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl RelocType {
            /// Every relocation type, in ELF number order.
            pub const ALL: &'static [RelocType] = &[$(RelocType::$variant),*];

            /// ELF `r_type` number.
            pub const fn code(self) -> u32 {
                match self {
                    $(RelocType::$variant => $code,)*
                }
            }

            /// ELF name, e.g. `R_KVX_S37_LO10`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(RelocType::$variant => $name,)*
                }
            }
        }
    };
}

reloc_types! {
    R16 = 1, "R_KVX_16";
    R32 = 2, "R_KVX_32";
    R64 = 3, "R_KVX_64";
    S16_PCREL = 4, "R_KVX_S16_PCREL";
    PCREL17 = 5, "R_KVX_PCREL17";
    PCREL27 = 6, "R_KVX_PCREL27";
    R32_PCREL = 7, "R_KVX_32_PCREL";
    S37_PCREL_LO10 = 8, "R_KVX_S37_PCREL_LO10";
    S37_PCREL_UP27 = 9, "R_KVX_S37_PCREL_UP27";
    S43_PCREL_LO10 = 10, "R_KVX_S43_PCREL_LO10";
    S43_PCREL_UP27 = 11, "R_KVX_S43_PCREL_UP27";
    S43_PCREL_EX6 = 12, "R_KVX_S43_PCREL_EX6";
    S64_PCREL_LO10 = 13, "R_KVX_S64_PCREL_LO10";
    S64_PCREL_UP27 = 14, "R_KVX_S64_PCREL_UP27";
    S64_PCREL_EX27 = 15, "R_KVX_S64_PCREL_EX27";
    R64_PCREL = 16, "R_KVX_64_PCREL";
    S16 = 17, "R_KVX_S16";
    S32_LO5 = 18, "R_KVX_S32_LO5";
    S32_UP27 = 19, "R_KVX_S32_UP27";
    S37_LO10 = 20, "R_KVX_S37_LO10";
    S37_UP27 = 21, "R_KVX_S37_UP27";
    S37_GOTOFF_LO10 = 22, "R_KVX_S37_GOTOFF_LO10";
    S37_GOTOFF_UP27 = 23, "R_KVX_S37_GOTOFF_UP27";
    S43_GOTOFF_LO10 = 24, "R_KVX_S43_GOTOFF_LO10";
    S43_GOTOFF_UP27 = 25, "R_KVX_S43_GOTOFF_UP27";
    S43_GOTOFF_EX6 = 26, "R_KVX_S43_GOTOFF_EX6";
    R32_GOTOFF = 27, "R_KVX_32_GOTOFF";
    R64_GOTOFF = 28, "R_KVX_64_GOTOFF";
    R32_GOT = 29, "R_KVX_32_GOT";
    S37_GOT_LO10 = 30, "R_KVX_S37_GOT_LO10";
    S37_GOT_UP27 = 31, "R_KVX_S37_GOT_UP27";
    S43_GOT_LO10 = 32, "R_KVX_S43_GOT_LO10";
    S43_GOT_UP27 = 33, "R_KVX_S43_GOT_UP27";
    S43_GOT_EX6 = 34, "R_KVX_S43_GOT_EX6";
    R64_GOT = 35, "R_KVX_64_GOT";
    GLOB_DAT = 36, "R_KVX_GLOB_DAT";
    COPY = 37, "R_KVX_COPY";
    JMP_SLOT = 38, "R_KVX_JMP_SLOT";
    RELATIVE = 39, "R_KVX_RELATIVE";
    S43_LO10 = 40, "R_KVX_S43_LO10";
    S43_UP27 = 41, "R_KVX_S43_UP27";
    S43_EX6 = 42, "R_KVX_S43_EX6";
    S64_LO10 = 43, "R_KVX_S64_LO10";
    S64_UP27 = 44, "R_KVX_S64_UP27";
    S64_EX27 = 45, "R_KVX_S64_EX27";
    S37_GOTADDR_LO10 = 46, "R_KVX_S37_GOTADDR_LO10";
    S37_GOTADDR_UP27 = 47, "R_KVX_S37_GOTADDR_UP27";
    S43_GOTADDR_LO10 = 48, "R_KVX_S43_GOTADDR_LO10";
    S43_GOTADDR_UP27 = 49, "R_KVX_S43_GOTADDR_UP27";
    S43_GOTADDR_EX6 = 50, "R_KVX_S43_GOTADDR_EX6";
    S64_GOTADDR_LO10 = 51, "R_KVX_S64_GOTADDR_LO10";
    S64_GOTADDR_UP27 = 52, "R_KVX_S64_GOTADDR_UP27";
    S64_GOTADDR_EX27 = 53, "R_KVX_S64_GOTADDR_EX27";
    R64_DTPMOD = 54, "R_KVX_64_DTPMOD";
    R64_DTPOFF = 55, "R_KVX_64_DTPOFF";
    S37_TLS_DTPOFF_LO10 = 56, "R_KVX_S37_TLS_DTPOFF_LO10";
    S37_TLS_DTPOFF_UP27 = 57, "R_KVX_S37_TLS_DTPOFF_UP27";
    S43_TLS_DTPOFF_LO10 = 58, "R_KVX_S43_TLS_DTPOFF_LO10";
    S43_TLS_DTPOFF_UP27 = 59, "R_KVX_S43_TLS_DTPOFF_UP27";
    S43_TLS_DTPOFF_EX6 = 60, "R_KVX_S43_TLS_DTPOFF_EX6";
    S37_TLS_GD_LO10 = 61, "R_KVX_S37_TLS_GD_LO10";
    S37_TLS_GD_UP27 = 62, "R_KVX_S37_TLS_GD_UP27";
    S43_TLS_GD_LO10 = 63, "R_KVX_S43_TLS_GD_LO10";
    S43_TLS_GD_UP27 = 64, "R_KVX_S43_TLS_GD_UP27";
    S43_TLS_GD_EX6 = 65, "R_KVX_S43_TLS_GD_EX6";
    S37_TLS_LD_LO10 = 66, "R_KVX_S37_TLS_LD_LO10";
    S37_TLS_LD_UP27 = 67, "R_KVX_S37_TLS_LD_UP27";
    S43_TLS_LD_LO10 = 68, "R_KVX_S43_TLS_LD_LO10";
    S43_TLS_LD_UP27 = 69, "R_KVX_S43_TLS_LD_UP27";
    S43_TLS_LD_EX6 = 70, "R_KVX_S43_TLS_LD_EX6";
    R64_TPOFF = 71, "R_KVX_64_TPOFF";
    S37_TLS_IE_LO10 = 72, "R_KVX_S37_TLS_IE_LO10";
    S37_TLS_IE_UP27 = 73, "R_KVX_S37_TLS_IE_UP27";
    S43_TLS_IE_LO10 = 74, "R_KVX_S43_TLS_IE_LO10";
    S43_TLS_IE_UP27 = 75, "R_KVX_S43_TLS_IE_UP27";
    S43_TLS_IE_EX6 = 76, "R_KVX_S43_TLS_IE_EX6";
    S37_TLS_LE_LO10 = 77, "R_KVX_S37_TLS_LE_LO10";
    S37_TLS_LE_UP27 = 78, "R_KVX_S37_TLS_LE_UP27";
    S43_TLS_LE_LO10 = 79, "R_KVX_S43_TLS_LE_LO10";
    S43_TLS_LE_UP27 = 80, "R_KVX_S43_TLS_LE_UP27";
    S43_TLS_LE_EX6 = 81, "R_KVX_S43_TLS_LE_EX6";
    R8 = 82, "R_KVX_8";
}

impl fmt::Display for RelocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A symbolic relocation and the low-level relocations realizing it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelocationSpec {
    /// Table name, e.g. `gotoff_signed37`.
    pub name: String,
    /// Width of the relocated value.
    pub bit_size: u8,
    /// What the value is relative to.
    pub relative: RelativeKind,
    /// One relocation per piece, lowest piece first.
    pub relocs: Vec<RelocType>,
}

/// How a pseudo-function splits its value across an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitScheme {
    /// 32 bits: low 5 in the primary syllable, 27 in one extension.
    S32Lo5Up27,
    /// 37 bits: low 10, then 27.
    S37Lo10Up27,
    /// 43 bits: low 10, 27, then a 6-bit extension.
    S43Lo10Up27Ex6,
    /// 64 bits: low 10, 27, then a 27-bit extension.
    S64Lo10Up27Ex27,
    /// A single 16-bit value.
    S16,
    /// A single 32-bit value.
    S32,
    /// A single 64-bit value.
    S64,
}

impl SplitScheme {
    /// Total width.
    pub const fn bit_size(self) -> u32 {
        match self {
            SplitScheme::S16 => 16,
            SplitScheme::S32Lo5Up27 | SplitScheme::S32 => 32,
            SplitScheme::S37Lo10Up27 => 37,
            SplitScheme::S43Lo10Up27Ex6 => 43,
            SplitScheme::S64Lo10Up27Ex27 | SplitScheme::S64 => 64,
        }
    }

    /// `(size, source offset)` of every piece, lowest first.
    pub const fn pieces(self) -> &'static [(u8, u8)] {
        match self {
            SplitScheme::S32Lo5Up27 => &[(5, 0), (27, 5)],
            SplitScheme::S37Lo10Up27 => &[(10, 0), (27, 10)],
            SplitScheme::S43Lo10Up27Ex6 => &[(10, 0), (27, 10), (6, 37)],
            SplitScheme::S64Lo10Up27Ex27 => &[(10, 0), (27, 10), (27, 37)],
            SplitScheme::S16 => &[(16, 0)],
            SplitScheme::S32 => &[(32, 0)],
            SplitScheme::S64 => &[(64, 0)],
        }
    }

    /// Whether the scheme relocates a plain data word.
    pub const fn is_single(self) -> bool {
        matches!(self, SplitScheme::S16 | SplitScheme::S32 | SplitScheme::S64)
    }
}

/// Pointer-size modes a pseudo-function is available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Availability {
    /// Both modes.
    All,
    /// 32-bit mode only.
    Only32,
    /// 64-bit mode only.
    Only64,
}

impl Availability {
    /// Whether `mode` may use the pseudo-function.
    pub const fn admits(self, mode: PointerMode) -> bool {
        matches!(
            (self, mode),
            (Availability::All, _)
                | (Availability::Only32, PointerMode::Bits32)
                | (Availability::Only64, PointerMode::Bits64)
        )
    }
}

/// A named symbolic operator such as `@gotoff`.
///
/// A name may be declared several times with different schemes; the
/// operand width and the pointer mode select one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PseudoFunctionSpec {
    /// Name without the `@`.
    pub name: String,
    /// How the value is split.
    pub scheme: SplitScheme,
    /// Modes the declaration applies to.
    pub availability: Availability,
    /// Takes no symbol argument; only selects an opcode.
    pub has_no_arg: bool,
    /// Relocation emitted.
    pub relocation: RelocId,
}

/// One relocation to apply to one bitfield of an encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelocationPiece {
    /// ELF relocation.
    pub reloc: RelocType,
    /// What the value is relative to.
    pub relative: RelativeKind,
    /// Syllable holding the field, counted from the instruction start.
    pub syllable: usize,
    /// The field, `to_offset` within the syllable.
    pub bitfield: Bitfield,
}

impl RelocationPiece {
    /// Writes the piece's slice of a link-time field value.
    ///
    /// `value` is the operand's raw field value, i.e. what the relocation
    /// computes; `words` starts at the instruction's first syllable.
    ///
    /// # Panics
    ///
    /// Panics if `words` does not reach the piece's syllable.
    pub fn patch(&self, words: &mut [u32], value: u64) {
        let field = Bitfield::new(
            self.bitfield.size,
            self.bitfield.from_offset,
            (self.syllable * 32) as u16 + self.bitfield.to_offset,
        );
        field.insert(words, value);
    }
}

/// A relocation for a data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataRelocation {
    /// ELF relocation.
    pub reloc: RelocType,
    /// What the value is relative to.
    pub relative: RelativeKind,
    /// Width of the data word.
    pub bits: u32,
}

// ── Resolution ──────────────────────────────────────────────────────────

/// Resolves `@name(...)` applied to an operand.
///
/// Returns the relocation pieces in encoding order, lowest first.
/// Argument-less pseudo-functions return no pieces.
///
/// # Errors
///
/// - [`IsaError::UnknownPseudoFunction`] when no pseudo-function has that
///   name.
/// - [`IsaError::UnsupportedRelocation`] when none has the operand's width,
///   or the operand does not accept its relocation.
/// - [`IsaError::ModeMismatch`] when the matching declarations are all for
///   the other pointer mode.
pub fn resolve_pseudo_function(
    arch: &ArchDescriptor,
    name: &str,
    operand: OperandId,
    mode: PointerMode,
) -> Result<Vec<RelocationPiece>, IsaError> {
    let spec = arch.operand(operand);
    let width = u32::from(spec.width);
    let pseudo = select(
        arch,
        name,
        mode,
        |p| p.scheme.bit_size() == width,
        |p| spec.relocations.contains(&p.relocation),
        width,
    )?;
    if pseudo.has_no_arg {
        return Ok(Vec::new());
    }
    place(arch, spec, pseudo.relocation, name)
}

/// Places the operand's default relocation for a plain symbol.
pub fn place_default_relocation(
    arch: &ArchDescriptor,
    operand: OperandId,
) -> Result<Vec<RelocationPiece>, IsaError> {
    let spec = arch.operand(operand);
    let reloc = spec
        .default_relocation()
        .ok_or_else(|| IsaError::UnsupportedRelocation {
            name: spec.name.clone(),
            bits: u32::from(spec.width),
        })?;
    place(arch, spec, reloc, &spec.name)
}

/// Resolves the relocation of a data word of `bits` bits.
///
/// `function` is the pseudo-function wrapping the symbol, if any; a plain
/// symbol gets the absolute relocation of that size.
pub fn resolve_data_relocation(
    arch: &ArchDescriptor,
    function: Option<&str>,
    bits: u32,
    mode: PointerMode,
) -> Result<DataRelocation, IsaError> {
    let Some(name) = function else {
        let reloc = match bits {
            8 => RelocType::R8,
            16 => RelocType::R16,
            32 => RelocType::R32,
            64 => RelocType::R64,
            _ => {
                return Err(IsaError::UnsupportedRelocation {
                    name: String::from("data"),
                    bits,
                })
            }
        };
        return Ok(DataRelocation {
            reloc,
            relative: RelativeKind::Absolute,
            bits,
        });
    };
    let pseudo = select(
        arch,
        name,
        mode,
        |p| p.scheme.is_single() && p.scheme.bit_size() == bits,
        |_| true,
        bits,
    )?;
    let spec = arch.relocation(pseudo.relocation);
    let reloc = spec
        .relocs
        .first()
        .copied()
        .ok_or_else(|| IsaError::UnsupportedRelocation {
            name: name.into(),
            bits,
        })?;
    Ok(DataRelocation {
        reloc,
        relative: spec.relative,
        bits,
    })
}

/// Picks the declaration of `name` that fits, reporting the most specific
/// failure.
fn select<'a>(
    arch: &'a ArchDescriptor,
    name: &str,
    mode: PointerMode,
    fits: impl Fn(&PseudoFunctionSpec) -> bool,
    accepted: impl Fn(&PseudoFunctionSpec) -> bool,
    bits: u32,
) -> Result<&'a PseudoFunctionSpec, IsaError> {
    let mut named = false;
    let mut sized = false;
    let mut admitted = false;
    for pseudo in arch.pseudo_functions().iter().filter(|p| p.name == name) {
        named = true;
        if !fits(pseudo) {
            continue;
        }
        sized = true;
        if !pseudo.availability.admits(mode) {
            continue;
        }
        admitted = true;
        if accepted(pseudo) {
            return Ok(pseudo);
        }
    }
    Err(if !named {
        IsaError::UnknownPseudoFunction { name: name.into() }
    } else if sized && !admitted {
        IsaError::ModeMismatch {
            function: name.into(),
            mode,
        }
    } else {
        IsaError::UnsupportedRelocation {
            name: name.into(),
            bits,
        }
    })
}

/// Pairs the relocation's codes, lowest first, with the operand's
/// bitfields ordered by source offset.
fn place(
    arch: &ArchDescriptor,
    spec: &OperandSpec,
    reloc: RelocId,
    name: &str,
) -> Result<Vec<RelocationPiece>, IsaError> {
    let relocation = arch.relocation(reloc);
    let mut fields: Vec<Bitfield> = spec.bitfields.clone();
    fields.sort_by_key(|f| f.from_offset);
    if fields.len() != relocation.relocs.len() {
        return Err(IsaError::UnsupportedRelocation {
            name: name.into(),
            bits: u32::from(spec.width),
        });
    }
    Ok(fields
        .iter()
        .zip(&relocation.relocs)
        .map(|(field, &code)| RelocationPiece {
            reloc: code,
            relative: relocation.relative,
            syllable: field.word(),
            bitfield: Bitfield::new(field.size, field.from_offset, field.shift() as u16),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use crate::operand::OperandFlags;

    struct Fixture {
        arch: ArchDescriptor,
        s37: OperandId,
        s43: OperandId,
        s16: OperandId,
    }

    fn fixture() -> Fixture {
        let mut b = DescriptorBuilder::new("reloc-test");
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
        let gotoff43 = b.relocation(
            "gotoff_signed43",
            43,
            RelativeKind::GotRelative,
            &[
                RelocType::S43_GOTOFF_LO10,
                RelocType::S43_GOTOFF_UP27,
                RelocType::S43_GOTOFF_EX6,
            ],
        );
        let gotoff32 = b.relocation("gotoff_32", 32, RelativeKind::GotRelative, &[RelocType::R32_GOTOFF]);
        let gotaddr43 = b.relocation(
            "gotaddr_signed43",
            43,
            RelativeKind::PcRelative,
            &[
                RelocType::S43_GOTADDR_LO10,
                RelocType::S43_GOTADDR_UP27,
                RelocType::S43_GOTADDR_EX6,
            ],
        );
        b.pseudo_function("gotoff", SplitScheme::S37Lo10Up27, Availability::Only32, gotoff37);
        b.pseudo_function("gotoff", SplitScheme::S43Lo10Up27Ex6, Availability::Only64, gotoff43);
        b.pseudo_function("gotoff", SplitScheme::S32, Availability::All, gotoff32);
        b.pseudo_function_no_arg("gotaddr", SplitScheme::S43Lo10Up27Ex6, Availability::Only64, gotaddr43);
        let s37 = b.operand(
            OperandSpec::immediate("signed37", 37)
                .with_flags(OperandFlags::SIGNED | OperandFlags::CAN_EXTEND)
                .with_relocations(&[abs37, gotoff37])
                .with_bitfields(&[(27, 10, 32), (10, 0, 2)]),
        );
        let s43 = b.operand(
            OperandSpec::immediate("signed43", 43)
                .with_flags(OperandFlags::SIGNED | OperandFlags::CAN_EXTEND)
                .with_relocations(&[gotoff43, gotaddr43])
                .with_bitfields(&[(6, 37, 64), (27, 10, 32), (10, 0, 2)]),
        );
        let s16 = b.operand(
            OperandSpec::immediate("signed16", 16)
                .with_flags(OperandFlags::SIGNED)
                .with_bitfields(&[(16, 0, 0)]),
        );
        Fixture {
            arch: b.build(),
            s37,
            s43,
            s16,
        }
    }

    #[test]
    fn sixty_four_bit_only_rejected_in_32_bit_mode() {
        let fx = fixture();
        assert_eq!(
            resolve_pseudo_function(&fx.arch, "gotoff", fx.s43, PointerMode::Bits32),
            Err(IsaError::ModeMismatch {
                function: "gotoff".into(),
                mode: PointerMode::Bits32
            })
        );
    }

    #[test]
    fn sixty_four_bit_pieces_in_order() {
        let fx = fixture();
        let pieces =
            resolve_pseudo_function(&fx.arch, "gotoff", fx.s43, PointerMode::Bits64).unwrap();
        let relocs: Vec<_> = pieces.iter().map(|p| p.reloc).collect();
        assert_eq!(
            relocs,
            [
                RelocType::S43_GOTOFF_LO10,
                RelocType::S43_GOTOFF_UP27,
                RelocType::S43_GOTOFF_EX6
            ]
        );
        assert_eq!(pieces[0].syllable, 0);
        assert_eq!(pieces[0].bitfield, Bitfield::new(10, 0, 2));
        assert_eq!(pieces[1].syllable, 1);
        assert_eq!(pieces[1].bitfield, Bitfield::new(27, 10, 0));
        assert_eq!(pieces[2].syllable, 2);
        assert_eq!(pieces[2].bitfield, Bitfield::new(6, 37, 0));
        assert!(pieces
            .iter()
            .all(|p| p.relative == RelativeKind::GotRelative));
    }

    #[test]
    fn thirty_seven_bit_in_32_bit_mode() {
        let fx = fixture();
        let pieces =
            resolve_pseudo_function(&fx.arch, "gotoff", fx.s37, PointerMode::Bits32).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].reloc, RelocType::S37_GOTOFF_LO10);
        assert_eq!(
            resolve_pseudo_function(&fx.arch, "gotoff", fx.s37, PointerMode::Bits64),
            Err(IsaError::ModeMismatch {
                function: "gotoff".into(),
                mode: PointerMode::Bits64
            })
        );
    }

    #[test]
    fn unknown_and_unsupported() {
        let fx = fixture();
        assert!(matches!(
            resolve_pseudo_function(&fx.arch, "nosuch", fx.s37, PointerMode::Bits64),
            Err(IsaError::UnknownPseudoFunction { .. })
        ));
        assert_eq!(
            resolve_pseudo_function(&fx.arch, "gotoff", fx.s16, PointerMode::Bits64),
            Err(IsaError::UnsupportedRelocation {
                name: "gotoff".into(),
                bits: 16
            })
        );
    }

    #[test]
    fn no_arg_function_emits_nothing() {
        let fx = fixture();
        let pieces =
            resolve_pseudo_function(&fx.arch, "gotaddr", fx.s43, PointerMode::Bits64).unwrap();
        assert!(pieces.is_empty());
    }

    #[test]
    fn default_relocation_for_plain_symbol() {
        let fx = fixture();
        let pieces = place_default_relocation(&fx.arch, fx.s37).unwrap();
        assert_eq!(pieces[0].reloc, RelocType::S37_LO10);
        assert_eq!(pieces[1].reloc, RelocType::S37_UP27);
        assert!(place_default_relocation(&fx.arch, fx.s16).is_err());
    }

    #[test]
    fn patch_matches_direct_encoding() {
        let fx = fixture();
        let spec = fx.arch.operand(fx.s37);
        let value = -0x12_3456_789i128;
        let mut direct = [0u32; 2];
        spec.encode(value, &mut direct).unwrap();
        let raw = spec.to_field(value).unwrap();
        let mut patched = [0u32; 2];
        for piece in place_default_relocation(&fx.arch, fx.s37).unwrap() {
            piece.patch(&mut patched, raw);
        }
        assert_eq!(direct, patched);
    }

    #[test]
    fn data_relocations() {
        let fx = fixture();
        let rel = resolve_data_relocation(&fx.arch, Some("gotoff"), 32, PointerMode::Bits64);
        assert_eq!(
            rel,
            Ok(DataRelocation {
                reloc: RelocType::R32_GOTOFF,
                relative: RelativeKind::GotRelative,
                bits: 32
            })
        );
        assert_eq!(
            resolve_data_relocation(&fx.arch, None, 64, PointerMode::Bits32).map(|r| r.reloc),
            Ok(RelocType::R64)
        );
        assert!(resolve_data_relocation(&fx.arch, Some("gotoff"), 64, PointerMode::Bits64).is_err());
    }

    #[test]
    fn reloc_type_names_and_codes() {
        assert_eq!(RelocType::S37_LO10.name(), "R_KVX_S37_LO10");
        assert_eq!(RelocType::S37_LO10.code(), 20);
        assert!(RelocType::ALL
            .windows(2)
            .all(|w| w[0].code() < w[1].code()));
    }

    #[test]
    fn scheme_pieces_sum_to_width() {
        for scheme in [
            SplitScheme::S32Lo5Up27,
            SplitScheme::S37Lo10Up27,
            SplitScheme::S43Lo10Up27Ex6,
            SplitScheme::S64Lo10Up27Ex27,
            SplitScheme::S16,
            SplitScheme::S32,
            SplitScheme::S64,
        ] {
            let total: u32 = scheme.pieces().iter().map(|&(s, _)| u32::from(s)).sum();
            assert_eq!(total, scheme.bit_size());
        }
    }
}
