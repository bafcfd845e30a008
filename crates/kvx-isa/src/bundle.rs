//! Bundle legality: resource reservation tables and the checker that
//! rejects over-subscribed bundles.
//!
//! Each instruction belongs to a reservation class whose row counts, for
//! every cycle after issue, the units of each resource it occupies. Wide
//! forms take one ISSUE unit per syllable. A bundle is legal when no
//! resource is used beyond its capacity in any cycle, the issue width is
//! respected and the syllables fit the bundle.

use alloc::string::String;
use alloc::vec::Vec;

use crate::decoder::{decode_instruction, DecodedInstruction};
use crate::descriptor::ArchDescriptor;
use crate::encoder::{encode_instruction, EncodedInstruction, Fixup};
use crate::error::{BundleLimit, IsaError};
use crate::ir::{Instruction, PointerMode};

table_id! {
    /// Index of a [`Resource`] in a [`ReservationTable`]; also its column
    /// in usage rows.
    ResourceId
}

table_id! {
    /// Index of a [`ReservationClass`].
    ReservationId
}

table_id! {
    /// Index of a [`BundlingClass`].
    BundlingId
}

/// A hardware resource.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    /// Name used in conflict reports.
    pub name: String,
    /// Units available in one cycle.
    pub capacity: u8,
}

/// Per-cycle resource usage shared by instructions with the same timing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReservationClass {
    /// Class name.
    pub name: String,
    /// Per cycle, units taken of each resource, indexed by [`ResourceId`].
    pub usage: Vec<Vec<u8>>,
}

/// Resources and reservation classes of an architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReservationTable {
    /// Number of cycles every row covers.
    pub cycles: usize,
    /// Resources.
    pub resources: Vec<Resource>,
    /// Reservation classes.
    pub classes: Vec<ReservationClass>,
}

impl ReservationTable {
    /// Class by id.
    #[inline]
    pub fn class(&self, id: ReservationId) -> &ReservationClass {
        &self.classes[id.index()]
    }

    /// Units of each resource class `id` takes at `cycle`; empty past the
    /// row.
    #[inline]
    pub fn usage(&self, id: ReservationId, cycle: usize) -> &[u8] {
        self.class(id).usage.get(cycle).map_or(&[], Vec::as_slice)
    }

    /// Resource by name.
    pub fn resource(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.name == name)
            .map(|i| ResourceId(i as u16))
    }

    /// Reservation class by name.
    pub fn find_class(&self, name: &str) -> Option<ReservationId> {
        self.classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| ReservationId(i as u16))
    }
}

/// A bundling class, lane-qualified or not.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BundlingClass {
    /// Class name, e.g. `TINY_X`.
    pub name: String,
    /// The unqualified class (`TINY` for `TINY_X`); itself when unqualified.
    pub base: BundlingId,
}

/// What the checker needs to know about one bundled instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BundleSlot {
    /// Reservation class.
    pub reservation: ReservationId,
    /// Syllables, extension syllables included.
    pub words: usize,
}

impl From<&EncodedInstruction> for BundleSlot {
    fn from(insn: &EncodedInstruction) -> Self {
        Self {
            reservation: insn.reservation,
            words: insn.words.len(),
        }
    }
}

impl From<&DecodedInstruction> for BundleSlot {
    fn from(insn: &DecodedInstruction) -> Self {
        Self {
            reservation: insn.reservation,
            words: insn.word_count,
        }
    }
}

/// Checks that `slots` may issue together.
///
/// Cycles are scanned first, then instructions left to right, then
/// resources from the lowest index, so the reported conflict is stable.
///
/// # Errors
///
/// [`IsaError::BundleOverflow`] when the issue width or the bundle word
/// count is exceeded, [`IsaError::ResourceConflict`] for the first
/// over-subscribed resource.
pub fn check_bundle(arch: &ArchDescriptor, slots: &[BundleSlot]) -> Result<(), IsaError> {
    if slots.len() > arch.max_issue() {
        return Err(IsaError::BundleOverflow {
            limit: BundleLimit::Issue,
            count: slots.len(),
            max: arch.max_issue(),
        });
    }
    let words: usize = slots.iter().map(|s| s.words).sum();
    if words > arch.max_bundle_words() {
        return Err(IsaError::BundleOverflow {
            limit: BundleLimit::Words,
            count: words,
            max: arch.max_bundle_words(),
        });
    }

    let table = arch.reservations();
    let n = table.resources.len();
    let mut used = alloc::vec![0u32; n];
    let mut first: Vec<Option<usize>> = alloc::vec![None; n];
    for cycle in 0..table.cycles {
        used.fill(0);
        first.fill(None);
        for (i, slot) in slots.iter().enumerate() {
            let row = table.usage(slot.reservation, cycle);
            for (r, &units) in row.iter().enumerate().filter(|&(_, &u)| u > 0) {
                used[r] += u32::from(units);
                let owner = *first[r].get_or_insert(i);
                let resource = &table.resources[r];
                if used[r] > u32::from(resource.capacity) {
                    log::debug!(
                        "bundle rejected: {} over-subscribed at cycle {} ({} and {})",
                        resource.name,
                        cycle,
                        owner,
                        i
                    );
                    return Err(IsaError::ResourceConflict {
                        resource: resource.name.clone(),
                        cycle,
                        first: owner,
                        second: i,
                    });
                }
            }
        }
    }
    Ok(())
}

// ── Bundle encoding ─────────────────────────────────────────────────────

/// Syllables of a legal bundle with its pending relocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBundle {
    /// Syllables; all but the last carry the parallel bit.
    pub words: Vec<u32>,
    /// Fixups, `piece.syllable` counted from the bundle start.
    pub fixups: Vec<Fixup>,
    /// Per-instruction encodings, in bundle order.
    pub instructions: Vec<EncodedInstruction>,
}

impl EncodedBundle {
    /// Little-endian bytes of the bundle.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// Encodes, checks and lays out one bundle.
pub fn encode_bundle(
    arch: &ArchDescriptor,
    instructions: &[Instruction],
    mode: PointerMode,
) -> Result<EncodedBundle, IsaError> {
    let encoded = instructions
        .iter()
        .map(|insn| encode_instruction(arch, insn, mode))
        .collect::<Result<Vec<_>, _>>()?;
    let slots: Vec<BundleSlot> = encoded.iter().map(BundleSlot::from).collect();
    check_bundle(arch, &slots)?;

    let mut words = Vec::with_capacity(slots.iter().map(|s| s.words).sum());
    let mut fixups = Vec::new();
    for insn in &encoded {
        let base = words.len();
        fixups.extend(insn.fixups.iter().map(|fixup| {
            let mut fixup = fixup.clone();
            fixup.piece.syllable += base;
            fixup
        }));
        words.extend_from_slice(&insn.words);
    }
    let parallel = arch.parallel_bit();
    let last = words.len().saturating_sub(1);
    for (i, word) in words.iter_mut().enumerate() {
        if i < last {
            *word |= parallel;
        }
    }
    Ok(EncodedBundle {
        words,
        fixups,
        instructions: encoded,
    })
}

/// A decoded bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBundle {
    /// Instructions in bundle order.
    pub instructions: Vec<DecodedInstruction>,
    /// Syllables consumed.
    pub word_count: usize,
}

/// Decodes the bundle at the start of `words`.
///
/// The bundle ends with the first syllable whose parallel bit is clear.
///
/// # Errors
///
/// [`IsaError::Truncated`] when no syllable ends the bundle,
/// [`IsaError::IllegalInstruction`] when an instruction runs past the end
/// of the bundle or does not decode, and [`IsaError::BundleOverflow`] when
/// the bundle exceeds the architecture limits.
pub fn decode_bundle(
    arch: &ArchDescriptor,
    words: &[u32],
    mode: PointerMode,
) -> Result<DecodedBundle, IsaError> {
    let parallel = arch.parallel_bit();
    let end = words
        .iter()
        .position(|w| w & parallel == 0)
        .map(|i| i + 1)
        .ok_or(IsaError::Truncated {
            needed: words.len() + 1,
            available: words.len(),
        })?;
    if end > arch.max_bundle_words() {
        return Err(IsaError::BundleOverflow {
            limit: BundleLimit::Words,
            count: end,
            max: arch.max_bundle_words(),
        });
    }

    let bundle = &words[..end];
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < end {
        let insn = match decode_instruction(arch, &bundle[offset..], mode) {
            Ok(insn) => insn,
            Err(IsaError::Truncated { .. }) => {
                return Err(IsaError::IllegalInstruction {
                    word: bundle[offset],
                })
            }
            Err(e) => return Err(e),
        };
        offset += insn.word_count;
        instructions.push(insn);
    }
    if instructions.len() > arch.max_issue() {
        return Err(IsaError::BundleOverflow {
            limit: BundleLimit::Issue,
            count: instructions.len(),
            max: arch.max_issue(),
        });
    }
    Ok(DecodedBundle {
        instructions,
        word_count: end,
    })
}
