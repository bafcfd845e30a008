//! Architecture descriptors: the immutable tables one core variant is
//! encoded, decoded and scheduled with.
//!
//! The built-in variants come from [`ArchDescriptor::new`]. Custom
//! descriptors are declared with a [`DescriptorBuilder`], which derives the
//! codeword masks from the operand layouts and checks every table invariant
//! before handing the descriptor out.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bitfield::Bitfield;
use crate::bundle::{
    BundlingClass, BundlingId, ReservationClass, ReservationId, ReservationTable, Resource,
    ResourceId,
};
use crate::error::IsaError;
use crate::format::{Codeword, CodewordFlags, FormatId, InstructionFormat};
use crate::ir::Mnemonic;
use crate::operand::{OperandFlags, OperandId, OperandKind, OperandSpec};
use crate::register::RegisterFile;
use crate::reloc::{
    Availability, PseudoFunctionSpec, RelativeKind, RelocId, RelocType, RelocationSpec,
    SplitScheme,
};

/// Most instructions issued in one bundle.
pub const MAX_ISSUE: usize = 10;
/// Most syllables in one bundle.
pub const MAX_BUNDLE_WORDS: usize = 18;
/// Most syllables in one instruction.
pub const MAX_SYLLABLES: usize = 3;
/// Most operands in one format.
pub const MAX_OPERANDS: usize = 7;

// ── Core ────────────────────────────────────────────────────────────────

/// KVX core variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Core {
    /// Coolidge v1.
    Kv3V1,
    /// Coolidge v2.
    Kv3V2,
    /// Coolidge v4.
    Kv4V1,
}

impl Core {
    /// Every variant.
    pub const ALL: [Core; 3] = [Core::Kv3V1, Core::Kv3V2, Core::Kv4V1];

    /// Canonical name, as accepted by `-mcore=`.
    pub const fn name(self) -> &'static str {
        match self {
            Core::Kv3V1 => "kv3-1",
            Core::Kv3V2 => "kv3-2",
            Core::Kv4V1 => "kv4-1",
        }
    }

    /// Core code stored in the ELF header flags.
    pub const fn elf_code(self) -> u32 {
        match self {
            Core::Kv3V1 => 0,
            Core::Kv3V2 => 1,
            Core::Kv4V1 => 2,
        }
    }

    /// Parses a canonical name.
    pub fn from_name(name: &str) -> Option<Core> {
        Core::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── ArchDescriptor ──────────────────────────────────────────────────────

/// Every table of one architecture.
///
/// Read-only once built; share it by reference between threads.
///
/// ```rust
/// use kvx_isa::{ArchDescriptor, Core};
///
/// let arch = ArchDescriptor::new(Core::Kv3V1).unwrap();
/// assert_eq!(arch.max_issue(), 10);
/// assert!(arch.formats_for("addd").count() > 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchDescriptor {
    name: String,
    core: Option<Core>,
    max_issue: usize,
    max_bundle_words: usize,
    parallel_bit: u32,
    registers: RegisterFile,
    operands: Vec<OperandSpec>,
    formats: Vec<InstructionFormat>,
    relocations: Vec<RelocationSpec>,
    pseudo_functions: Vec<PseudoFunctionSpec>,
    bundling: Vec<BundlingClass>,
    reservations: ReservationTable,
}

impl ArchDescriptor {
    /// Built-in descriptor of `core`.
    ///
    /// # Errors
    ///
    /// [`IsaError::UnsupportedCore`] when the core's feature is disabled.
    pub fn new(core: Core) -> Result<Self, IsaError> {
        crate::tables::build(core)
    }

    /// Descriptor name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Core variant, `None` for custom descriptors.
    #[inline]
    pub fn core(&self) -> Option<Core> {
        self.core
    }

    /// Issue width.
    #[inline]
    pub fn max_issue(&self) -> usize {
        self.max_issue
    }

    /// Bundle size limit in syllables.
    #[inline]
    pub fn max_bundle_words(&self) -> usize {
        self.max_bundle_words
    }

    /// Bit marking "bundle continues" in every syllable.
    #[inline]
    pub fn parallel_bit(&self) -> u32 {
        self.parallel_bit
    }

    /// Register banks and classes.
    #[inline]
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// All operand descriptions.
    #[inline]
    pub fn operands(&self) -> &[OperandSpec] {
        &self.operands
    }

    /// Operand by id.
    #[inline]
    pub fn operand(&self, id: OperandId) -> &OperandSpec {
        &self.operands[id.index()]
    }

    /// Operand by name.
    pub fn find_operand(&self, name: &str) -> Option<OperandId> {
        self.operands
            .iter()
            .position(|o| o.name == name)
            .map(|i| OperandId(i as u16))
    }

    /// All formats, in matching order.
    #[inline]
    pub fn formats(&self) -> &[InstructionFormat] {
        &self.formats
    }

    /// Format by id.
    #[inline]
    pub fn format(&self, id: FormatId) -> &InstructionFormat {
        &self.formats[id.index()]
    }

    /// Formats of `mnemonic`, in matching order.
    pub fn formats_for<'a>(&'a self, mnemonic: &'a str) -> impl Iterator<Item = FormatId> + 'a {
        self.formats
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.mnemonic.as_str() == mnemonic)
            .map(|(i, _)| FormatId(i as u16))
    }

    /// All relocation descriptions.
    #[inline]
    pub fn relocations(&self) -> &[RelocationSpec] {
        &self.relocations
    }

    /// Relocation by id.
    #[inline]
    pub fn relocation(&self, id: RelocId) -> &RelocationSpec {
        &self.relocations[id.index()]
    }

    /// Pseudo-function declarations; a name may appear several times.
    #[inline]
    pub fn pseudo_functions(&self) -> &[PseudoFunctionSpec] {
        &self.pseudo_functions
    }

    /// Bundling classes.
    #[inline]
    pub fn bundling(&self) -> &[BundlingClass] {
        &self.bundling
    }

    /// Resources and reservation classes.
    #[inline]
    pub fn reservations(&self) -> &ReservationTable {
        &self.reservations
    }

    /// Checks every table invariant.
    ///
    /// # Panics
    ///
    /// Panics, naming the offending entry, when an invariant does not hold:
    /// malformed bitfields, codewords that leave bits unaccounted for or
    /// that overlap another format, dangling ids, inconsistent relocation
    /// splits, reservation rows that do not match the resources.
    pub fn validate(&self) {
        self.validate_reservations();
        self.validate_registers();
        for (i, op) in self.operands.iter().enumerate() {
            self.validate_operand(i, op);
        }
        for pseudo in &self.pseudo_functions {
            self.validate_pseudo(pseudo);
        }
        for format in &self.formats {
            self.validate_format(format);
        }
        self.validate_overlaps();
    }

    fn validate_reservations(&self) {
        let table = &self.reservations;
        let n = table.resources.len();
        for r in &table.resources {
            assert!(r.capacity >= 1, "{}: resource {} has no capacity", self.name, r.name);
        }
        for class in &table.classes {
            assert_eq!(
                class.usage.len(),
                table.cycles,
                "{}: reservation {} does not cover {} cycles",
                self.name,
                class.name,
                table.cycles
            );
            for row in &class.usage {
                assert_eq!(
                    row.len(),
                    n,
                    "{}: reservation {} row does not cover {} resources",
                    self.name,
                    class.name,
                    n
                );
                for (units, r) in row.iter().zip(&table.resources) {
                    assert!(
                        *units <= r.capacity,
                        "{}: reservation {} alone over-subscribes {}",
                        self.name,
                        class.name,
                        r.name
                    );
                }
            }
        }
        for class in &self.bundling {
            let base = self.bundling.get(class.base.index());
            assert!(
                base.is_some_and(|b| b.base == class.base),
                "{}: bundling class {} has no unqualified base",
                self.name,
                class.name
            );
        }
    }

    fn validate_registers(&self) {
        for class in &self.registers.classes {
            assert!(
                class.stride >= 1 && class.align >= 1,
                "{}: register class {} needs a stride and alignment",
                self.name,
                class.name
            );
            let size = self.registers.bank(class.bank).map_or(0, |b| b.size());
            assert!(
                class.first <= class.last && usize::from(class.last) < size,
                "{}: register class {} exceeds bank {}",
                self.name,
                class.name,
                class.bank
            );
        }
    }

    fn validate_operand(&self, index: usize, op: &OperandSpec) {
        let name = &op.name;
        assert!(
            (1..=64).contains(&op.width),
            "{}: operand {} has width {}",
            self.name,
            name,
            op.width
        );
        assert!(
            op.shift < 64,
            "{}: operand {} has shift {}, at most 63",
            self.name,
            name,
            op.shift
        );
        assert!(!op.bitfields.is_empty(), "{}: operand {} has no bitfields", self.name, name);
        let mut total = 0u32;
        let mut sources = 0u64;
        for (i, field) in op.bitfields.iter().enumerate() {
            assert!(
                field.is_well_formed(),
                "{}: operand {} has malformed bitfield {:?}",
                self.name,
                name,
                field
            );
            assert!(
                u32::from(field.from_offset) + u32::from(field.size) <= u32::from(op.width),
                "{}: operand {} bitfield reads past width",
                self.name,
                name
            );
            assert_eq!(
                sources & field.source_mask(),
                0,
                "{}: operand {} reads a value bit twice",
                self.name,
                name
            );
            assert_eq!(
                field.mask() & self.parallel_bit,
                0,
                "{}: operand {} overwrites the parallel bit",
                self.name,
                name
            );
            for other in &op.bitfields[..i] {
                assert!(
                    other.word() != field.word() || other.mask() & field.mask() == 0,
                    "{}: operand {} bitfields overlap",
                    self.name,
                    name
                );
            }
            sources |= field.source_mask();
            total += u32::from(field.size);
        }
        assert_eq!(
            total,
            u32::from(op.width),
            "{}: operand {} bitfields do not add up to its width",
            self.name,
            name
        );
        assert!(
            op.word_span() <= 1 || op.flags.contains(OperandFlags::CAN_EXTEND),
            "{}: operand {} spans syllables without CAN_EXTEND",
            self.name,
            name
        );
        let values = 1u128 << op.width;
        match &op.kind {
            OperandKind::Immediate => {}
            OperandKind::Register(class) => {
                let class = self.registers.classes.get(class.index());
                assert!(
                    class.is_some_and(|c| c.len() as u128 <= values),
                    "{}: operand {} register class does not fit",
                    self.name,
                    name
                );
            }
            OperandKind::Modifier(list) => assert!(
                !list.is_empty() && list.len() as u128 <= values,
                "{}: operand {} modifier list does not fit",
                self.name,
                name
            ),
        }
        for id in &op.relocations {
            let rel = self.relocations.get(id.index());
            assert!(
                rel.is_some_and(|r| r.bit_size == op.width && r.relocs.len() == op.bitfields.len()),
                "{}: operand {} (#{}) lists a relocation that does not fit it",
                self.name,
                name,
                index
            );
        }
    }

    fn validate_pseudo(&self, pseudo: &PseudoFunctionSpec) {
        let rel = self.relocations.get(pseudo.relocation.index());
        let pieces = pseudo.scheme.pieces();
        assert!(
            rel.is_some_and(|r| {
                r.relocs.len() == pieces.len() && u32::from(r.bit_size) == pseudo.scheme.bit_size()
            }),
            "{}: pseudo-function {} relocation does not match its scheme",
            self.name,
            pseudo.name
        );
        if pseudo.scheme.is_single() {
            return;
        }
        for op in self.operands.iter().filter(|o| o.relocations.contains(&pseudo.relocation)) {
            let mut fields: Vec<Bitfield> = op.bitfields.clone();
            fields.sort_by_key(|f| f.from_offset);
            let layout: Vec<(u8, u8)> = fields.iter().map(|f| (f.size, f.from_offset)).collect();
            assert_eq!(
                layout.as_slice(),
                pieces,
                "{}: pseudo-function {} splits operand {} differently",
                self.name,
                pseudo.name,
                op.name
            );
        }
    }

    fn validate_format(&self, format: &InstructionFormat) {
        let m = format.mnemonic.as_str();
        let words = format.codewords.len();
        assert!(
            (1..=MAX_SYLLABLES).contains(&words),
            "{}: {} has {} codewords",
            self.name,
            m,
            words
        );
        assert!(
            format.operands.len() <= MAX_OPERANDS,
            "{}: {} has too many operands",
            self.name,
            m
        );
        assert!(
            format.bundling.index() < self.bundling.len()
                && format.reservation.index() < self.reservations.classes.len(),
            "{}: {} names an unknown bundling or reservation class",
            self.name,
            m
        );
        let specs: Vec<&OperandSpec> = format
            .operands
            .iter()
            .map(|id| {
                assert!(
                    id.index() < self.operands.len(),
                    "{}: {} names an unknown operand",
                    self.name,
                    m
                );
                self.operand(*id)
            })
            .collect();
        for (w, cw) in format.codewords.iter().enumerate() {
            assert_eq!(
                cw.is_extension(),
                w > 0,
                "{}: {} extension flag misplaced on syllable {}",
                self.name,
                m,
                w
            );
            assert_eq!(
                cw.opcode & !cw.mask,
                0,
                "{}: {} opcode has bits outside its mask",
                self.name,
                m
            );
            assert_eq!(cw.mask & self.parallel_bit, 0, "{}: {} fixes the parallel bit", self.name, m);
            let mut operand_bits = 0u32;
            for spec in &specs {
                let bits = spec.coverage(w);
                assert_eq!(
                    operand_bits & bits,
                    0,
                    "{}: {} operands overlap in syllable {}",
                    self.name,
                    m,
                    w
                );
                operand_bits |= bits;
            }
            assert_eq!(
                operand_bits & cw.mask,
                0,
                "{}: {} operand bits overlap fixed bits in syllable {}",
                self.name,
                m,
                w
            );
            assert_eq!(
                operand_bits | cw.mask | self.parallel_bit,
                u32::MAX,
                "{}: {} leaves bits of syllable {} unaccounted for",
                self.name,
                m,
                w
            );
        }
        for spec in &specs {
            assert!(
                spec.word_span() <= words,
                "{}: {} operand {} reaches past the last syllable",
                self.name,
                m,
                spec.name
            );
        }
        assert_eq!(
            format.format_string.matches("%s").count(),
            format.operands.len(),
            "{}: {} format string does not match its operands",
            self.name,
            m
        );
    }

    fn validate_overlaps(&self) {
        for (i, a) in self.formats.iter().enumerate() {
            for b in &self.formats[i + 1..] {
                let clash = a.shares_mode_with(b) && a.codewords[0].overlaps(&b.codewords[0]);
                assert!(
                    !clash,
                    "{}: codewords of {} and {} overlap",
                    self.name,
                    a.mnemonic,
                    b.mnemonic
                );
            }
        }
    }
}

// ── DescriptorBuilder ───────────────────────────────────────────────────

/// Declares a custom architecture descriptor.
///
/// ```rust
/// use kvx_isa::{DescriptorBuilder, OperandFlags, OperandSpec};
///
/// let mut b = DescriptorBuilder::new("tiny");
/// let issue = b.resource("ISSUE", 1);
/// let alu = b.reservation("ALU", &[&[issue]]);
/// let lane = b.bundling("ALU");
/// let imm = b.operand(
///     OperandSpec::immediate("signed16", 16)
///         .with_flags(OperandFlags::SIGNED)
///         .with_bitfields(&[(16, 0, 0)]),
/// );
/// b.format("li", " %s")
///     .opcode(&[0x0100_0000])
///     .operands(&[imm])
///     .classes(lane, alu)
///     .add();
/// let arch = b.build();
/// assert_eq!(arch.formats().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    core: Option<Core>,
    max_issue: usize,
    max_bundle_words: usize,
    parallel_bit: u32,
    cycles: usize,
    registers: RegisterFile,
    operands: Vec<OperandSpec>,
    formats: Vec<InstructionFormat>,
    relocations: Vec<RelocationSpec>,
    pseudo_functions: Vec<PseudoFunctionSpec>,
    bundling: Vec<BundlingClass>,
    resources: Vec<Resource>,
    reservations: Vec<(String, Vec<Vec<ResourceId>>)>,
}

impl DescriptorBuilder {
    /// An empty descriptor with the KVX bundle limits and parallel bit.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            core: None,
            max_issue: MAX_ISSUE,
            max_bundle_words: MAX_BUNDLE_WORDS,
            parallel_bit: 1 << 31,
            cycles: 1,
            registers: RegisterFile::new(),
            operands: Vec::new(),
            formats: Vec::new(),
            relocations: Vec::new(),
            pseudo_functions: Vec::new(),
            bundling: Vec::new(),
            resources: Vec::new(),
            reservations: Vec::new(),
        }
    }

    /// Tags the descriptor with a core variant.
    pub fn set_core(&mut self, core: Core) -> &mut Self {
        self.core = Some(core);
        self
    }

    /// Sets the issue width and the bundle size in syllables.
    pub fn set_bundle_limits(&mut self, max_issue: usize, max_words: usize) -> &mut Self {
        self.max_issue = max_issue;
        self.max_bundle_words = max_words;
        self
    }

    /// Sets the bundle-continuation bit.
    pub fn set_parallel_bit(&mut self, bit: u32) -> &mut Self {
        self.parallel_bit = bit;
        self
    }

    /// Sets the number of cycles reservation rows cover.
    pub fn set_reservation_cycles(&mut self, cycles: usize) -> &mut Self {
        self.cycles = cycles;
        self
    }

    /// Declares a resource usable by `capacity` instructions per cycle.
    pub fn resource(&mut self, name: &str, capacity: u8) -> ResourceId {
        let id = ResourceId(self.resources.len() as u16);
        self.resources.push(Resource {
            name: name.into(),
            capacity,
        });
        id
    }

    /// Declares a reservation class from the resources used at each cycle.
    ///
    /// A resource listed `n` times in one cycle takes `n` units of it.
    /// Rows shorter than the reservation cycle count are padded with idle
    /// cycles.
    pub fn reservation(&mut self, name: &str, cycles: &[&[ResourceId]]) -> ReservationId {
        let id = ReservationId(self.reservations.len() as u16);
        let rows = cycles.iter().map(|used| used.to_vec()).collect();
        self.reservations.push((name.into(), rows));
        id
    }

    /// Declares an unqualified bundling class.
    pub fn bundling(&mut self, name: &str) -> BundlingId {
        let id = BundlingId(self.bundling.len() as u16);
        self.bundling.push(BundlingClass {
            name: name.into(),
            base: id,
        });
        id
    }

    /// Declares a lane-qualified bundling class of `base`.
    pub fn bundling_lane(&mut self, name: &str, base: BundlingId) -> BundlingId {
        let id = BundlingId(self.bundling.len() as u16);
        self.bundling.push(BundlingClass {
            name: name.into(),
            base,
        });
        id
    }

    /// The register file under construction.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Declares a relocation realized by `relocs`, lowest piece first.
    pub fn relocation(
        &mut self,
        name: &str,
        bit_size: u8,
        relative: RelativeKind,
        relocs: &[RelocType],
    ) -> RelocId {
        let id = RelocId(self.relocations.len() as u16);
        self.relocations.push(RelocationSpec {
            name: name.into(),
            bit_size,
            relative,
            relocs: relocs.to_vec(),
        });
        id
    }

    /// Declares one form of pseudo-function `name`.
    pub fn pseudo_function(
        &mut self,
        name: &str,
        scheme: SplitScheme,
        availability: Availability,
        relocation: RelocId,
    ) -> &mut Self {
        self.push_pseudo(name, scheme, availability, relocation, false)
    }

    /// Declares one form of an argument-less pseudo-function.
    pub fn pseudo_function_no_arg(
        &mut self,
        name: &str,
        scheme: SplitScheme,
        availability: Availability,
        relocation: RelocId,
    ) -> &mut Self {
        self.push_pseudo(name, scheme, availability, relocation, true)
    }

    fn push_pseudo(
        &mut self,
        name: &str,
        scheme: SplitScheme,
        availability: Availability,
        relocation: RelocId,
        has_no_arg: bool,
    ) -> &mut Self {
        self.pseudo_functions.push(PseudoFunctionSpec {
            name: name.into(),
            scheme,
            availability,
            has_no_arg,
            relocation,
        });
        self
    }

    /// Declares an operand.
    pub fn operand(&mut self, spec: OperandSpec) -> OperandId {
        let id = OperandId(self.operands.len() as u16);
        self.operands.push(spec);
        id
    }

    /// Starts a format of `mnemonic`; finish it with [`FormatBuilder::add`].
    pub fn format<'b>(&'b mut self, mnemonic: &str, format_string: &str) -> FormatBuilder<'b> {
        FormatBuilder {
            builder: self,
            mnemonic: Mnemonic::from(mnemonic),
            format_string: format_string.into(),
            opcode: Vec::new(),
            operands: Vec::new(),
            bundling: BundlingId(0),
            reservation: ReservationId(0),
            flags: CodewordFlags::empty(),
        }
    }

    /// Finishes the descriptor.
    ///
    /// # Panics
    ///
    /// Panics when the tables violate an invariant; see
    /// [`ArchDescriptor::validate`].
    pub fn build(self) -> ArchDescriptor {
        let cycles = self.cycles;
        let n = self.resources.len();
        let classes = self
            .reservations
            .into_iter()
            .map(|(name, rows)| {
                let mut usage: Vec<Vec<u8>> = rows
                    .iter()
                    .map(|used| {
                        let mut counts = alloc::vec![0u8; n];
                        for r in used {
                            assert!(
                                r.index() < n,
                                "{}: reservation {} names an unknown resource",
                                self.name,
                                name
                            );
                            counts[r.index()] = counts[r.index()].saturating_add(1);
                        }
                        counts
                    })
                    .collect();
                if usage.len() < cycles {
                    usage.resize(cycles, alloc::vec![0u8; n]);
                }
                ReservationClass { name, usage }
            })
            .collect();
        let arch = ArchDescriptor {
            name: self.name,
            core: self.core,
            max_issue: self.max_issue,
            max_bundle_words: self.max_bundle_words,
            parallel_bit: self.parallel_bit,
            registers: self.registers,
            operands: self.operands,
            formats: self.formats,
            relocations: self.relocations,
            pseudo_functions: self.pseudo_functions,
            bundling: self.bundling,
            reservations: ReservationTable {
                cycles,
                resources: self.resources,
                classes,
            },
        };
        arch.validate();
        log::debug!(
            "built {} descriptor: {} formats, {} operands, {} reservation classes",
            arch.name,
            arch.formats.len(),
            arch.operands.len(),
            arch.reservations.classes.len()
        );
        arch
    }
}

/// One format under construction.
///
/// Codeword masks are not written by hand: every bit that no operand owns
/// in a syllable is fixed, except the parallel bit.
#[must_use = "a format is only recorded by `add`"]
pub struct FormatBuilder<'b> {
    builder: &'b mut DescriptorBuilder,
    mnemonic: Mnemonic,
    format_string: String,
    opcode: Vec<u32>,
    operands: Vec<OperandId>,
    bundling: BundlingId,
    reservation: ReservationId,
    flags: CodewordFlags,
}

impl FormatBuilder<'_> {
    /// Fixed bits of each syllable, leading syllable first.
    pub fn opcode(mut self, words: &[u32]) -> Self {
        self.opcode = words.to_vec();
        self
    }

    /// Operands in assembly order.
    pub fn operands(mut self, operands: &[OperandId]) -> Self {
        self.operands = operands.to_vec();
        self
    }

    /// Bundling and reservation classes.
    pub fn classes(mut self, bundling: BundlingId, reservation: ReservationId) -> Self {
        self.bundling = bundling;
        self.reservation = reservation;
        self
    }

    /// Flags of the leading codeword.
    pub fn flags(mut self, flags: CodewordFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Records the format and returns its id.
    pub fn add(self) -> FormatId {
        let builder = self.builder;
        let parallel = builder.parallel_bit;
        let codewords = self
            .opcode
            .iter()
            .enumerate()
            .map(|(w, &opcode)| {
                let operand_bits = self
                    .operands
                    .iter()
                    .filter_map(|id| builder.operands.get(id.index()))
                    .fold(0u32, |bits, spec| bits | spec.coverage(w));
                Codeword {
                    opcode,
                    mask: !operand_bits & !parallel,
                    flags: if w == 0 { self.flags } else { CodewordFlags::IMMX },
                }
            })
            .collect();
        let id = FormatId(builder.formats.len() as u16);
        builder.formats.push(InstructionFormat {
            mnemonic: self.mnemonic,
            codewords,
            operands: self.operands,
            bundling: self.bundling,
            reservation: self.reservation,
            format_string: self.format_string,
        });
        id
    }
}
