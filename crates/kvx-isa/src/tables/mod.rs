//! Built-in descriptors of the KVX cores.
//!
//! Syllable layout shared by every core:
//!
//! ```text
//!  31  30..27  26..24  23..18  17..12  11..6  5..0
//!  P   group   subop   W       Z       Y      low
//! ```
//!
//! Group 0 is reserved for immediate extension syllables.
//!
//! The opcode values below are a synthetic subset laid out for this crate.
//! They are not the opcodes of real KVX silicon, so code encoded with these
//! tables does not run on hardware and real object code does not decode.

#![cfg_attr(
    not(all(feature = "kv3-1", feature = "kv3-2", feature = "kv4-1")),
    allow(dead_code, unused_imports)
)]

use alloc::format;
use alloc::vec::Vec;

use crate::bundle::{BundlingId, ReservationId, ResourceId};
use crate::descriptor::{ArchDescriptor, Core, DescriptorBuilder, FormatBuilder};
use crate::error::IsaError;
use crate::format::CodewordFlags;
use crate::operand::{OperandFlags, OperandId, OperandSpec};
use crate::register::{Bank, BankInfo, RegClassId};
use crate::reloc::{Availability, RelativeKind, RelocId, RelocType, SplitScheme};

#[cfg(any(feature = "kv3-1", feature = "kv3-2"))]
mod kv3;
#[cfg(feature = "kv3-1")]
mod kv3_v1;
#[cfg(feature = "kv3-2")]
mod kv3_v2;
#[cfg(feature = "kv4-1")]
mod kv4_v1;

pub(crate) fn build(core: Core) -> Result<ArchDescriptor, IsaError> {
    match core {
        #[cfg(feature = "kv3-1")]
        Core::Kv3V1 => Ok(kv3_v1::build()),
        #[cfg(feature = "kv3-2")]
        Core::Kv3V2 => Ok(kv3_v2::build()),
        #[cfg(feature = "kv4-1")]
        Core::Kv4V1 => Ok(kv4_v1::build()),
        #[allow(unreachable_patterns)]
        _ => Err(IsaError::UnsupportedCore { core }),
    }
}

/// Fixed bits of a leading syllable.
const fn op(group: u32, subop: u32) -> u32 {
    group << 27 | subop << 24
}

/// Fixed bits of an extension syllable.
const IMMX: u32 = 0;

// ── Registers ───────────────────────────────────────────────────────────

const SYSTEM_NAMES: &[&str] = &[
    "$pc", "$ps", "$pcr", "$ra", "$cs", "$csmem", "$aespc", "$ls", "$le", "$lc", "$ipe", "$men",
    "$pmc", "$pm0", "$pm1", "$pm2", "$pm3", "$pmsa", "$tcr", "$t0v", "$t1v", "$t0r", "$t1r",
    "$wdv", "$wdr", "$ile", "$ill", "$ilr", "$mmc", "$tel", "$teh", "$ixc", "$syo", "$hto",
    "$ito", "$do", "$mo", "$pso",
];

pub(super) struct Regs {
    pub single: RegClassId,
    pub paired: RegClassId,
    pub quad: RegClassId,
    pub vector: RegClassId,
    pub buffer2: RegClassId,
    pub buffer4: RegClassId,
    pub buffer8: RegClassId,
    pub system: RegClassId,
}

fn registers(b: &mut DescriptorBuilder, vector_units: u16) -> Regs {
    let rf = b.registers_mut();
    rf.add_bank(BankInfo::numbered(Bank::Gpr, "$r", 64));
    rf.add_bank(BankInfo::numbered(Bank::Vector, "$a", vector_units));
    rf.add_bank(BankInfo::named(Bank::System, "$s", 64, SYSTEM_NAMES));
    for (alias, index) in [("$sp", 12), ("$tp", 13), ("$fp", 14)] {
        rf.add_alias(alias, Bank::Gpr, index);
    }
    let last = vector_units - 1;
    let regs = Regs {
        single: rf.add_class("single", Bank::Gpr, 1, 1, 0, 63),
        paired: rf.add_class("paired", Bank::Gpr, 2, 2, 0, 63),
        quad: rf.add_class("quad", Bank::Gpr, 4, 4, 0, 63),
        vector: rf.add_class("vector", Bank::Vector, 1, 1, 0, last),
        buffer2: rf.add_class("buffer2", Bank::Vector, 2, 2, 0, last),
        buffer4: rf.add_class("buffer4", Bank::Vector, 4, 4, 0, last),
        buffer8: rf.add_class("buffer8", Bank::Vector, 8, 8, 0, last),
        system: rf.add_class("system", Bank::System, 1, 1, 0, 63),
    };
    // wider buffers are reachable through lookup and classify only
    for width in [16u8, 32, 64] {
        if u16::from(width) <= vector_units {
            rf.add_class(&format!("buffer{}", width), Bank::Vector, width, width, 0, last);
        }
    }
    regs
}

// ── Relocations ─────────────────────────────────────────────────────────

/// Relocation families split as 10+27 (37-bit) and 10+27+6 (43-bit).
const FAMILIES: [(&str, RelativeKind, [RelocType; 2], [RelocType; 3]); 10] = {
    use RelocType::*;
    [
        ("signed", RelativeKind::Absolute, [S37_LO10, S37_UP27], [S43_LO10, S43_UP27, S43_EX6]),
        (
            "pcrel",
            RelativeKind::PcRelative,
            [S37_PCREL_LO10, S37_PCREL_UP27],
            [S43_PCREL_LO10, S43_PCREL_UP27, S43_PCREL_EX6],
        ),
        (
            "gotoff",
            RelativeKind::GotRelative,
            [S37_GOTOFF_LO10, S37_GOTOFF_UP27],
            [S43_GOTOFF_LO10, S43_GOTOFF_UP27, S43_GOTOFF_EX6],
        ),
        (
            "got",
            RelativeKind::GotRelative,
            [S37_GOT_LO10, S37_GOT_UP27],
            [S43_GOT_LO10, S43_GOT_UP27, S43_GOT_EX6],
        ),
        (
            "gotaddr",
            RelativeKind::PcRelative,
            [S37_GOTADDR_LO10, S37_GOTADDR_UP27],
            [S43_GOTADDR_LO10, S43_GOTADDR_UP27, S43_GOTADDR_EX6],
        ),
        (
            "tlsgd",
            RelativeKind::GotRelative,
            [S37_TLS_GD_LO10, S37_TLS_GD_UP27],
            [S43_TLS_GD_LO10, S43_TLS_GD_UP27, S43_TLS_GD_EX6],
        ),
        (
            "tlsld",
            RelativeKind::GotRelative,
            [S37_TLS_LD_LO10, S37_TLS_LD_UP27],
            [S43_TLS_LD_LO10, S43_TLS_LD_UP27, S43_TLS_LD_EX6],
        ),
        (
            "tlsie",
            RelativeKind::GotRelative,
            [S37_TLS_IE_LO10, S37_TLS_IE_UP27],
            [S43_TLS_IE_LO10, S43_TLS_IE_UP27, S43_TLS_IE_EX6],
        ),
        (
            "tlsle",
            RelativeKind::TpRelative,
            [S37_TLS_LE_LO10, S37_TLS_LE_UP27],
            [S43_TLS_LE_LO10, S43_TLS_LE_UP27, S43_TLS_LE_EX6],
        ),
        (
            "dtpoff",
            RelativeKind::BaseRelative,
            [S37_TLS_DTPOFF_LO10, S37_TLS_DTPOFF_UP27],
            [S43_TLS_DTPOFF_LO10, S43_TLS_DTPOFF_UP27, S43_TLS_DTPOFF_EX6],
        ),
    ]
};

/// Data-word forms: `(pseudo-function, bits, relative, relocation)`.
const DATA_FORMS: [(&str, u8, RelativeKind, RelocType); 7] = [
    ("gotoff", 32, RelativeKind::GotRelative, RelocType::R32_GOTOFF),
    ("gotoff", 64, RelativeKind::GotRelative, RelocType::R64_GOTOFF),
    ("got", 32, RelativeKind::GotRelative, RelocType::R32_GOT),
    ("got", 64, RelativeKind::GotRelative, RelocType::R64_GOT),
    ("pcrel", 32, RelativeKind::PcRelative, RelocType::R32_PCREL),
    ("pcrel", 64, RelativeKind::PcRelative, RelocType::R64_PCREL),
    ("dtpoff", 64, RelativeKind::BaseRelative, RelocType::R64_DTPOFF),
];

pub(super) struct Relocs {
    pub signed16: RelocId,
    pub pcrel17: RelocId,
    pub pcrel27: RelocId,
    pub signed32: RelocId,
    /// [`FAMILIES`] order.
    pub s37: [RelocId; 10],
    /// [`FAMILIES`] order.
    pub s43: [RelocId; 10],
    /// signed, pcrel, gotaddr.
    pub s64: [RelocId; 3],
}

/// Declares the relocations and the pseudo-functions using them.
fn relocations(b: &mut DescriptorBuilder) -> Relocs {
    let signed16 = b.relocation("signed16", 16, RelativeKind::Absolute, &[RelocType::S16]);
    let pcrel17 = b.relocation("pcrel17", 17, RelativeKind::PcRelative, &[RelocType::PCREL17]);
    let pcrel27 = b.relocation("pcrel27", 27, RelativeKind::PcRelative, &[RelocType::PCREL27]);
    let signed32 = b.relocation(
        "signed32",
        32,
        RelativeKind::Absolute,
        &[RelocType::S32_LO5, RelocType::S32_UP27],
    );
    b.pseudo_function("signed32", SplitScheme::S32Lo5Up27, Availability::Only32, signed32);

    let mut s37 = [RelocId(0); 10];
    let mut s43 = [RelocId(0); 10];
    for (i, (name, relative, r37, r43)) in FAMILIES.iter().enumerate() {
        s37[i] = b.relocation(&format!("{}_signed37", name), 37, *relative, r37);
        s43[i] = b.relocation(&format!("{}_signed43", name), 43, *relative, r43);
        if i == 0 {
            continue;
        }
        let (short, long) = (
            (SplitScheme::S37Lo10Up27, Availability::Only32, s37[i]),
            (SplitScheme::S43Lo10Up27Ex6, Availability::Only64, s43[i]),
        );
        for (scheme, availability, reloc) in [short, long] {
            if *name == "gotaddr" {
                b.pseudo_function_no_arg(name, scheme, availability, reloc);
            } else {
                b.pseudo_function(name, scheme, availability, reloc);
            }
        }
    }

    use RelocType::*;
    let s64 = [
        b.relocation("signed64", 64, RelativeKind::Absolute, &[S64_LO10, S64_UP27, S64_EX27]),
        b.relocation(
            "pcrel_signed64",
            64,
            RelativeKind::PcRelative,
            &[S64_PCREL_LO10, S64_PCREL_UP27, S64_PCREL_EX27],
        ),
        b.relocation(
            "gotaddr_signed64",
            64,
            RelativeKind::PcRelative,
            &[S64_GOTADDR_LO10, S64_GOTADDR_UP27, S64_GOTADDR_EX27],
        ),
    ];
    b.pseudo_function("pcrel", SplitScheme::S64Lo10Up27Ex27, Availability::Only64, s64[1]);
    b.pseudo_function_no_arg("gotaddr", SplitScheme::S64Lo10Up27Ex27, Availability::Only64, s64[2]);

    for (name, bits, relative, reloc) in DATA_FORMS {
        let id = b.relocation(&format!("{}_{}", name, bits), bits, relative, &[reloc]);
        let scheme = if bits == 32 { SplitScheme::S32 } else { SplitScheme::S64 };
        b.pseudo_function(name, scheme, Availability::All, id);
    }

    Relocs {
        signed16,
        pcrel17,
        pcrel27,
        signed32,
        s37,
        s43,
        s64,
    }
}

// ── Operands ────────────────────────────────────────────────────────────

const SCALAR_CONDITIONS: &[&str] = &[
    ".dnez", ".deqz", ".dltz", ".dgez", ".dlez", ".dgtz", ".odd", ".even", ".wnez", ".weqz",
    ".wltz", ".wgez", ".wlez", ".wgtz",
];

const COMPARISONS: &[&str] = &[
    ".ne", ".eq", ".lt", ".ge", ".le", ".gt", ".ltu", ".geu", ".leu", ".gtu", ".all", ".nall",
    ".any", ".none",
];

const VARIANTS: &[&str] = &["", ".s", ".u", ".us"];

const ROUNDING: &[&str] = &[".rn", ".ru", ".rd", ".rz", ".rna", ".rnz", ".ro", ""];

const ROUNDINT: &[&str] = &[".rn", ".ru", ".rd", ".rz", ".rhu"];

const FLOATCOMP: &[&str] = &[".one", ".ueq", ".oeq", ".une", ".olt", ".uge", ".oge", ".ult"];

const SIMDCOND: &[&str] = &[".nez", ".eqz", ".ltz", ".gez", ".lez", ".gtz", ".odd", ".even"];

const EXUNUM: &[&str] = &[".alu0", ".alu1", ".mau", ".lsu"];

const COLUMN: &[&str] = &[".c0", ".c1", ".c2", ".c3"];

const QINDEX: &[&str] = &[".q0", ".q1", ".q2", ".q3"];

const SATURATE: &[&str] = &[".sat", ".satu"];

const SPECULATE: &[&str] = &[".u", ".us"];

const SILENT: &[&str] = &["", ".s"];

const DOSCALE: &[&str] = &["", ".xs"];

const SPLAT32: &[&str] = &["", ".@"];

const RECTIFY: &[&str] = &["", ".relu"];

pub(super) struct Ops {
    pub reg_w: OperandId,
    pub reg_z: OperandId,
    pub reg_y: OperandId,
    pub reg_cb: OperandId,
    pub reg_p: OperandId,
    pub reg_q: OperandId,
    pub sys_s: OperandId,
    pub sys_t: OperandId,
    pub vec_w: OperandId,
    pub vec_z: OperandId,
    pub vec_y: OperandId,
    pub x2_w: OperandId,
    pub x4_w: OperandId,
    pub x4_z: OperandId,
    pub x8_w: OperandId,
    pub x8_z: OperandId,
    pub signed10: OperandId,
    pub signed16: OperandId,
    pub signed37: OperandId,
    pub signed43: OperandId,
    pub wrapped32: OperandId,
    pub wrapped64: OperandId,
    pub pcrel17: OperandId,
    pub pcrel27: OperandId,
    pub unsigned6: OperandId,
    pub unsigned6_lo: OperandId,
    pub sysnumber: OperandId,
    pub bitmask10: OperandId,
    pub scalarcond: OperandId,
    pub comparison: OperandId,
    pub variant: OperandId,
    pub rounding: OperandId,
    pub roundint: OperandId,
    pub floatcomp: OperandId,
    pub simdcond: OperandId,
    pub exunum: OperandId,
    pub column: OperandId,
    pub qindex: OperandId,
    pub saturate: OperandId,
    pub speculate: OperandId,
    pub silent: OperandId,
    pub doscale: OperandId,
    pub splat32: OperandId,
    pub rectify: OperandId,
}

fn operands(b: &mut DescriptorBuilder, r: &Regs, rel: &Relocs) -> Ops {
    let signed = OperandFlags::SIGNED;
    let extend = OperandFlags::SIGNED | OperandFlags::CAN_EXTEND;
    let wrapped = OperandFlags::WRAPPED | OperandFlags::CAN_EXTEND;
    let mut reg = |name: &str, class: RegClassId, width: u8, to: u16| {
        b.operand(OperandSpec::register(name, class, width).with_bitfields(&[(width, 0, to)]))
    };
    let reg_w = reg("registerw", r.single, 6, 18);
    let reg_z = reg("registerz", r.single, 6, 12);
    let reg_y = reg("registery", r.single, 6, 6);
    let reg_cb = reg("registercb", r.single, 6, 21);
    let reg_p = reg("registerp", r.paired, 5, 19);
    let reg_q = reg("registerq", r.quad, 4, 20);
    let sys_s = reg("systems", r.system, 6, 6);
    let sys_t = reg("systemt", r.system, 6, 18);
    let vec_w = reg("vectorw", r.vector, 6, 18);
    let vec_z = reg("vectorz", r.vector, 6, 12);
    let vec_y = reg("vectory", r.vector, 6, 6);
    let x2_w = reg("buffer2w", r.buffer2, 5, 19);
    let x4_w = reg("buffer4w", r.buffer4, 4, 20);
    let x4_z = reg("buffer4z", r.buffer4, 4, 14);
    let x8_w = reg("buffer8w", r.buffer8, 3, 21);
    let x8_z = reg("buffer8z", r.buffer8, 3, 15);
    let mut modifier = |name: &str, values: &[&str], width: u8, to: u16| {
        b.operand(OperandSpec::modifier(name, values, width).with_bitfields(&[(width, 0, to)]))
    };
    let rounding = modifier("rounding", ROUNDING, 3, 0);
    let roundint = modifier("roundint", ROUNDINT, 3, 0);
    let floatcomp = modifier("floatcomp", FLOATCOMP, 3, 0);
    let simdcond = modifier("simdcond", SIMDCOND, 3, 0);
    let exunum = modifier("exunum", EXUNUM, 2, 0);
    let column = modifier("column", COLUMN, 2, 0);
    let qindex = modifier("qindex", QINDEX, 2, 0);
    let saturate = modifier("saturate", SATURATE, 1, 0);
    let speculate = modifier("speculate", SPECULATE, 1, 0);
    let silent = modifier("silent", SILENT, 1, 3);
    let doscale = modifier("doscale", DOSCALE, 1, 2);
    let splat32 = modifier("splat32", SPLAT32, 1, 0);
    let rectify = modifier("rectify", RECTIFY, 1, 2);

    Ops {
        reg_w,
        reg_z,
        reg_y,
        reg_cb,
        reg_p,
        reg_q,
        sys_s,
        sys_t,
        vec_w,
        vec_z,
        vec_y,
        x2_w,
        x4_w,
        x4_z,
        x8_w,
        x8_z,
        signed10: b.operand(
            OperandSpec::immediate("signed10", 10)
                .with_flags(signed)
                .with_bitfields(&[(10, 0, 2)]),
        ),
        signed16: b.operand(
            OperandSpec::immediate("signed16", 16)
                .with_flags(signed)
                .with_relocations(&[rel.signed16])
                .with_bitfields(&[(16, 0, 2)]),
        ),
        signed37: b.operand(
            OperandSpec::immediate("signed37", 37)
                .with_flags(extend)
                .with_relocations(&rel.s37)
                .with_bitfields(&[(27, 10, 32), (10, 0, 2)]),
        ),
        signed43: b.operand(
            OperandSpec::immediate("signed43", 43)
                .with_flags(extend)
                .with_relocations(&rel.s43)
                .with_bitfields(&[(6, 37, 64), (27, 10, 32), (10, 0, 2)]),
        ),
        wrapped32: b.operand(
            OperandSpec::immediate("wrapped32", 32)
                .with_flags(wrapped)
                .with_relocations(&[rel.signed32])
                .with_bitfields(&[(27, 5, 32), (5, 0, 2)]),
        ),
        wrapped64: b.operand(
            OperandSpec::immediate("wrapped64", 64)
                .with_flags(wrapped)
                .with_relocations(&rel.s64)
                .with_bitfields(&[(27, 37, 64), (27, 10, 32), (10, 0, 2)]),
        ),
        pcrel17: b.operand(
            OperandSpec::immediate("pcrel17", 17)
                .with_flags(signed)
                .with_shift(2)
                .with_relocations(&[rel.pcrel17])
                .with_bitfields(&[(17, 0, 4)]),
        ),
        pcrel27: b.operand(
            OperandSpec::immediate("pcrel27", 27)
                .with_flags(signed)
                .with_shift(2)
                .with_relocations(&[rel.pcrel27])
                .with_bitfields(&[(27, 0, 0)]),
        ),
        unsigned6: b.operand(OperandSpec::immediate("unsigned6", 6).with_bitfields(&[(6, 0, 6)])),
        unsigned6_lo: b
            .operand(OperandSpec::immediate("unsigned6_lo", 6).with_bitfields(&[(6, 0, 0)])),
        sysnumber: b.operand(OperandSpec::immediate("sysnumber", 12).with_bitfields(&[(12, 0, 0)])),
        bitmask10: b.operand(
            OperandSpec::immediate("bitmask10", 10)
                .with_flags(OperandFlags::BITMASK)
                .with_bitfields(&[(10, 0, 2)]),
        ),
        scalarcond: b.operand(
            OperandSpec::modifier("scalarcond", SCALAR_CONDITIONS, 4).with_bitfields(&[(4, 0, 0)]),
        ),
        comparison: b.operand(
            OperandSpec::modifier("comparison", COMPARISONS, 4).with_bitfields(&[(4, 0, 0)]),
        ),
        variant: b.operand(OperandSpec::modifier("variant", VARIANTS, 2).with_bitfields(&[(2, 0, 0)])),
        rounding,
        roundint,
        floatcomp,
        simdcond,
        exunum,
        column,
        qindex,
        saturate,
        speculate,
        silent,
        doscale,
        splat32,
        rectify,
    }
}

// ── Resources ───────────────────────────────────────────────────────────

const RESOURCE_NAMES: [&str; 16] = [
    "ISSUE", "TINY", "LITE", "FULL", "LSU", "MAU", "BCU", "EXT", "AUXR", "AUXW", "XFER", "MEMW",
    "SR12", "SR13", "SR14", "SR15",
];

pub(super) struct Res {
    pub issue: ResourceId,
    pub tiny: ResourceId,
    pub lite: ResourceId,
    pub full: ResourceId,
    pub lsu: ResourceId,
    pub mau: ResourceId,
    pub bcu: ResourceId,
    pub ext: ResourceId,
    pub auxr: ResourceId,
    pub auxw: ResourceId,
    pub xfer: ResourceId,
    pub memw: ResourceId,
    pub sr12: ResourceId,
    pub sr13: ResourceId,
    pub sr14: ResourceId,
    pub every: [ResourceId; 16],
}

/// Declares the 16 resources with per-core capacities, in
/// [`RESOURCE_NAMES`] order.
fn resources(b: &mut DescriptorBuilder, capacity: [u8; 16]) -> Res {
    let mut every = [ResourceId(0); 16];
    for (slot, (name, cap)) in every.iter_mut().zip(RESOURCE_NAMES.iter().zip(capacity)) {
        *slot = b.resource(name, cap);
    }
    Res {
        issue: every[0],
        tiny: every[1],
        lite: every[2],
        full: every[3],
        lsu: every[4],
        mau: every[5],
        bcu: every[6],
        ext: every[7],
        auxr: every[8],
        auxw: every[9],
        xfer: every[10],
        memw: every[11],
        sr12: every[12],
        sr13: every[13],
        sr14: every[14],
        every,
    }
}

/// Declares reservation class `name` with its `_X` and `_Y` forms, which
/// take one more ISSUE unit at issue for each extension syllable.
pub(super) fn laned(
    b: &mut DescriptorBuilder,
    issue: ResourceId,
    name: &str,
    cycles: &[&[ResourceId]],
) -> [ReservationId; 3] {
    let mut ids = [ReservationId(0); 3];
    for (extra, (id, suffix)) in ids.iter_mut().zip(["", "_X", "_Y"]).enumerate() {
        let mut issued: Vec<ResourceId> = cycles.first().map_or_else(Vec::new, |c| c.to_vec());
        issued.extend(core::iter::repeat(issue).take(extra));
        let mut rows: Vec<&[ResourceId]> = Vec::with_capacity(cycles.len().max(1));
        rows.push(&issued);
        rows.extend(cycles.iter().skip(1).copied());
        *id = b.reservation(&format!("{}{}", name, suffix), &rows);
    }
    ids
}

/// Bundling and reservation class of a format.
#[derive(Clone, Copy)]
pub(super) struct Unit {
    pub bundling: BundlingId,
    pub reservation: ReservationId,
}

pub(super) fn unit(bundling: BundlingId, reservation: ReservationId) -> Unit {
    Unit {
        bundling,
        reservation,
    }
}

/// Execution classes the shared formats are assigned to. `_x` and `_y`
/// take the lane-qualified bundling and reservation classes of two- and
/// three-syllable forms.
pub(super) struct Units {
    pub all: Unit,
    pub nop: Unit,
    pub tiny: Unit,
    pub tiny_x: Unit,
    pub tiny_y: Unit,
    pub lite: Unit,
    pub full: Unit,
    pub mau: Unit,
    pub mau_auxr: Unit,
    pub bcu: Unit,
    pub bcu_xfer: Unit,
    pub bcu_get: Unit,
    pub bcu_set: Unit,
    pub load: Unit,
    pub load_x: Unit,
    pub load_y: Unit,
    pub load_vec: Unit,
    pub store: Unit,
    pub store_x: Unit,
    pub store_y: Unit,
    pub ext: Unit,
    pub ext_auxw: Unit,
}

/// Load and store group numbers; kv4 swaps them.
#[derive(Clone, Copy)]
pub(super) struct Groups {
    pub load: u32,
    pub store: u32,
}

// ── Formats ─────────────────────────────────────────────────────────────

pub(super) fn insn<'b>(
    b: &'b mut DescriptorBuilder,
    unit: Unit,
    mnemonic: &str,
    layout: &str,
    opcode: &[u32],
    operands: &[OperandId],
) -> FormatBuilder<'b> {
    b.format(mnemonic, layout)
        .opcode(opcode)
        .operands(operands)
        .classes(unit.bundling, unit.reservation)
}

const RRR: &str = " %s = %s, %s";
const RR: &str = " %s = %s";
const LOAD: &str = "%s %s = %s[%s]";
const STORE: &str = " %s[%s] = %s";

/// Formats common to every core, in matching order.
fn common_formats(b: &mut DescriptorBuilder, o: &Ops, u: &Units, g: Groups) {
    let (w, z, y) = (o.reg_w, o.reg_z, o.reg_y);

    // branches
    insn(b, u.bcu, "goto", " %s", &[op(1, 0)], &[o.pcrel27]).add();
    insn(b, u.bcu_xfer, "call", " %s", &[op(2, 0)], &[o.pcrel27])
        .flags(CodewordFlags::CALL)
        .add();
    insn(b, u.bcu, "cb", "%s %s? %s", &[op(3, 0)], &[o.scalarcond, o.reg_cb, o.pcrel17])
        .flags(CodewordFlags::COND)
        .add();

    // make: short forms first
    insn(b, u.tiny, "make", RR, &[op(4, 0)], &[w, o.signed16]).add();
    insn(b, u.tiny_x, "make", RR, &[op(4, 2), IMMX], &[w, o.wrapped32])
        .flags(CodewordFlags::MODE32)
        .add();
    insn(b, u.tiny_y, "make", RR, &[op(4, 1), IMMX, IMMX], &[w, o.signed43]).add();
    insn(b, u.tiny_y, "make", RR, &[op(4, 2), IMMX, IMMX], &[w, o.wrapped64])
        .flags(CodewordFlags::MODE64)
        .add();

    // register-register
    for (subop, mnemonic) in ["addd", "sbfd", "andd", "ord", "xord"].into_iter().enumerate() {
        insn(b, u.tiny, mnemonic, RRR, &[op(5, subop as u32)], &[w, z, y]).add();
    }
    insn(b, u.tiny, "compd", "%s %s = %s, %s", &[op(5, 5)], &[o.comparison, w, z, y]).add();
    insn(b, u.tiny, "addw", RRR, &[op(5, 6)], &[w, z, y]).add();
    insn(b, u.lite, "maxd", RRR, &[op(5, 7)], &[w, z, y]).add();

    // 10-bit immediates
    for (subop, mnemonic) in ["addd", "sbfd", "andd", "ord", "xord"].into_iter().enumerate() {
        insn(b, u.tiny, mnemonic, RRR, &[op(6, subop as u32)], &[w, z, o.signed10]).add();
    }
    insn(b, u.full, "sbmm8", RRR, &[op(6, 5)], &[w, z, o.bitmask10]).add();
    insn(b, u.tiny, "slld", RRR, &[op(6, 6)], &[w, z, o.unsigned6]).add();
    insn(b, u.tiny, "srad", RRR, &[op(6, 7)], &[w, z, o.unsigned6]).add();

    // extended immediates
    for (subop, mnemonic) in ["addd", "andd", "ord", "xord"].into_iter().enumerate() {
        insn(b, u.tiny_x, mnemonic, RRR, &[op(7, subop as u32), IMMX], &[w, z, o.signed37]).add();
    }
    for (subop, mnemonic) in [(4, "addd"), (5, "andd")] {
        insn(b, u.tiny_y, mnemonic, RRR, &[op(7, subop), IMMX, IMMX], &[w, z, o.wrapped64]).add();
    }
    let splat = [o.splat32, w, z, o.signed37];
    insn(b, u.tiny_x, "andd", "%s %s = %s, %s", &[op(7, 6), IMMX], &splat).add();

    // multiply-accumulate unit
    insn(b, u.mau, "muld", RRR, &[op(8, 0)], &[w, z, y]).add();
    insn(b, u.mau_auxr, "maddd", RRR, &[op(8, 1)], &[w, z, y]).add();
    insn(b, u.mau, "muld", RRR, &[op(8, 2)], &[w, z, o.signed10]).add();
    insn(b, u.mau, "fmuld", RRR, &[op(8, 3)], &[w, z, y]).add();

    // loads
    let l = g.load;
    let load = CodewordFlags::LOAD;
    insn(b, u.load, "ld", LOAD, &[op(l, 0)], &[o.variant, w, o.signed10, z])
        .flags(load)
        .add();
    insn(b, u.load, "lq", LOAD, &[op(l, 1)], &[o.variant, o.reg_p, o.signed10, z])
        .flags(load)
        .add();
    insn(b, u.load, "lo", LOAD, &[op(l, 2)], &[o.variant, o.reg_q, o.signed10, z])
        .flags(load)
        .add();
    insn(b, u.load_x, "ld", LOAD, &[op(l, 3), IMMX], &[o.variant, w, o.signed37, z])
        .flags(load)
        .add();
    insn(b, u.load, "ld", LOAD, &[op(l, 4)], &[o.variant, w, y, z])
        .flags(load)
        .add();
    insn(b, u.load_vec, "lv", " %s = %s[%s]", &[op(l, 5)], &[o.vec_w, o.signed10, z])
        .flags(load)
        .add();
    insn(b, u.load_y, "ld", LOAD, &[op(l, 6), IMMX, IMMX], &[o.variant, w, o.signed43, z])
        .flags(load)
        .add();
    let scaled = [o.variant, o.doscale, w, y, z];
    insn(b, u.load, "ld", "%s%s %s = %s[%s]", &[op(l, 7)], &scaled)
        .flags(load)
        .add();

    // stores
    let s = g.store;
    let store = CodewordFlags::STORE;
    insn(b, u.store, "sd", STORE, &[op(s, 0)], &[o.signed10, z, w])
        .flags(store)
        .add();
    insn(b, u.store, "sq", STORE, &[op(s, 1)], &[o.signed10, z, o.reg_p])
        .flags(store)
        .add();
    insn(b, u.store, "so", STORE, &[op(s, 2)], &[o.signed10, z, o.reg_q])
        .flags(store)
        .add();
    insn(b, u.store_x, "sd", STORE, &[op(s, 3), IMMX], &[o.signed37, z, w])
        .flags(store)
        .add();
    insn(b, u.store, "sv", STORE, &[op(s, 4)], &[o.signed10, z, o.vec_w])
        .flags(store)
        .add();
    insn(b, u.store_y, "sd", STORE, &[op(s, 5), IMMX, IMMX], &[o.signed43, z, w])
        .flags(store)
        .add();

    // control and system
    insn(b, u.bcu_get, "get", RR, &[op(11, 0)], &[w, o.sys_s]).add();
    insn(b, u.bcu_set, "set", RR, &[op(11, 1)], &[o.sys_t, z]).add();
    insn(b, u.bcu, "ret", "", &[op(11, 2)], &[]).add();
    insn(b, u.bcu, "scall", " %s", &[op(11, 3)], &[o.sysnumber]).add();
    insn(b, u.bcu, "igoto", " %s", &[op(11, 4)], &[z]).add();
    insn(b, u.bcu_xfer, "icall", " %s", &[op(11, 5)], &[z])
        .flags(CodewordFlags::CALL)
        .add();
    insn(b, u.bcu, "rfe", "", &[op(11, 6)], &[]).add();
    insn(b, u.all, "barrier", "", &[op(11, 7)], &[]).add();

    // moves and bit fields
    insn(b, u.nop, "nop", "", &[op(12, 0)], &[]).add();
    insn(b, u.tiny, "copyd", RR, &[op(12, 1)], &[w, z]).add();
    let field = [w, z, o.unsigned6, o.unsigned6_lo];
    insn(b, u.lite, "insf", " %s = %s, %s, %s", &[op(12, 2)], &field).add();
    insn(b, u.lite, "extfz", " %s = %s, %s, %s", &[op(12, 3)], &field).add();
    insn(b, u.tiny, "cmoved", "%s %s? %s = %s", &[op(12, 4)], &[o.scalarcond, z, w, y])
        .flags(CodewordFlags::COND)
        .add();
    insn(b, u.tiny, "copyq", RRR, &[op(12, 5)], &[o.reg_p, z, y]).add();
    insn(b, u.tiny, "sxwd", RR, &[op(12, 6)], &[w, z]).add();
    insn(b, u.tiny, "zxwd", RR, &[op(12, 7)], &[w, z]).add();

    // coprocessor
    insn(b, u.ext, "copyv", RR, &[op(13, 0)], &[o.vec_w, o.vec_z]).add();
    insn(b, u.ext_auxw, "movefo", RR, &[op(13, 1)], &[o.reg_q, o.vec_z]).add();
    insn(b, u.ext, "movetq", RRR, &[op(13, 2)], &[o.vec_w, z, y]).add();
    let speculative = [o.speculate, o.vec_w, o.signed10, z];
    insn(b, u.load_vec, "lv", "%s %s = %s[%s]", &[op(13, 3)], &speculative)
        .flags(load)
        .add();
    insn(b, u.ext, "mt44d", RR, &[op(13, 4)], &[o.x4_w, o.x4_z]).add();
    insn(b, u.ext_auxw, "movefd", " %s = %s%s", &[op(13, 5)], &[w, o.vec_z, o.qindex]).add();
    let mma = [o.column, o.rectify, o.x2_w, o.vec_z, o.vec_y];
    insn(b, u.ext, "mmad", "%s%s %s = %s, %s", &[op(13, 6)], &mma).add();
    insn(b, u.ext, "mt88d", RR, &[op(13, 7)], &[o.x8_w, o.x8_z]).add();

    // floating point and lane-wise
    let fp = [o.rounding, o.silent, w, z, y];
    insn(b, u.mau, "faddd", "%s%s %s = %s, %s", &[op(15, 0)], &fp).add();
    insn(b, u.mau, "fcompd", "%s %s = %s, %s", &[op(15, 1)], &[o.floatcomp, w, z, y]).add();
    let fixed = [o.rounding, o.silent, w, z, o.unsigned6];
    insn(b, u.mau, "fixedd", "%s%s %s = %s, %s", &[op(15, 2)], &fixed).add();
    insn(b, u.mau, "frintd", "%s %s = %s", &[op(15, 3)], &[o.roundint, w, z]).add();
    insn(b, u.tiny, "addwp", "%s %s = %s, %s", &[op(15, 4)], &[o.saturate, w, z, y]).add();
    insn(b, u.tiny, "cmovewp", "%s %s? %s = %s", &[op(15, 5)], &[o.simdcond, z, w, y])
        .flags(CodewordFlags::COND)
        .add();
    insn(b, u.bcu, "syncgroup", "%s %s", &[op(15, 6)], &[o.exunum, z]).add();
}

/// Everything but the resource model and the core-specific formats.
pub(super) struct Common {
    pub ops: Ops,
}

/// Declares registers, relocations, operands and the shared formats.
pub(super) fn common(b: &mut DescriptorBuilder, vector_units: u16, units: &Units, groups: Groups) -> Common {
    let regs = registers(b, vector_units);
    let relocs = relocations(b);
    let ops = operands(b, &regs, &relocs);
    common_formats(b, &ops, units, groups);
    Common { ops }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_layout() {
        assert_eq!(op(5, 0), 0x2800_0000);
        assert_eq!(op(12, 7), 0x6700_0000);
        assert_eq!(op(15, 7) & (1 << 31), 0);
    }

    #[test]
    fn every_enabled_core_validates() {
        for core in Core::ALL {
            if let Ok(arch) = build(core) {
                arch.validate();
                assert_eq!(arch.core(), Some(core));
                assert_eq!(arch.reservations().resources.len(), 16);
            }
        }
    }
}
