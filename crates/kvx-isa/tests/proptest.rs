//! Property-based tests using proptest.
//!
//! These tests verify codec invariants across randomly generated operands
//! and syllable streams, complementing the targeted integration tests and
//! the libfuzzer decode target.

use kvx_isa::{
    check_bundle, decode_bundle, decode_instruction, encode_bundle, encode_instruction,
    ArchDescriptor, BundleSlot, Core, Instruction, Operand, PointerMode, Reg, ReservationId,
    SymbolRef,
};
use proptest::prelude::*;
use std::sync::OnceLock;

// ── Strategies ──────────────────────────────────────────────────────────

fn descriptors() -> &'static [ArchDescriptor; 3] {
    static ARCHS: OnceLock<[ArchDescriptor; 3]> = OnceLock::new();
    ARCHS.get_or_init(|| Core::ALL.map(|core| ArchDescriptor::new(core).unwrap()))
}

fn arb_arch() -> impl Strategy<Value = &'static ArchDescriptor> {
    prop::sample::select(descriptors().iter().collect::<Vec<_>>())
}

fn arb_mode() -> impl Strategy<Value = PointerMode> {
    prop_oneof![Just(PointerMode::Bits32), Just(PointerMode::Bits64)]
}

fn arb_gpr() -> impl Strategy<Value = Reg> {
    (0u16..64).prop_map(Reg::gpr)
}

/// Values that decode back unchanged: signed forms up to 37 bits and the
/// non-negative range of the wrapped 64-bit form.
fn arb_addd_immediate() -> impl Strategy<Value = i128> {
    prop_oneof![
        (-512i128..512),
        (-(1i128 << 36)..(1i128 << 36)),
        (0..=i64::MAX).prop_map(i128::from),
    ]
}

fn arb_alu() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["addd", "sbfd", "andd", "ord", "xord", "addw", "maxd", "muld"])
}

fn arb_tiny_instruction() -> impl Strategy<Value = Instruction> {
    (prop::sample::select(vec!["addd", "andd", "ord", "xord"]), arb_gpr(), arb_gpr(), -512i128..512)
        .prop_map(|(m, w, z, imm)| {
            Instruction::new(m)
                .with(Operand::reg(w))
                .with(Operand::reg(z))
                .with(Operand::imm(imm))
        })
}

// ── Decoding ────────────────────────────────────────────────────────────

proptest! {
    /// Arbitrary syllables decode or fail cleanly, never panic.
    #[test]
    fn decode_never_panics(
        arch in arb_arch(),
        mode in arb_mode(),
        words in prop::collection::vec(any::<u32>(), 0..8),
    ) {
        if let Ok(insn) = decode_instruction(arch, &words, mode) {
            prop_assert!(insn.word_count >= 1 && insn.word_count <= words.len());
            let _ = insn.render(arch);
        }
        if let Ok(bundle) = decode_bundle(arch, &words, mode) {
            prop_assert!(bundle.word_count <= words.len());
            prop_assert!(!bundle.instructions.is_empty());
        }
    }

    /// Whatever decodes re-encodes to the same syllables, parallel bit aside.
    #[test]
    fn decoded_words_reencode(arch in arb_arch(), word in any::<u32>(), ext in any::<[u32; 2]>()) {
        let words = [word, ext[0] & 0x07ff_ffff, ext[1] & 0x07ff_ffff];
        if let Ok(dec) = decode_instruction(arch, &words, PointerMode::Bits64) {
            let insn = dec.to_instruction();
            let enc = encode_instruction(arch, &insn, PointerMode::Bits64).unwrap();
            let again = decode_instruction(arch, &enc.words, PointerMode::Bits64).unwrap();
            prop_assert_eq!(again.to_instruction(), insn);
        }
    }
}

// ── Encoding ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn addd_immediate_round_trip(
        arch in arb_arch(),
        w in arb_gpr(),
        z in arb_gpr(),
        imm in arb_addd_immediate(),
    ) {
        let insn = Instruction::new("addd")
            .with(Operand::reg(w))
            .with(Operand::reg(z))
            .with(Operand::imm(imm));
        let enc = encode_instruction(arch, &insn, PointerMode::Bits64).unwrap();
        let expected_words = if (-512..512).contains(&imm) {
            1
        } else if (-(1i128 << 36)..(1i128 << 36)).contains(&imm) {
            2
        } else {
            3
        };
        prop_assert_eq!(enc.words.len(), expected_words);
        let dec = decode_instruction(arch, &enc.words, PointerMode::Bits64).unwrap();
        prop_assert_eq!(dec.to_instruction(), insn);
    }

    #[test]
    fn register_forms_round_trip(
        arch in arb_arch(),
        mode in arb_mode(),
        m in arb_alu(),
        w in arb_gpr(),
        z in arb_gpr(),
        y in arb_gpr(),
    ) {
        let insn = Instruction::new(m)
            .with(Operand::reg(w))
            .with(Operand::reg(z))
            .with(Operand::reg(y));
        let enc = encode_instruction(arch, &insn, mode).unwrap();
        prop_assert_eq!(enc.words.len(), 1);
        prop_assert_eq!(enc.words[0] & arch.parallel_bit(), 0);
        let dec = decode_instruction(arch, &enc.words, mode).unwrap();
        prop_assert_eq!(dec.to_instruction(), insn);
    }

    #[test]
    fn make_round_trip_in_64_bit_mode(
        arch in arb_arch(),
        w in arb_gpr(),
        value in prop_oneof![-(1i128 << 42)..(1i128 << 42), (0..=u64::MAX).prop_map(i128::from)],
    ) {
        let insn = Instruction::new("make").with(Operand::reg(w)).with(Operand::imm(value));
        let enc = encode_instruction(arch, &insn, PointerMode::Bits64).unwrap();
        let dec = decode_instruction(arch, &enc.words, PointerMode::Bits64).unwrap();
        prop_assert_eq!(dec.to_instruction(), insn);
    }

    /// Packing an operand leaves every bit it does not own untouched.
    #[test]
    fn packing_is_non_destructive(
        arch in arb_arch(),
        pick in any::<prop::sample::Index>(),
        raw in any::<u64>(),
        background in any::<[u32; 3]>(),
    ) {
        let spec = &arch.operands()[pick.index(arch.operands().len())];
        let raw = raw & (u64::MAX >> (64 - u32::from(spec.width)));
        let mut words = background;
        spec.insert_field(&mut words, raw);
        for (i, (&before, &after)) in background.iter().zip(&words).enumerate() {
            let owned = spec.coverage(i);
            prop_assert_eq!(before & !owned, after & !owned);
        }
        prop_assert_eq!(spec.extract_field(&words), raw);
    }

    /// Patching the fixups of a symbolic operand gives the bits a literal
    /// of the same value would have.
    #[test]
    fn fixups_patch_like_literals(
        arch in arb_arch(),
        value in -(1i128 << 42)..(1i128 << 42),
    ) {
        let insn = Instruction::new("make")
            .with(Operand::reg(Reg::gpr(1)))
            .with(Operand::symbol(SymbolRef::new("sym")));
        let enc = encode_instruction(arch, &insn, PointerMode::Bits64).unwrap();
        let spec = arch.operand(arch.find_operand("signed43").unwrap());
        let raw = spec.to_field(value).unwrap();
        let mut patched = enc.words.to_vec();
        for fixup in &enc.fixups {
            fixup.piece.patch(&mut patched, raw);
        }
        let mut direct = enc.words.to_vec();
        spec.encode(value, &mut direct).unwrap();
        prop_assert_eq!(patched, direct);
    }

    /// Paired registers encode iff their first unit is even.
    #[test]
    fn paired_alignment(arch in arb_arch(), first in 0u16..63) {
        let insn = Instruction::new("copyq")
            .with(Operand::reg(Reg::gpr_pair(first)))
            .with(Operand::reg(Reg::gpr(0)))
            .with(Operand::reg(Reg::gpr(1)));
        let enc = encode_instruction(arch, &insn, PointerMode::Bits64);
        prop_assert_eq!(enc.is_ok(), first % 2 == 0);
    }
}

// ── Bundles ─────────────────────────────────────────────────────────────

proptest! {
    /// Legality does not depend on instruction order.
    #[test]
    fn legality_is_order_independent(
        arch in arb_arch(),
        classes in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let count = arch.reservations().classes.len();
        let slots: Vec<BundleSlot> = classes
            .iter()
            .map(|i| BundleSlot { reservation: ReservationId(i.index(count) as u16), words: 1 })
            .collect();
        let mut reversed = slots.clone();
        reversed.reverse();
        prop_assert_eq!(
            check_bundle(arch, &slots).is_ok(),
            check_bundle(arch, &reversed).is_ok()
        );
    }

    #[test]
    fn encoded_bundles_decode(
        arch in arb_arch(),
        insns in prop::collection::vec(arb_tiny_instruction(), 1..=4),
    ) {
        let bundle = encode_bundle(arch, &insns, PointerMode::Bits64).unwrap();
        let dec = decode_bundle(arch, &bundle.words, PointerMode::Bits64).unwrap();
        prop_assert_eq!(dec.word_count, bundle.words.len());
        let back: Vec<_> = dec.instructions.iter().map(|d| d.to_instruction()).collect();
        prop_assert_eq!(back, insns);
    }
}
