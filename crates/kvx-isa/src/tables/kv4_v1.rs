//! kv4-1: three-cycle reservations, dual load/store, multiply and branch
//! units, loads and stores in swapped groups.

use super::{common, insn, laned, op, resources, unit, Groups, Units};
use crate::descriptor::{ArchDescriptor, Core, DescriptorBuilder};

/// ISSUE, TINY, LITE, FULL, LSU, MAU, BCU, EXT, AUXR, AUXW, XFER, MEMW, SR12..SR15.
const CAPACITY: [u8; 16] = [8, 4, 2, 1, 2, 2, 2, 4, 1, 1, 1, 1, 1, 1, 1, 1];

fn units(b: &mut DescriptorBuilder) -> Units {
    b.set_reservation_cycles(3);
    let r = resources(b, CAPACITY);

    let all = b.reservation("ALL", &[&r.every]);
    let [alu_tiny, alu_tiny_x, alu_tiny_y] =
        laned(b, r.issue, "ALU_TINY", &[&[r.issue, r.tiny]]);
    b.reservation("ALU_TINY_AUXR", &[&[r.issue, r.tiny, r.auxr]]);
    let [alu_lite, ..] = laned(b, r.issue, "ALU_LITE", &[&[r.issue, r.tiny, r.lite]]);
    let [alu_full, ..] = laned(b, r.issue, "ALU_FULL", &[&[r.issue, r.tiny, r.lite, r.full]]);
    let bcu = b.reservation("BCU", &[&[r.issue, r.bcu]]);
    let bcu_brrp = b.reservation("BCU_BRRP", &[&[r.issue, r.bcu, r.tiny], &[r.auxw]]);
    let bcud = b.reservation("BCUD", &[&[r.issue, r.bcu, r.sr12], &[r.sr13]]);
    let bcu_xfer = b.reservation("BCU_XFER", &[&[r.issue, r.bcu], &[r.xfer]]);
    let [lsu, lsu_x, lsu_y] = laned(b, r.issue, "LSU", &[&[r.issue, r.tiny, r.lsu]]);
    let [lsu_auxw, ..] =
        laned(b, r.issue, "LSU_AUXW", &[&[r.issue, r.tiny, r.lsu], &[], &[r.auxw]]);
    let [lsu_memw_auxr, lsu_memw_auxr_x, lsu_memw_auxr_y] = laned(
        b,
        r.issue,
        "LSU_MEMW_AUXR",
        &[&[r.issue, r.tiny, r.lsu], &[r.auxr, r.memw]],
    );
    let mau = b.reservation("MAU", &[&[r.issue, r.tiny, r.mau]]);
    let mau_auxr = b.reservation("MAU_AUXR", &[&[r.issue, r.tiny, r.mau, r.auxr]]);
    let ext = b.reservation("EXT", &[&[r.issue, r.ext]]);
    let ext_misc_auxw = b.reservation("EXT_MISC_AUXW", &[&[r.issue, r.ext], &[r.auxw]]);

    let b_all = b.bundling("ALL");
    let b_bcud = b.bundling("BCUD");
    let b_bcu0 = b.bundling("BCU0");
    let b_bcu = b.bundling("BCU");
    let b_full = b.bundling("FULL");
    b.bundling_lane("FULL_X", b_full);
    b.bundling_lane("FULL_Y", b_full);
    let b_lite = b.bundling("LITE");
    b.bundling_lane("LITE_X", b_lite);
    b.bundling_lane("LITE_Y", b_lite);
    let b_lsu0 = b.bundling("LSU0");
    b.bundling_lane("LSU0_X", b_lsu0);
    b.bundling_lane("LSU0_Y", b_lsu0);
    let b_lsu = b.bundling("LSU");
    let b_lsu_x = b.bundling_lane("LSU_X", b_lsu);
    let b_lsu_y = b.bundling_lane("LSU_Y", b_lsu);
    let b_tiny = b.bundling("TINY");
    let b_tiny_x = b.bundling_lane("TINY_X", b_tiny);
    let b_tiny_y = b.bundling_lane("TINY_Y", b_tiny);
    let b_ext = b.bundling("EXT");
    let b_nop = b.bundling("NOP");

    Units {
        all: unit(b_all, all),
        nop: unit(b_nop, alu_tiny),
        tiny: unit(b_tiny, alu_tiny),
        tiny_x: unit(b_tiny_x, alu_tiny_x),
        tiny_y: unit(b_tiny_y, alu_tiny_y),
        lite: unit(b_lite, alu_lite),
        full: unit(b_full, alu_full),
        mau: unit(b_full, mau),
        mau_auxr: unit(b_full, mau_auxr),
        bcu: unit(b_bcu, bcu),
        bcu_xfer: unit(b_bcu0, bcu_xfer),
        bcu_get: unit(b_bcu0, bcu_brrp),
        bcu_set: unit(b_bcud, bcud),
        load: unit(b_lsu, lsu),
        load_x: unit(b_lsu_x, lsu_x),
        load_y: unit(b_lsu_y, lsu_y),
        load_vec: unit(b_lsu0, lsu_auxw),
        store: unit(b_lsu, lsu_memw_auxr),
        store_x: unit(b_lsu_x, lsu_memw_auxr_x),
        store_y: unit(b_lsu_y, lsu_memw_auxr_y),
        ext: unit(b_ext, ext),
        ext_auxw: unit(b_ext, ext_misc_auxw),
    }
}

pub(super) fn build() -> ArchDescriptor {
    let mut b = DescriptorBuilder::new("kv4-1");
    b.set_core(Core::Kv4V1);
    let units = units(&mut b);
    let o = common(&mut b, 64, &units, Groups { load: 10, store: 9 }).ops;

    insn(&mut b, units.load, "fence", "", &[op(14, 0)], &[]).add();
    insn(&mut b, units.lite, "clzd", " %s = %s", &[op(14, 1)], &[o.reg_w, o.reg_z]).add();
    insn(&mut b, units.lite, "cbsd", " %s = %s", &[op(14, 2)], &[o.reg_w, o.reg_z]).add();
    b.build()
}
