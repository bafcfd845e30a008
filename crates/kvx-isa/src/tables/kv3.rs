//! Resource model shared by the kv3 cores.

use super::{laned, resources, unit, Units};
use crate::descriptor::DescriptorBuilder;

/// ISSUE, TINY, LITE, FULL, LSU, MAU, BCU, EXT, AUXR, AUXW, XFER, MEMW, SR12..SR15.
const CAPACITY: [u8; 16] = [8, 4, 2, 1, 1, 1, 1, 4, 1, 1, 1, 1, 1, 1, 1, 1];

/// Declares the four-cycle reservation table and the bundling classes.
pub(super) fn units(b: &mut DescriptorBuilder) -> Units {
    b.set_reservation_cycles(4);
    let r = resources(b, CAPACITY);

    let all = b.reservation("ALL", &[&r.every]);
    let alu_nop = b.reservation("ALU_NOP", &[&[r.issue]]);
    let [alu_tiny, alu_tiny_x, alu_tiny_y] =
        laned(b, r.issue, "ALU_TINY", &[&[r.issue, r.tiny]]);
    let [alu_lite, ..] = laned(b, r.issue, "ALU_LITE", &[&[r.issue, r.tiny, r.lite]]);
    let [alu_full, ..] = laned(b, r.issue, "ALU_FULL", &[&[r.issue, r.tiny, r.lite, r.full]]);
    let bcu = b.reservation("BCU", &[&[r.issue, r.bcu]]);
    let bcu_xfer = b.reservation("BCU_XFER", &[&[r.issue, r.bcu], &[r.xfer]]);
    let bcu_get = b.reservation(
        "BCU_TINY_AUXW_CRRP",
        &[&[r.issue, r.bcu, r.tiny, r.sr12], &[r.auxw]],
    );
    let bcu_set = b.reservation(
        "BCU_CRRP_CRWL_CRWH",
        &[&[r.issue, r.bcu, r.sr12], &[], &[r.sr13, r.sr14]],
    );
    let [lsu, lsu_x, lsu_y] = laned(b, r.issue, "LSU", &[&[r.issue, r.tiny, r.lsu]]);
    let [lsu_auxr, lsu_auxr_x, lsu_auxr_y] =
        laned(b, r.issue, "LSU_AUXR", &[&[r.issue, r.tiny, r.lsu, r.auxr]]);
    let [lsu_auxw, ..] = laned(b, r.issue, "LSU_AUXW", &[&[r.issue, r.tiny, r.lsu], &[r.auxw]]);
    let [mau, ..] = laned(b, r.issue, "MAU", &[&[r.issue, r.tiny, r.mau]]);
    let [mau_auxr, ..] = laned(b, r.issue, "MAU_AUXR", &[&[r.issue, r.tiny, r.mau, r.auxr]]);
    let ext = b.reservation("EXT", &[&[r.issue, r.ext]]);

    let b_all = b.bundling("ALL");
    let b_bcu = b.bundling("BCU");
    let b_ext = b.bundling("EXT");
    let b_full = b.bundling("FULL");
    b.bundling_lane("FULL_X", b_full);
    b.bundling_lane("FULL_Y", b_full);
    let b_lite = b.bundling("LITE");
    b.bundling_lane("LITE_X", b_lite);
    b.bundling_lane("LITE_Y", b_lite);
    let b_mau = b.bundling("MAU");
    b.bundling_lane("MAU_X", b_mau);
    b.bundling_lane("MAU_Y", b_mau);
    let b_lsu = b.bundling("LSU");
    let b_lsu_x = b.bundling_lane("LSU_X", b_lsu);
    let b_lsu_y = b.bundling_lane("LSU_Y", b_lsu);
    let b_tiny = b.bundling("TINY");
    let b_tiny_x = b.bundling_lane("TINY_X", b_tiny);
    let b_tiny_y = b.bundling_lane("TINY_Y", b_tiny);
    let b_nop = b.bundling("NOP");

    Units {
        all: unit(b_all, all),
        nop: unit(b_nop, alu_nop),
        tiny: unit(b_tiny, alu_tiny),
        tiny_x: unit(b_tiny_x, alu_tiny_x),
        tiny_y: unit(b_tiny_y, alu_tiny_y),
        lite: unit(b_lite, alu_lite),
        full: unit(b_full, alu_full),
        mau: unit(b_mau, mau),
        mau_auxr: unit(b_mau, mau_auxr),
        bcu: unit(b_bcu, bcu),
        bcu_xfer: unit(b_bcu, bcu_xfer),
        bcu_get: unit(b_bcu, bcu_get),
        bcu_set: unit(b_bcu, bcu_set),
        load: unit(b_lsu, lsu),
        load_x: unit(b_lsu_x, lsu_x),
        load_y: unit(b_lsu_y, lsu_y),
        load_vec: unit(b_lsu, lsu_auxw),
        store: unit(b_lsu, lsu_auxr),
        store_x: unit(b_lsu_x, lsu_auxr_x),
        store_y: unit(b_lsu_y, lsu_auxr_y),
        ext: unit(b_ext, ext),
        ext_auxw: unit(b_ext, ext),
    }
}
