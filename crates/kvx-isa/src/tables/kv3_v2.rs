//! kv3-2: kv3-1 plus the byte-average and bit-count group.

use super::{common, insn, kv3, op, Groups};
use crate::descriptor::{ArchDescriptor, Core, DescriptorBuilder};

pub(super) fn build() -> ArchDescriptor {
    let mut b = DescriptorBuilder::new("kv3-2");
    b.set_core(Core::Kv3V2);
    let units = kv3::units(&mut b);
    let o = common(&mut b, 64, &units, Groups { load: 9, store: 10 }).ops;

    let (w, z, y) = (o.reg_w, o.reg_z, o.reg_y);
    insn(&mut b, units.lite, "avgbo", " %s = %s, %s", &[op(14, 0)], &[w, z, y]).add();
    insn(&mut b, units.lite, "addrbod", " %s = %s", &[op(14, 1)], &[w, z]).add();
    insn(&mut b, units.lite, "clzd", " %s = %s", &[op(14, 2)], &[w, z]).add();
    b.build()
}
