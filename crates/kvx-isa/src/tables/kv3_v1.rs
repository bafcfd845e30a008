//! kv3-1: 48 vector units, no group 14.

use super::{common, kv3, Groups};
use crate::descriptor::{ArchDescriptor, Core, DescriptorBuilder};

pub(super) fn build() -> ArchDescriptor {
    let mut b = DescriptorBuilder::new("kv3-1");
    b.set_core(Core::Kv3V1);
    let units = kv3::units(&mut b);
    common(&mut b, 48, &units, Groups { load: 9, store: 10 });
    b.build()
}
