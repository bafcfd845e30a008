#![no_main]
use libfuzzer_sys::fuzz_target;

use kvx_isa::{ArchDescriptor, Codec, Core, PointerMode};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let core = Core::ALL[usize::from(selector % 3)];
    let Ok(arch) = ArchDescriptor::new(core) else {
        return;
    };
    let words: Vec<u32> = rest
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut codec = Codec::new(&arch);
    if selector & 0x80 != 0 {
        // 32-bit forms wrap wide immediates, so only exercise them.
        codec.mode(PointerMode::Bits32);
        if let Ok(decoded) = codec.decode(&words) {
            let _ = codec.encode(&decoded.to_instruction());
        }
    } else if let Ok(decoded) = codec.decode(&words) {
        let insn = decoded.to_instruction();
        let encoded = codec.encode(&insn).expect("decoded instruction re-encodes");
        let again = codec.decode(&encoded.words).expect("re-encoded instruction decodes");
        assert_eq!(again.to_instruction(), insn);
    }
    let _ = codec.disassemble(&words);
});
