#![no_main]

use libfuzzer_sys::fuzz_target;
use pdp11_core::{
    disassemble_one, disassemble_word, Decoder, Machine, MachineConfig, TranslationCache,
};

const CODE_BASE: u16 = 0o1000;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let word = u16::from_le_bytes([data[0], data[1]]);
    let decoded = Decoder::decode(word);
    let row = disassemble_word(word);
    assert_eq!(row.encoding, decoded.encoding);

    let config = MachineConfig {
        core_bytes: 0o10000,
        step_limit: Some(64),
        ..MachineConfig::default()
    };
    let image = &data[..data.len().min(0o4000) & !1];

    let mut interpreted = Machine::with_config(&config);
    let mut cached = Machine::with_config(&config);
    for machine in [&mut interpreted, &mut cached] {
        if machine.load_image(CODE_BASE, image).is_err() {
            return;
        }
        machine.set_pc(CODE_BASE);
    }
    let _ = disassemble_one(CODE_BASE, &interpreted.memory);

    let mut cache = TranslationCache::for_machine(&cached);
    let expected = interpreted.run();
    let actual = cache.run(&mut cached);

    // self-modifying images may legitimately diverge once a bound word is rewritten
    if cache.stats().hits == 0 {
        assert_eq!(expected, actual);
        assert_eq!(interpreted.registers, cached.registers);
    }
});
