#![no_main]
use libfuzzer_sys::fuzz_target;
use settler_save::{CodecConfig, SaveFormat};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes through the legacy decoder.
    // Must not panic -- returning Err is fine.
    let _ = settler_save::load(data, SaveFormat::LegacyV0, &CodecConfig::default());
});
