#![no_main]
use libfuzzer_sys::fuzz_target;
use settler_save::{CodecConfig, SaveFormat, TextOptions};

fuzz_target!(|data: &[u8]| {
    // Both number policies must reject or accept without panicking.
    let lenient = CodecConfig::default();
    let strict = CodecConfig {
        text: TextOptions { strict_numbers: true },
        ..CodecConfig::default()
    };
    let _ = settler_save::load(data, SaveFormat::Text, &lenient);
    let _ = settler_save::load(data, SaveFormat::Text, &strict);
});
