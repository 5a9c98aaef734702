#![no_main]

use libfuzzer_sys::fuzz_target;
use lockwright_lockfile::read_previous_pins;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Should not panic on any input.
        if let Ok(pins) = read_previous_pins(text) {
            for (name, version) in &pins {
                let _ = format!("{name}=={version}");
            }
        }
    }
});
