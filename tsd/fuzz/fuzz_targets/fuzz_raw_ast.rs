#![no_main]

use libfuzzer_sys::fuzz_target;
use tsd::{normalize_json, ProgramState, ResourceLimits};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok((unit, _)) = normalize_json(s, "fuzz.json", &ResourceLimits::default()) {
            let mut state = ProgramState::new();
            state.merge_unit(&unit);
        }
    }
});
