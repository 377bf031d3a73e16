#![no_main]

use libfuzzer_sys::fuzz_target;
use tsd::ProgramState;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut state = ProgramState::new();
        let _ = state.parse_and_merge_content(s, "fuzz_input.tsd");
        let _ = state.to_normalized_program().to_json();
    }
});
