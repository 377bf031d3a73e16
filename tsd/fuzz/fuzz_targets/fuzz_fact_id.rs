#![no_main]

use libfuzzer_sys::fuzz_target;
use tsd::{escape_id_segment, parse_fact_id, unescape_id_segment};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        assert_eq!(unescape_id_segment(&escape_id_segment(s)), s);
        let _ = parse_fact_id(s);
    }
});
