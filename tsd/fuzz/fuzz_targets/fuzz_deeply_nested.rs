#![no_main]

use libfuzzer_sys::fuzz_target;
use tsd::ProgramState;

fuzz_target!(|depth: u16| {
    let mut state = ProgramState::new();

    let depth = (depth as usize % 400) + 1;

    let mut condition = String::from("p.x == 1");
    for i in 0..depth {
        condition = if i % 2 == 0 {
            format!("NOT ({})", condition)
        } else {
            format!("({} AND p.x > 0)", condition)
        };
    }

    let code = format!(
        "type P(#id: string, x: number)\nrule deeply_nested : {{p: P}} / {} ==> log(p.id)\n",
        condition
    );

    let _ = state.parse_and_merge_content(&code, "fuzz_nested.tsd");
});
