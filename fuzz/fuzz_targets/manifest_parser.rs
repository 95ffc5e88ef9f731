#![no_main]

use consign::manifest::parse_manifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let lines: Vec<String> = data.lines().map(str::to_string).collect();
    match parse_manifest(&lines) {
        Ok(pairs) => {
            for pair in pairs {
                assert!(pair.line >= 1 && pair.column >= 1);
            }
        }
        Err(e) => assert!(e.line >= 1),
    }
});
