#![no_main]

use consign::response::ResponseReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let mut reader = ResponseReader::new();
    for line in data.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if reader.feed_line(line).is_err() {
            return;
        }
    }

    if let Ok(outcome) = reader.finish() {
        // A cleanly read response always carries something to show.
        assert!(!outcome.message.is_empty());
    }
});
