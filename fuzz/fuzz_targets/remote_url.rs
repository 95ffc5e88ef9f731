#![no_main]

use consign::remote_url::parse_remote_url;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(url) = parse_remote_url(data) {
        // Whatever we accept must survive a reparse of its own rendering.
        let _ = url.as_str().parse::<url::Url>();
    }
});
