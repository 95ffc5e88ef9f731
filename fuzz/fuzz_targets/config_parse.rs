#![no_main]

use consign::config::ConsignConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(config) = toml::from_str::<ConsignConfig>(data) {
        let _ = config.validate();
    }
});
