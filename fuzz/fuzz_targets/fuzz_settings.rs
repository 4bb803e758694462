//! Fuzz target for sampler settings in both JSON and TOML form.

#![no_main]

use ibp_config::validate::validate_settings;
use ibp_config::SamplerSettings;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for parsed in [
        SamplerSettings::from_json_str(text),
        SamplerSettings::from_toml_str(text),
    ] {
        if let Ok(settings) = parsed {
            let _ = validate_settings(&settings);
            let _ = settings.effective_seed();
        }
    }
});
