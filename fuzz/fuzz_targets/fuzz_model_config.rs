//! Fuzz target for model.json parsing and validation.
//!
//! Parsing and validating arbitrary input must never panic, only return an
//! error.

#![no_main]

use ibp_config::validate::validate_model;
use ibp_config::ModelConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(model) = serde_json::from_slice::<ModelConfig>(data) {
        let _ = validate_model(&model);
    }
});
