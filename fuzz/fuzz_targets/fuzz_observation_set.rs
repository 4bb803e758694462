//! Fuzz target for observation-set parsing.
//!
//! Any parsed set is checked against each observation model and flattened
//! into evaluation arrays; none of that may panic.

#![no_main]

use ibp_config::{MultinomialPriors, ObsModelConfig, RegressionPriors};
use ibp_core::data::ObservationSet;
use ibp_core::sequence::{EvaluationArrays, SequenceIndex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(set) = ObservationSet::from_json_str(text) else {
        return;
    };

    let models = [
        ObsModelConfig::Gaussian(RegressionPriors::weak(1)),
        ObsModelConfig::AutoRegressive(RegressionPriors::weak(2)),
        ObsModelConfig::Multinomial(MultinomialPriors {
            num_symbols: 4,
            concentration: 1.0,
        }),
    ];
    for model in &models {
        let _ = set.check_model(model);
    }

    let index = SequenceIndex::from_observations(&set);
    let _ = EvaluationArrays::build(&set, &index, None);
});
