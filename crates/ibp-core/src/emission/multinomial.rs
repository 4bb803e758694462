//! Categorical emissions with a symmetric Dirichlet prior per state.

use ibp_config::MultinomialPriors;
use ibp_math::dirichlet::{posterior_params, DirichletParams};
use rand::RngCore;

use super::{check_param_count, check_sequence_len, check_state, EmissionModel};
use crate::data::{ObjectRecord, ObservationSet, Observations};
use crate::error::{SamplerError, ShapeError};
use crate::model::{EmissionParams, StateAssignment, SufficientStats};

#[derive(Debug, Clone, PartialEq)]
pub struct MultinomialModel {
    pub priors: MultinomialPriors,
}

impl MultinomialModel {
    pub fn new(priors: MultinomialPriors) -> Self {
        Self { priors }
    }

    fn symbols<'a>(object: usize, record: &'a ObjectRecord) -> Result<&'a [usize], ShapeError> {
        match &record.obs {
            Observations::Discrete(symbols) => Ok(symbols),
            Observations::Continuous(rows) if rows.is_empty() => Ok(&[]),
            Observations::Continuous(_) => Err(ShapeError::Kind {
                object,
                expected: "discrete",
            }),
        }
    }

    fn check_symbol(&self, object: usize, t: usize, symbol: usize) -> Result<(), ShapeError> {
        if symbol >= self.priors.num_symbols {
            return Err(ShapeError::Symbol {
                object,
                t,
                symbol,
                num_symbols: self.priors.num_symbols,
            });
        }
        Ok(())
    }
}

impl EmissionModel for MultinomialModel {
    fn prior_stats(&self, num_states: usize) -> SufficientStats {
        SufficientStats::Multinomial(vec![vec![0.0; self.priors.num_symbols]; num_states])
    }

    fn initial_params(&self, num_states: usize) -> EmissionParams {
        let v = self.priors.num_symbols;
        EmissionParams::Multinomial {
            probs: vec![vec![1.0 / v as f64; v]; num_states],
        }
    }

    fn accumulate(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError> {
        let mut counts = vec![vec![0.0; self.priors.num_symbols]; assignment.num_states];
        for (object, (record, seq)) in data.iter().zip(&assignment.sequences).enumerate() {
            let symbols = Self::symbols(object, record)?;
            check_sequence_len(object, symbols.len(), seq.len())?;
            for (t, (&y, &k)) in symbols.iter().zip(seq).enumerate() {
                self.check_symbol(object, t, y)?;
                counts[k][y] += 1.0;
            }
        }
        Ok(SufficientStats::Multinomial(counts))
    }

    fn sample_params(
        &self,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError> {
        let SufficientStats::Multinomial(counts) = stats else {
            return Err(SamplerError::Failed(
                "multinomial model given regression statistics".to_string(),
            ));
        };
        let prior = DirichletParams::symmetric(self.priors.num_symbols, self.priors.concentration)
            .ok_or_else(|| SamplerError::Degenerate {
                what: "emission prior",
                detail: format!(
                    "symmetric Dirichlet({}) over {} symbols",
                    self.priors.concentration, self.priors.num_symbols
                ),
            })?;

        let probs = counts
            .iter()
            .map(|c| {
                posterior_params(&prior, c, 1.0)
                    .and_then(|post| post.sample(rng))
                    .ok_or_else(|| SamplerError::Degenerate {
                        what: "emission posterior",
                        detail: format!("counts {:?}", c),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EmissionParams::Multinomial { probs })
    }

    fn log_likelihoods(
        &self,
        params: &EmissionParams,
        object: usize,
        record: &ObjectRecord,
        states: &[usize],
    ) -> Result<Vec<Vec<f64>>, SamplerError> {
        let EmissionParams::Multinomial { probs } = params else {
            return Err(SamplerError::Failed(
                "multinomial model given regression parameters".to_string(),
            ));
        };
        self.check_params(params, 0)?;
        for &k in states {
            check_state(object, k, probs.len())?;
        }
        let symbols = Self::symbols(object, record)?;
        symbols
            .iter()
            .enumerate()
            .map(|(t, &y)| {
                self.check_symbol(object, t, y)?;
                Ok(states.iter().map(|&k| probs[k][y].ln()).collect())
            })
            .collect()
    }

    fn check_params(&self, params: &EmissionParams, num_states: usize) -> Result<(), ShapeError> {
        let EmissionParams::Multinomial { probs } = params else {
            return Err(ShapeError::Params {
                detail: "expected multinomial parameters, got regression".to_string(),
            });
        };
        check_param_count(probs.len(), num_states)?;
        let width = self.priors.num_symbols;
        if let Some((k, row)) = probs.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(ShapeError::Params {
                detail: format!("state {k} has {} symbol probabilities, expected {width}", row.len()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model() -> MultinomialModel {
        MultinomialModel::new(MultinomialPriors {
            num_symbols: 3,
            concentration: 1.0,
        })
    }

    #[test]
    fn counts_symbols_per_state() {
        let data = ObservationSet::new(vec![
            ObjectRecord::discrete(vec![0, 2, 2]),
            ObjectRecord::discrete(vec![1]),
        ]);
        let a = StateAssignment::from_sequences(vec![vec![0, 1, 1], vec![0]], 2).unwrap();
        let stats = model().accumulate(&data, &a).unwrap();
        assert_eq!(
            stats,
            SufficientStats::Multinomial(vec![vec![1.0, 1.0, 0.0], vec![0.0, 0.0, 2.0]])
        );
    }

    #[test]
    fn out_of_alphabet_symbol_rejected() {
        let data = ObservationSet::new(vec![ObjectRecord::discrete(vec![0, 5])]);
        let a = StateAssignment::from_sequences(vec![vec![0, 0]], 1).unwrap();
        let err = model().accumulate(&data, &a).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::Shape(ShapeError::Symbol { t: 1, symbol: 5, .. })
        ));
    }

    #[test]
    fn sampled_rows_are_distributions() {
        let stats = SufficientStats::Multinomial(vec![vec![10.0, 0.0, 3.0]; 4]);
        let mut rng = StdRng::seed_from_u64(17);
        let EmissionParams::Multinomial { probs } = model().sample_params(&stats, &mut rng).unwrap()
        else {
            panic!("expected multinomial params");
        };
        assert_eq!(probs.len(), 4);
        for row in probs {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn log_likelihood_reads_emission_table() {
        let params = EmissionParams::Multinomial {
            probs: vec![vec![0.5, 0.25, 0.25], vec![0.1, 0.1, 0.8]],
        };
        let record = ObjectRecord::discrete(vec![2]);
        let ll = model().log_likelihoods(&params, 0, &record, &[1]).unwrap();
        assert!((ll[0][0] - 0.8f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn narrow_emission_table_is_an_error() {
        // Two-symbol table scored under a three-symbol alphabet.
        let params = EmissionParams::Multinomial {
            probs: vec![vec![0.5, 0.5]],
        };
        let record = ObjectRecord::discrete(vec![2]);
        let err = model().log_likelihoods(&params, 0, &record, &[0]).unwrap_err();
        assert!(matches!(err, SamplerError::Shape(ShapeError::Params { .. })));
        assert!(err.to_string().contains("state 0 has 2 symbol probabilities"), "{err}");
    }
}
