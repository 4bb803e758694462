//! Property-based tests for ibp-math numerical and sampling functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use ibp_math::dirichlet::DirichletParams;
use ibp_math::{harmonic_number, log_sum_exp, normalize_log_weights, sample_log_categorical};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_sum_exp properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL), "lse([{},{}])={} != {}", a, b, ab, ba);
    }

    /// log_sum_exp never falls below the max input.
    #[test]
    fn log_sum_exp_bounds(values in prop::collection::vec(-500.0..500.0f64, 1..20)) {
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lse = log_sum_exp(&values);
        prop_assert!(lse >= max - TOL);
        prop_assert!(lse <= max + (values.len() as f64).ln() + TOL);
    }
}

// ============================================================================
// normalization and draws
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Normalized log weights form a probability vector.
    #[test]
    fn normalized_weights_sum_to_one(values in prop::collection::vec(-700.0..700.0f64, 1..30)) {
        let mut w = values.clone();
        normalize_log_weights(&mut w).unwrap();
        let sum: f64 = w.iter().sum();
        prop_assert!(approx_eq(sum, 1.0, 1e-9), "sum={}", sum);
        prop_assert!(w.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    /// A masked category is never drawn.
    #[test]
    fn masked_category_never_drawn(seed in any::<u64>(), masked in 0usize..4) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut w = vec![0.0; 4];
        w[masked] = f64::NEG_INFINITY;
        let k = sample_log_categorical(&w, &mut rng).unwrap();
        prop_assert_ne!(k, masked);
    }

    /// Dirichlet draws are probability vectors for any valid concentration.
    #[test]
    fn dirichlet_draws_are_simplex_points(
        seed in any::<u64>(),
        alpha in prop::collection::vec(1e-3..50.0f64, 1..12),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = DirichletParams::new(alpha).unwrap();
        let draw = params.sample(&mut rng).unwrap();
        prop_assert_eq!(draw.len(), params.k());
        prop_assert!(approx_eq(draw.iter().sum::<f64>(), 1.0, 1e-9));
    }

    /// Harmonic numbers are increasing.
    #[test]
    fn harmonic_number_increasing(n in 0usize..5000) {
        prop_assert!(harmonic_number(n + 1) > harmonic_number(n));
    }
}
