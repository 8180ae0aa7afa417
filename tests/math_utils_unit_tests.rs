#![allow(
    non_upper_case_globals,
    unused_parens,
    unused_mut,
    unused_imports,
    non_snake_case
)]

extern crate skua_phase;
#[macro_use]
extern crate approx;

use skua_phase::utils::math_utils::MathUtils;

#[test]
fn log_add_exact_matches_direct_evaluation() {
    let a = (0.5f64).ln();
    let b = (0.25f64).ln();
    assert_relative_eq!(MathUtils::log_add_exact(a, b), (0.75f64).ln(), epsilon = 1e-12);
    assert_relative_eq!(MathUtils::log_add_exact(b, a), (0.75f64).ln(), epsilon = 1e-12);

    // Identity element
    assert_relative_eq!(MathUtils::log_add_exact(MathUtils::LOG_ZERO, a), a);
    assert_relative_eq!(MathUtils::log_add_exact(a, MathUtils::LOG_ZERO), a);
}

#[test]
fn log_add_exact_is_stable_for_distant_operands() {
    let a = -1000.0;
    let b = -2.0;
    let result = MathUtils::log_add_exact(a, b);
    assert_relative_eq!(result, b, epsilon = 1e-9);
    assert!(result >= b);
}

#[test]
fn log_sum_exp_reductions() {
    assert_eq!(MathUtils::log_sum_exp(&[]), MathUtils::LOG_ZERO);
    assert_relative_eq!(MathUtils::log_sum_exp(&[-3.5]), -3.5);

    let values = vec![(0.1f64).ln(), (0.2f64).ln(), (0.3f64).ln()];
    assert_relative_eq!(
        MathUtils::log_sum_exp(&values),
        (0.6f64).ln(),
        epsilon = 1e-12
    );

    // Neg-infinite entries contribute nothing
    let with_zero = vec![MathUtils::LOG_ZERO, (0.5f64).ln()];
    assert_relative_eq!(
        MathUtils::log_sum_exp(&with_zero),
        (0.5f64).ln(),
        epsilon = 1e-12
    );
    assert_eq!(
        MathUtils::log_sum_exp(&[MathUtils::LOG_ZERO, MathUtils::LOG_ZERO]),
        MathUtils::LOG_ZERO
    );
}

#[test]
fn ln_binomial_coefficient_matches_small_cases() {
    assert_relative_eq!(
        MathUtils::ln_binomial_coefficient(5, 2),
        (10.0f64).ln(),
        epsilon = 1e-9
    );
    assert_relative_eq!(MathUtils::ln_binomial_coefficient(7, 0), 0.0, epsilon = 1e-9);
    assert_relative_eq!(MathUtils::ln_binomial_coefficient(7, 7), 0.0, epsilon = 1e-9);
}

#[test]
fn binomial_p_value_tail_probabilities() {
    // Fully skewed: a single tail outcome
    assert_relative_eq!(MathUtils::binomial_p_value(4, 4), 1.0 / 16.0, epsilon = 1e-9);
    // Symmetric in k and n - k
    assert_relative_eq!(
        MathUtils::binomial_p_value(4, 0),
        MathUtils::binomial_p_value(4, 4),
        epsilon = 1e-12
    );
    // Balanced outcome is unremarkable
    assert_relative_eq!(
        MathUtils::binomial_p_value(10, 5),
        638.0 / 1024.0,
        epsilon = 1e-9
    );
    // Degenerate depth
    assert_relative_eq!(MathUtils::binomial_p_value(0, 0), 1.0);
}
