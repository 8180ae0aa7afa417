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

use skua_phase::evaluation::local_phasing_correctness::{
    phasing_correctness, switch_correctness, PhasedVariant,
};
use skua_phase::utils::errors::SkuaError;

/// A het A/G variant; in_phase controls which haplotype carries the alt.
fn pv(pos: i64, in_phase: bool, phase_set: &str) -> PhasedVariant {
    let (gt1, gt2) = if in_phase { (0, 1) } else { (1, 0) };
    PhasedVariant::new(
        "ctg_test",
        pos,
        60.0,
        vec!["A".to_string(), "G".to_string()],
        gt1,
        gt2,
        phase_set,
    )
}

fn flip(pv: &PhasedVariant) -> PhasedVariant {
    let mut flipped = pv.clone();
    std::mem::swap(&mut flipped.gt1, &mut flipped.gt2);
    flipped
}

/// Global pairwise concordance computed directly, valid for fully phased
/// single-phase-set call sets over identical sites.
fn direct_pairwise_concordance(query: &[PhasedVariant], truth: &[PhasedVariant]) -> f64 {
    let polarities: Vec<bool> = query
        .iter()
        .zip(truth.iter())
        .map(|(q, t)| q.alleles[q.gt1] == t.alleles[t.gt1])
        .collect();
    let n = polarities.len();
    let mut concordant = 0usize;
    let mut total = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            total += 1;
            if polarities[i] == polarities[j] {
                concordant += 1;
            }
        }
    }
    concordant as f64 / total as f64
}

#[test]
fn identical_call_sets_are_perfectly_correct_at_any_decay() {
    let variants: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, i % 3 == 0, "ps1")).collect();

    for decay in [0.0, 0.25, 0.5, 0.9, 1.0] {
        let (correctness, num_phased) =
            phasing_correctness(&variants, &variants, decay).unwrap();
        assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
        assert_eq!(num_phased, 20);
    }
}

#[test]
fn identical_call_sets_with_two_phase_sets_are_perfectly_correct() {
    let mut variants = Vec::new();
    for i in 0..10 {
        variants.push(pv(10 * i, i % 2 == 0, "ps_a"));
    }
    for i in 10..20 {
        variants.push(pv(10 * i, i % 2 == 0, "ps_b"));
    }

    for decay in [0.0, 0.5, 1.0] {
        let (correctness, num_phased) =
            phasing_correctness(&variants, &variants, decay).unwrap();
        assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
        assert_eq!(num_phased, 20);
    }
}

#[test]
fn correctness_is_polarity_agnostic() {
    let query: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, i % 2 == 0, "ps1")).collect();
    let truth: Vec<PhasedVariant> = query.iter().map(flip).collect();

    for decay in [0.0, 0.5, 1.0] {
        let (correctness, _) = phasing_correctness(&query, &truth, decay).unwrap();
        assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn correctness_is_symmetric_in_query_and_truth() {
    let truth: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, true, "ps1")).collect();
    // A single switch error after the eleventh variant
    let query: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, i < 11, "ps1")).collect();

    for decay in [0.3, 0.7, 1.0] {
        let (forward, _) = phasing_correctness(&query, &truth, decay).unwrap();
        let (reverse, _) = phasing_correctness(&truth, &query, decay).unwrap();
        assert_relative_eq!(forward, reverse, epsilon = 1e-9);
    }
}

#[test]
fn single_switch_error_at_decay_zero_gives_adjacent_pair_correctness() {
    let n = 20;
    let truth: Vec<PhasedVariant> = (0..n).map(|i| pv(10 * i, true, "ps1")).collect();
    // The switch happens between variants 10 and 11
    let query: Vec<PhasedVariant> = (0..n).map(|i| pv(10 * i, i < 11, "ps1")).collect();

    let (correctness, num_phased) = phasing_correctness(&query, &truth, 0.0).unwrap();
    assert_eq!(num_phased, 20);
    assert_relative_eq!(
        correctness,
        (n as f64 - 2.0) / (n as f64 - 1.0),
        epsilon = 1e-12
    );
}

#[test]
fn decay_one_matches_global_pairwise_concordance() {
    let truth: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, true, "ps1")).collect();
    let query: Vec<PhasedVariant> = (0..20).map(|i| pv(10 * i, i < 10, "ps1")).collect();

    let (correctness, _) = phasing_correctness(&query, &truth, 1.0).unwrap();
    assert_relative_eq!(
        correctness,
        direct_pairwise_concordance(&query, &truth),
        epsilon = 1e-9
    );
    // 10 in-phase and 10 out-of-phase variants: 2 * C(10, 2) of C(20, 2)
    assert_relative_eq!(correctness, 90.0 / 190.0, epsilon = 1e-9);
}

#[test]
fn variants_missing_from_one_call_set_are_ignored() {
    let query: Vec<PhasedVariant> = [0, 10, 20].iter().map(|p| pv(*p, true, "ps1")).collect();
    let truth: Vec<PhasedVariant> = [10, 20, 30].iter().map(|p| pv(*p, true, "ps1")).collect();

    let (correctness, num_phased) = phasing_correctness(&query, &truth, 0.5).unwrap();
    assert_eq!(num_phased, 2);
    assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
}

#[test]
fn mismatched_alleles_are_skipped() {
    let mut query: Vec<PhasedVariant> = (0..3).map(|i| pv(10 * i, true, "ps1")).collect();
    let mut truth = query.clone();
    // Different variant representation at the middle site
    truth[1].alleles = vec!["C".to_string(), "T".to_string()];

    let (correctness, num_phased) = phasing_correctness(&query, &truth, 0.5).unwrap();
    assert_eq!(num_phased, 2);
    assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
}

#[test]
fn duplicate_alleles_are_skipped() {
    let mut query: Vec<PhasedVariant> = (0..3).map(|i| pv(10 * i, true, "ps1")).collect();
    let mut truth = query.clone();
    // A degenerate record whose alts duplicate the ref allele on both sides
    query[1].alleles = vec!["A".to_string(), "A".to_string()];
    truth[1].alleles = vec!["A".to_string(), "A".to_string()];

    let (correctness, num_phased) = phasing_correctness(&query, &truth, 0.5).unwrap();
    assert_eq!(num_phased, 2);
    assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
}

#[test]
fn switch_correctness_needs_at_least_two_shared_variants() {
    let query = vec![pv(0, true, "ps1")];
    let truth = vec![pv(0, true, "ps1")];

    let (correctness, num_phased) = switch_correctness(&query, &truth);
    assert_eq!(num_phased, 1);
    assert!(correctness.is_nan());
}

#[test]
fn phase_set_boundaries_always_count_as_correct_in_the_switch_limit() {
    // The apparent switch coincides with a phase set boundary in the query,
    // so no pair is counted wrong
    let truth: Vec<PhasedVariant> = (0..10).map(|i| pv(10 * i, true, "ps1")).collect();
    let query: Vec<PhasedVariant> = (0..10)
        .map(|i| pv(10 * i, i < 5, if i < 5 { "ps_a" } else { "ps_b" }))
        .collect();

    let (correctness, num_phased) = phasing_correctness(&query, &truth, 0.0).unwrap();
    assert_eq!(num_phased, 10);
    assert_relative_eq!(correctness, 1.0, epsilon = 1e-12);
}

#[test]
fn out_of_range_decay_is_a_configuration_error() {
    let variants: Vec<PhasedVariant> = (0..5).map(|i| pv(10 * i, true, "ps1")).collect();

    assert!(matches!(
        phasing_correctness(&variants, &variants, -0.1),
        Err(SkuaError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        phasing_correctness(&variants, &variants, 1.5),
        Err(SkuaError::InvalidConfiguration(_))
    ));
}

#[test]
fn out_of_order_variants_are_an_input_error() {
    let mut variants: Vec<PhasedVariant> = (0..5).map(|i| pv(10 * i, true, "ps1")).collect();
    variants.swap(1, 3);

    assert!(matches!(
        phasing_correctness(&variants, &variants, 0.5),
        Err(SkuaError::InvalidInput(_))
    ));
}
