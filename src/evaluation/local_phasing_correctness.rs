use std::collections::HashMap;

use crate::utils::errors::SkuaError;

/**
 * A heterozygous variant from a phased VCF: position, alleles, the two
 * phased genotype allele indices, and the phase set the call belongs to.
 */
#[derive(Debug, Clone)]
pub struct PhasedVariant {
    pub ref_seq_name: String,
    pub ref_pos: i64,
    pub quality: f64,
    pub alleles: Vec<String>,
    pub gt1: usize,
    pub gt2: usize,
    pub phase_set: String,
}

impl PhasedVariant {
    pub fn new(
        ref_seq_name: &str,
        ref_pos: i64,
        quality: f64,
        alleles: Vec<String>,
        gt1: usize,
        gt2: usize,
        phase_set: &str,
    ) -> PhasedVariant {
        PhasedVariant {
            ref_seq_name: ref_seq_name.to_string(),
            ref_pos,
            quality,
            alleles,
            gt1,
            gt2,
            phase_set: phase_set.to_string(),
        }
    }
}

/// Running sums for one (query phase set, truth phase set) pair.
struct PartialPhaseSums {
    query_phase_set: String,
    truth_phase_set: String,
    unphased_sum: f64,
    phase_sum1: f64,
    phase_sum2: f64,
}

/**
 * The variant-index interval [first, last] each phase set occupies, used to
 * retire partial sums once a sweep has left their window. Errors when the
 * variants are out of position order.
 */
fn phase_set_intervals(
    phased_variants: &[PhasedVariant],
) -> Result<HashMap<String, (usize, usize)>, SkuaError> {
    let mut intervals: HashMap<String, (usize, usize)> = HashMap::new();
    let mut prev_pos = i64::MIN;
    for (i, pv) in phased_variants.iter().enumerate() {
        if prev_pos > pv.ref_pos {
            return Err(SkuaError::InvalidInput(format!(
                "Phased variant at position {} on sequence {} is out of order with position {}",
                pv.ref_pos, pv.ref_seq_name, prev_pos
            )));
        }
        prev_pos = pv.ref_pos;
        intervals
            .entry(pv.phase_set.clone())
            .and_modify(|interval| interval.1 = i)
            .or_insert((i, i));
    }
    Ok(intervals)
}

/// Allele correspondence between a query and truth call at a shared site.
/// None when the alleles do not line up or a duplicate allele makes the
/// match ambiguous.
fn match_polarity(qpv: &PhasedVariant, tpv: &PhasedVariant) -> Option<bool> {
    let match11 = qpv.alleles[qpv.gt1] == tpv.alleles[tpv.gt1];
    let match12 = qpv.alleles[qpv.gt1] == tpv.alleles[tpv.gt2];
    let match21 = qpv.alleles[qpv.gt2] == tpv.alleles[tpv.gt1];
    let match22 = qpv.alleles[qpv.gt2] == tpv.alleles[tpv.gt2];

    if !(match11 || match12) || !(match21 || match22) {
        // The site is shared but the alleles are not
        return None;
    }
    if match11 as u8 + match12 as u8 + match21 as u8 + match22 as u8 > 2 {
        // At least one allele must be duplicated in the list of alts
        warn!(
            "Duplicate alleles detected at position {} on sequence {}",
            qpv.ref_pos, qpv.ref_seq_name
        );
        return None;
    }

    // Only het sites with matched alleles remain, so the combinations are
    // 1-1/2-2 or 1-2/2-1
    Some(match11)
}

/**
 * One sweep of the decayed pairwise concordance sum. Returns the
 * concordance numerator, the partition (maximum attainable) numerator, and
 * the number of shared phased variants scored.
 */
fn phasing_correctness_internal(
    query: &[PhasedVariant],
    truth: &[PhasedVariant],
    decay: f64,
    query_intervals: &HashMap<String, (usize, usize)>,
    truth_intervals: &HashMap<String, (usize, usize)>,
    forward: bool,
) -> (f64, f64, usize) {
    let mut phase_set_partial_sums: Vec<PartialPhaseSums> = Vec::new();

    let mut total_sum = 0.0;
    let mut partition_sum = 0.0;
    let mut partition_total_sum = 0.0;
    // Residue of phase set pairs whose window has been exited
    let mut out_of_scope_sum = 0.0;
    let mut num_phased = 0usize;

    let (mut i, mut j, incr): (i64, i64, i64) = if forward {
        (0, 0, 1)
    } else {
        (query.len() as i64 - 1, truth.len() as i64 - 1, -1)
    };

    debug!("beginning {} sum", if forward { "forward" } else { "backward" });

    while i >= 0 && (i as usize) < query.len() && j >= 0 && (j as usize) < truth.len() {
        let qpv = &query[i as usize];
        let tpv = &truth[j as usize];

        if (qpv.ref_pos < tpv.ref_pos && forward) || (qpv.ref_pos > tpv.ref_pos && !forward) {
            // Variant only in query
            i += incr;
        } else if (tpv.ref_pos < qpv.ref_pos && forward) || (tpv.ref_pos > qpv.ref_pos && !forward)
        {
            // Variant only in truth
            j += incr;
        } else {
            let polarity = match_polarity(qpv, tpv);
            i += incr;
            j += incr;

            let match11 = match polarity {
                Some(p) => p,
                None => continue,
            };

            num_phased += 1;

            let mut found_cophased_sum = false;
            for sums in phase_set_partial_sums.iter_mut() {
                if qpv.phase_set == sums.query_phase_set && tpv.phase_set == sums.truth_phase_set {
                    // Co-phased with the variants making up this partial sum
                    found_cophased_sum = true;
                    if match11 {
                        total_sum += sums.phase_sum1;
                        sums.phase_sum1 += 1.0;
                    } else {
                        total_sum += sums.phase_sum2;
                        sums.phase_sum2 += 1.0;
                    }
                } else {
                    total_sum += sums.unphased_sum;
                }
                // The unphased sum acts as if always correctly phased
                sums.unphased_sum += 1.0;
            }
            total_sum += out_of_scope_sum;

            // The partition function always counts pairs as phased
            partition_total_sum += partition_sum;
            partition_sum += 1.0;

            if !found_cophased_sum {
                phase_set_partial_sums.push(PartialPhaseSums {
                    query_phase_set: qpv.phase_set.clone(),
                    truth_phase_set: tpv.phase_set.clone(),
                    unphased_sum: 1.0,
                    phase_sum1: if match11 { 1.0 } else { 0.0 },
                    phase_sum2: if match11 { 0.0 } else { 1.0 },
                });
            }

            for sums in phase_set_partial_sums.iter_mut() {
                sums.unphased_sum *= decay;
                sums.phase_sum1 *= decay;
                sums.phase_sum2 *= decay;
            }
            partition_sum *= decay;
            out_of_scope_sum *= decay;
        }

        // Retire phase set pairs whose window has been exited, folding their
        // unphased residue into the out-of-scope accumulator
        phase_set_partial_sums.retain(|sums| {
            let query_interval = query_intervals[&sums.query_phase_set];
            let truth_interval = truth_intervals[&sums.truth_phase_set];
            let exited = i < query_interval.0 as i64
                || i > query_interval.1 as i64
                || j < truth_interval.0 as i64
                || j > truth_interval.1 as i64;
            if exited {
                out_of_scope_sum += sums.unphased_sum;
            }
            !exited
        });
    }

    (total_sum, partition_total_sum, num_phased)
}

/**
 * The switch correctness limit: the fraction of adjacent matchable shared
 * variant pairs whose relative phase agrees. Pairs straddling a phase set
 * boundary in either call set always count as correct.
 */
pub fn switch_correctness(query: &[PhasedVariant], truth: &[PhasedVariant]) -> (f64, usize) {
    let mut prev_phase_sets: Option<(String, String)> = None;
    let mut prev_in_phase = false;

    let mut num_phased_variants = 0usize;
    let mut num_correctly_phased_pairs = 0usize;

    let mut i = 0usize;
    let mut j = 0usize;
    while i < query.len() && j < truth.len() {
        let qpv = &query[i];
        let tpv = &truth[j];

        if qpv.ref_pos < tpv.ref_pos {
            i += 1;
        } else if tpv.ref_pos < qpv.ref_pos {
            j += 1;
        } else {
            let polarity = match_polarity(qpv, tpv);
            i += 1;
            j += 1;

            let match11 = match polarity {
                Some(p) => p,
                None => continue,
            };

            num_phased_variants += 1;

            if let Some((prev_qps, prev_tps)) = &prev_phase_sets {
                if *prev_qps == qpv.phase_set && *prev_tps == tpv.phase_set {
                    if match11 == prev_in_phase {
                        num_correctly_phased_pairs += 1;
                    }
                } else {
                    num_correctly_phased_pairs += 1;
                }
            }

            prev_in_phase = match11;
            prev_phase_sets = Some((qpv.phase_set.clone(), tpv.phase_set.clone()));
        }
    }

    if num_phased_variants < 2 {
        return (f64::NAN, num_phased_variants);
    }
    (
        num_correctly_phased_pairs as f64 / (num_phased_variants - 1) as f64,
        num_phased_variants,
    )
}

/**
 * Exponentially decayed pairwise phasing concordance between two phased
 * variant lists over one contig, both sorted by position. Every ordered
 * pair of matchable shared het variants contributes decay^(gap) when its
 * relative phase is concordant; the result is normalized by the attainable
 * maximum, so it lies in [0, 1]. At decay == 1 this is the global pairwise
 * concordance; decay == 0 is evaluated as the switch correctness limit.
 *
 * Returns the correctness plus the number of shared phased variants
 * considered.
 */
pub fn phasing_correctness(
    query: &[PhasedVariant],
    truth: &[PhasedVariant],
    decay: f64,
) -> Result<(f64, usize), SkuaError> {
    if !(0.0..=1.0).contains(&decay) {
        return Err(SkuaError::InvalidConfiguration(format!(
            "Decay factor is {}, must be between 0.0 and 1.0",
            decay
        )));
    }

    debug!("calculating correctness with decay {}", decay);

    if decay == 0.0 {
        // The limit is evaluated directly, the general form divides by zero
        return Ok(switch_correctness(query, truth));
    }

    let query_intervals = phase_set_intervals(query)?;
    let truth_intervals = phase_set_intervals(truth)?;

    let (forward_sum, forward_partition, num_phased) = phasing_correctness_internal(
        query,
        truth,
        decay,
        &query_intervals,
        &truth_intervals,
        true,
    );
    let (backward_sum, backward_partition, _) = phasing_correctness_internal(
        query,
        truth,
        decay,
        &query_intervals,
        &truth_intervals,
        false,
    );

    let correctness = (forward_sum + backward_sum) / (forward_partition + backward_partition);
    debug!(
        "fwd numer {}, bwd numer {}, fwd denom {}, bwd denom {}, final answer {}",
        forward_sum, backward_sum, forward_partition, backward_partition, correctness
    );

    Ok((correctness, num_phased))
}
