use crate::model::vcf_entry::VcfEntry;
use crate::params::PhaseParams;
use crate::poa::Poa;

/// Size of the sliding window coverage is averaged over when setting the
/// per-position candidate variant weight.
const CANDIDATE_WEIGHT_WINDOW: usize = 100;

/**
 * Per-node candidate variant weights: the local average coverage scaled by
 * candidate_variant_weight. The first and last window/2 positions copy the
 * nearest interior value; windows wider than the POA fall back to the
 * global average.
 */
pub fn candidate_weights(poa: &Poa, params: &PhaseParams) -> Vec<f64> {
    let node_count = poa.nodes.len();
    let window = CANDIDATE_WEIGHT_WINDOW;
    let mut weights = vec![0.0; node_count];

    if window >= node_count {
        let candidate_weight = poa.avg_coverage(0, node_count) * params.candidate_variant_weight;
        for w in weights.iter_mut() {
            *w = candidate_weight;
        }
        return weights;
    }

    let mut total_weight = 0.0;
    for i in 0..node_count {
        total_weight += poa.nodes[i].total_weight();
        if i >= window {
            total_weight -= poa.nodes[i - window].total_weight();
            weights[i - window / 2] = total_weight / window as f64 * params.candidate_variant_weight;
        }
    }

    for i in 0..window / 2 {
        weights[i] = weights[window / 2];
        weights[node_count - 1 - i] = weights[node_count - 1 - window / 2];
    }

    weights
}

/**
 * Flag each POA node that is a candidate variant site or falls inside a
 * candidate deletion. A node is flagged for a non-reference candidate base,
 * a non-reference candidate repeat count, or a candidate insertion starting
 * there; a candidate deletion of length d flags the node itself and the d
 * following nodes.
 */
pub fn candidate_variant_positions(poa: &Poa, candidate_weights: &[f64]) -> Vec<bool> {
    let node_count = poa.nodes.len();
    let mut positions = vec![false; node_count];

    for i in 0..node_count {
        let node = &poa.nodes[i];
        let w = candidate_weights[i];

        if node.has_candidate_substitution(&poa.alphabet, w)
            || node.has_candidate_repeat_count_change(w)
            || node.has_candidate_insert(w)
        {
            positions[i] = true;
        }

        let mut j = node.max_candidate_delete_length(w);
        if j > 0 {
            positions[i] = true;
        }
        while j > 0 {
            if i + j < node_count {
                positions[i + j] = true;
            }
            j -= 1;
        }
    }

    positions
}

/**
 * Replace the computed variant flags with the VCF mask: a node is flagged
 * iff some entry sits at its reference offset. The agreement tally between
 * the two masks is logged.
 */
fn update_candidate_positions_by_vcf(positions: &mut [bool], vcf_entries: &[VcfEntry]) {
    let mut tp = 0i64;
    let mut fp = 0i64;
    let mut fn_ = 0i64;
    let mut tn = 0i64;

    let mut v = 0;
    for (i, flag) in positions.iter_mut().enumerate() {
        // Node i covers reference offset i - 1
        let is_vcf = v < vcf_entries.len() && i >= 1 && vcf_entries[v].ref_pos + 1 == i;
        if *flag {
            if is_vcf {
                tp += 1;
            } else {
                fp += 1;
            }
        } else if is_vcf {
            fn_ += 1;
        } else {
            tn += 1;
        }

        *flag = is_vcf;
        while v < vcf_entries.len() && i >= 1 && vcf_entries[v].ref_pos + 1 <= i {
            v += 1;
        }
    }

    let total = positions.len() as f64;
    info!(
        "Of {} positions, got {} TP, {} FP, {} FN, {} TN, equating to a variation rate of {:.5}, \
         precision of {:.5}, and recall of {:.5}.",
        positions.len(),
        tp,
        fp,
        fn_,
        tn,
        (tp + fn_) as f64 / total,
        tp as f64 / (tp + fp).max(1) as f64,
        tp as f64 / (tp + fn_).max(1) as f64
    );
}

/// A position within +/- expansion of any set position becomes set.
fn expand_mask(mask: &[bool], expansion: usize) -> Vec<bool> {
    let mut expanded = vec![false; mask.len()];
    for (i, set) in mask.iter().enumerate() {
        if *set {
            let lo = i.saturating_sub(expansion);
            let hi = (i + expansion).min(mask.len());
            for e in expanded.iter_mut().take(hi).skip(lo) {
                *e = true;
            }
        }
    }
    expanded
}

/**
 * Anchor positions are the complement of the candidate variant mask after
 * expansion by column_anchor_trim. Returns (anchors, candidate variant
 * positions) so the builder can report per-bubble variant offsets.
 */
pub fn anchor_positions(
    poa: &Poa,
    candidate_weights: &[f64],
    vcf_entries: Option<&[VcfEntry]>,
    params: &PhaseParams,
) -> (Vec<bool>, Vec<bool>) {
    let mut candidate_positions = candidate_variant_positions(poa, candidate_weights);

    if let Some(entries) = vcf_entries {
        update_candidate_positions_by_vcf(&mut candidate_positions, entries);
    }

    let expanded = expand_mask(&candidate_positions, params.column_anchor_trim);
    let anchors: Vec<bool> = expanded.iter().map(|e| !e).collect();

    let total_anchors = anchors.iter().filter(|a| **a).count();
    debug!(
        "Creating filtered anchor positions got {} anchors for ref seq of length {}, that's one every {:.2} bases",
        total_anchors,
        poa.nodes.len(),
        poa.nodes.len() as f64 / total_anchors.max(1) as f64
    );

    (anchors, candidate_positions)
}
