use crate::params::PhaseParams;
use crate::sequence::alphabet::{Symbol, SymbolString};
use crate::utils::math_utils::MathUtils;

const GAP_EMISSION_LOG_PROB: f64 = -1.3862943611198906; // ln(0.25)

/**
 * Three state affine pair-HMM (match, gap-in-allele, gap-in-read) over RLE
 * symbols, used to score read substrings against candidate alleles. All
 * probabilities are natural logs.
 *
 * Forward and reverse strand reads get separate machines so that strand
 * specific error profiles can be trained independently; by default both are
 * built from the same rates.
 */
#[derive(Debug, Clone)]
pub struct StateMachine {
    t_match_match: f64,
    t_match_gap: f64,
    t_gap_extend: f64,
    t_gap_match: f64,
    base_match_log_prob: f64,
    base_mismatch_log_prob: f64,
    repeat_match_log_prob: f64,
    repeat_mismatch_log_prob: f64,
    use_repeat_counts: bool,
}

impl StateMachine {
    pub fn for_forward_strand_read(params: &PhaseParams) -> StateMachine {
        Self::from_rates(params)
    }

    pub fn for_reverse_strand_read(params: &PhaseParams) -> StateMachine {
        Self::from_rates(params)
    }

    fn from_rates(params: &PhaseParams) -> StateMachine {
        let p = &params.pair_hmm;
        StateMachine {
            t_match_match: p.match_continue_prob.ln(),
            t_match_gap: p.gap_open_prob.ln(),
            t_gap_extend: p.gap_extend_prob.ln(),
            t_gap_match: (1.0 - p.gap_extend_prob).ln(),
            base_match_log_prob: (1.0 - p.base_mismatch_prob).ln(),
            base_mismatch_log_prob: (p.base_mismatch_prob / 3.0).ln(),
            repeat_match_log_prob: (1.0 - p.repeat_count_mismatch_prob).ln(),
            repeat_mismatch_log_prob: p.repeat_count_mismatch_prob.ln(),
            use_repeat_counts: params.use_repeat_counts_in_alignment
                && params.use_run_length_encoding,
        }
    }

    fn match_emission(&self, a: &Symbol, b: &Symbol) -> f64 {
        let mut log_prob = if a.base == b.base {
            self.base_match_log_prob
        } else {
            self.base_mismatch_log_prob
        };
        if self.use_repeat_counts {
            log_prob += if a.repeat_count == b.repeat_count {
                self.repeat_match_log_prob
            } else {
                let diff = (a.repeat_count as i64 - b.repeat_count as i64).unsigned_abs();
                self.repeat_mismatch_log_prob + (diff - 1) as f64 * *crate::utils::math_utils::LOG_ONE_HALF
            };
        }
        log_prob
    }
}

/**
 * Natural log forward probability of the pairwise alignment of symbol
 * strings a and b under the given state machine. Anchor pairs are accepted
 * for interface compatibility with banded scoring but are not yet used.
 */
// TODO: banded forward restricted to a diagonal corridor around anchor_pairs
pub fn compute_forward_probability(
    a: &SymbolString,
    b: &SymbolString,
    _anchor_pairs: &[(usize, usize)],
    sm: &StateMachine,
) -> f64 {
    let n = a.len();
    let m = b.len();
    if n == 0 && m == 0 {
        return 0.0;
    }

    let neg_inf = MathUtils::LOG_ZERO;
    // Rolling rows over b for the three state matrices.
    let mut match_prev = vec![neg_inf; m + 1];
    let mut gap_a_prev = vec![neg_inf; m + 1];
    let mut gap_b_prev = vec![neg_inf; m + 1];

    // Row i = 0: only gaps in b are possible.
    match_prev[0] = 0.0;
    for j in 1..=m {
        let open = match_prev[j - 1] + sm.t_match_gap;
        let extend = gap_b_prev[j - 1] + sm.t_gap_extend;
        gap_b_prev[j] = GAP_EMISSION_LOG_PROB + MathUtils::log_add_exact(open, extend);
        match_prev[j] = neg_inf;
    }

    let mut match_curr = vec![neg_inf; m + 1];
    let mut gap_a_curr = vec![neg_inf; m + 1];
    let mut gap_b_curr = vec![neg_inf; m + 1];

    for i in 1..=n {
        match_curr[0] = neg_inf;
        gap_b_curr[0] = neg_inf;
        let open = if i == 1 { sm.t_match_gap } else { neg_inf };
        let extend = gap_a_prev[0] + sm.t_gap_extend;
        gap_a_curr[0] = GAP_EMISSION_LOG_PROB + MathUtils::log_add_exact(open, extend);

        for j in 1..=m {
            let emission = sm.match_emission(&a[i - 1], &b[j - 1]);
            match_curr[j] = emission
                + MathUtils::log_add_exact(
                    MathUtils::log_add_exact(
                        match_prev[j - 1] + sm.t_match_match,
                        gap_a_prev[j - 1] + sm.t_gap_match,
                    ),
                    gap_b_prev[j - 1] + sm.t_gap_match,
                );
            gap_a_curr[j] = GAP_EMISSION_LOG_PROB
                + MathUtils::log_add_exact(
                    match_prev[j] + sm.t_match_gap,
                    gap_a_prev[j] + sm.t_gap_extend,
                );
            gap_b_curr[j] = GAP_EMISSION_LOG_PROB
                + MathUtils::log_add_exact(
                    match_curr[j - 1] + sm.t_match_gap,
                    gap_b_curr[j - 1] + sm.t_gap_extend,
                );
        }

        std::mem::swap(&mut match_prev, &mut match_curr);
        std::mem::swap(&mut gap_a_prev, &mut gap_a_curr);
        std::mem::swap(&mut gap_b_prev, &mut gap_b_curr);
    }

    MathUtils::log_add_exact(
        MathUtils::log_add_exact(match_prev[m], gap_a_prev[m]),
        gap_b_prev[m],
    )
}
