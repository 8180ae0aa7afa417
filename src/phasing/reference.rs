use crate::bubble::bubble_graph::BubbleGraph;
use crate::params::PhaseParams;
use crate::phasing::profile_seq::PROFILE_PROB_SCALAR;

/**
 * One phasing site, mirroring a bubble: the allele count, the global allele
 * offset, flat allele priors, and the ancestral substitution matrix with a
 * zero diagonal and a constant heterozygous substitution cost off it. All
 * values are scaled negative natural logs, as in the profile bytes.
 */
#[derive(Debug, Clone)]
pub struct Site {
    pub allele_number: usize,
    pub allele_offset: usize,
    pub allele_prior_log_probs: Vec<u16>,
    pub substitution_log_probs: Vec<u16>,
}

impl Site {
    pub fn prior_log_prob(&self, allele: usize) -> f64 {
        -(self.allele_prior_log_probs[allele] as f64) / PROFILE_PROB_SCALAR
    }

    pub fn substitution_log_prob(&self, from: usize, to: usize) -> f64 {
        -(self.substitution_log_probs[from * self.allele_number + to] as f64) / PROFILE_PROB_SCALAR
    }
}

/// The site table the read partitioning HMMs are built over.
#[derive(Debug, Clone)]
pub struct PhasingReference {
    pub reference_name: String,
    pub sites: Vec<Site>,
    pub total_alleles: usize,
}

impl PhasingReference {
    pub fn from_bubble_graph(
        bg: &BubbleGraph,
        reference_name: &str,
        params: &PhaseParams,
    ) -> PhasingReference {
        let het_substitution_cost =
            (-params.het_substitution_probability.ln() * PROFILE_PROB_SCALAR).round() as u16;

        let mut total_alleles = 0;
        let sites = bg
            .bubbles
            .iter()
            .map(|bubble| {
                let allele_no = bubble.allele_no();
                total_alleles += allele_no;
                let mut substitution_log_probs = vec![0u16; allele_no * allele_no];
                for j in 0..allele_no {
                    for k in 0..allele_no {
                        substitution_log_probs[j * allele_no + k] =
                            if j == k { 0 } else { het_substitution_cost };
                    }
                }
                Site {
                    allele_number: allele_no,
                    allele_offset: bubble.allele_offset,
                    allele_prior_log_probs: vec![0; allele_no],
                    substitution_log_probs,
                }
            })
            .collect();

        PhasingReference {
            reference_name: reference_name.to_string(),
            sites,
            total_alleles,
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
