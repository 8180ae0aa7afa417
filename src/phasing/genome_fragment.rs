use std::collections::HashSet;

use crate::params::PhaseParams;
use crate::phasing::profile_seq::ProfileSeq;
use crate::phasing::reference::PhasingReference;
use crate::phasing::rp_hmm::{RpColumn, ReadPartitioningHmm};
use crate::utils::math_utils::MathUtils;

/**
 * The phased output over a run of sites: per site the two haplotype allele
 * indices with their probabilities, the joint genotype with its
 * probability, the inferred ancestral allele, and the two read partitions
 * (owning their profile sequences).
 */
#[derive(Debug, Clone)]
pub struct GenomeFragment {
    pub reference_name: String,
    pub ref_start: usize,
    pub length: usize,
    pub genotype_string: Vec<usize>,
    pub genotype_probs: Vec<f64>,
    pub haplotype_string1: Vec<usize>,
    pub haplotype_probs1: Vec<f64>,
    pub haplotype_string2: Vec<usize>,
    pub haplotype_probs2: Vec<f64>,
    pub ancestor_string: Vec<usize>,
    pub reads1: Vec<ProfileSeq>,
    pub reads2: Vec<ProfileSeq>,
}

impl GenomeFragment {
    pub fn construct_empty(reference_name: &str) -> GenomeFragment {
        GenomeFragment {
            reference_name: reference_name.to_string(),
            ref_start: 0,
            length: 0,
            genotype_string: Vec::new(),
            genotype_probs: Vec::new(),
            haplotype_string1: Vec::new(),
            haplotype_probs1: Vec::new(),
            haplotype_string2: Vec::new(),
            haplotype_probs2: Vec::new(),
            ancestor_string: Vec::new(),
            reads1: Vec::new(),
            reads2: Vec::new(),
        }
    }

    /**
     * Infer the fragment from an HMM and a partition path through it: fill
     * the per-site predictions column by column, then split the profile
     * sequences by each read's majority partition side along the path.
     */
    pub fn construct(
        hmm: &ReadPartitioningHmm,
        path: &[u64],
        reference: &PhasingReference,
        params: &PhaseParams,
    ) -> GenomeFragment {
        assert_eq!(path.len(), hmm.columns.len());

        let mut fragment = GenomeFragment {
            reference_name: reference.reference_name.clone(),
            ref_start: hmm.ref_start,
            length: hmm.ref_length,
            genotype_string: vec![0; hmm.ref_length],
            genotype_probs: vec![0.0; hmm.ref_length],
            haplotype_string1: vec![0; hmm.ref_length],
            haplotype_probs1: vec![0.0; hmm.ref_length],
            haplotype_string2: vec![0; hmm.ref_length],
            haplotype_probs2: vec![0.0; hmm.ref_length],
            ancestor_string: vec![0; hmm.ref_length],
            reads1: Vec::new(),
            reads2: Vec::new(),
        };

        for (column, partition) in hmm.columns.iter().zip(path.iter()) {
            fragment.fill_in_predicted_genome(*partition, column, reference, params, &hmm.profile_seqs);
        }

        // Assign each read by the majority of its per-column sides
        for (pseq_index, pseq) in hmm.profile_seqs.iter().enumerate() {
            let mut covered = 0usize;
            let mut in_partition1 = 0usize;
            for (column, partition) in hmm.columns.iter().zip(path.iter()) {
                if let Some(bit) = column.read_bit(pseq_index) {
                    covered += 1;
                    if (partition >> bit) & 1 == 1 {
                        in_partition1 += 1;
                    }
                }
            }
            if 2 * in_partition1 >= covered.max(1) {
                fragment.reads1.push(pseq.clone());
            } else {
                fragment.reads2.push(pseq.clone());
            }
        }

        fragment
    }

    /**
     * Fill the predicted haplotypes, genotype and ancestral allele for one
     * column, given the partition of its reads.
     */
    fn fill_in_predicted_genome(
        &mut self,
        partition: u64,
        column: &RpColumn,
        reference: &PhasingReference,
        params: &PhaseParams,
        profile_seqs: &[ProfileSeq],
    ) {
        let site = &reference.sites[column.site_index];
        let allele_no = site.allele_number;
        let i = column.site_index - self.ref_start;

        let mut side1 = vec![0.0; allele_no];
        let mut side2 = vec![0.0; allele_no];
        for (bit, r) in column.reads.iter().enumerate() {
            let pseq = &profile_seqs[*r];
            for a in 0..allele_no {
                let lp = pseq.site_allele_log_prob(site, a);
                if (partition >> bit) & 1 == 1 {
                    side1[a] += lp;
                } else {
                    side2[a] += lp;
                }
            }
        }

        let mut scores = vec![MathUtils::LOG_ZERO; allele_no * allele_no];
        let mut ancestor_terms = Vec::with_capacity(allele_no);
        for a1 in 0..allele_no {
            for a2 in 0..allele_no {
                let mut score =
                    site.prior_log_prob(a1) + site.prior_log_prob(a2) + side1[a1] + side2[a2];
                if params.include_ancestor_sub_prob {
                    ancestor_terms.clear();
                    for a0 in 0..allele_no {
                        ancestor_terms.push(
                            site.prior_log_prob(a0)
                                + site.substitution_log_prob(a0, a1)
                                + site.substitution_log_prob(a0, a2),
                        );
                    }
                    score += MathUtils::log_sum_exp(&ancestor_terms);
                }
                scores[a1 * allele_no + a2] = score;
            }
        }

        let total = MathUtils::log_sum_exp(&scores);
        let mut best = 0usize;
        for (idx, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = idx;
            }
        }
        let h1 = best / allele_no;
        let h2 = best % allele_no;

        // Marginal probabilities of the chosen haplotype alleles
        let h1_marginal: Vec<f64> = (0..allele_no)
            .map(|a2| scores[h1 * allele_no + a2])
            .collect();
        let h2_marginal: Vec<f64> = (0..allele_no)
            .map(|a1| scores[a1 * allele_no + h2])
            .collect();

        let mut ancestor = 0usize;
        let mut ancestor_score = MathUtils::LOG_ZERO;
        for a0 in 0..allele_no {
            let score = site.prior_log_prob(a0)
                + site.substitution_log_prob(a0, h1)
                + site.substitution_log_prob(a0, h2);
            if score > ancestor_score {
                ancestor = a0;
                ancestor_score = score;
            }
        }

        self.haplotype_string1[i] = h1;
        self.haplotype_probs1[i] = (MathUtils::log_sum_exp(&h1_marginal) - total).exp();
        self.haplotype_string2[i] = h2;
        self.haplotype_probs2[i] = (MathUtils::log_sum_exp(&h2_marginal) - total).exp();
        self.genotype_string[i] = h1 * allele_no + h2;
        self.genotype_probs[i] = (scores[best] - total).exp();
        self.ancestor_string[i] = ancestor;
    }

    /**
     * Log probability of a read's profile sequence given a haplotype allele
     * string covering [ref_start, ref_start + length).
     */
    pub fn log_prob_of_read_given_haplotype(
        haplotype_string: &[usize],
        ref_start: usize,
        length: usize,
        pseq: &ProfileSeq,
        reference: &PhasingReference,
    ) -> f64 {
        let mut total = 0.0;
        for i in 0..pseq.length {
            let site_index = pseq.ref_start + i;
            if site_index < ref_start {
                continue;
            }
            let j = site_index - ref_start;
            if j >= length {
                break;
            }
            let site = &reference.sites[site_index];
            total += pseq.site_allele_log_prob(site, haplotype_string[j]);
        }
        total
    }

    /// Reads in the given partition scoring strictly higher under the other
    /// haplotype.
    fn reads_preferring_other_haplotype(
        &self,
        own: &[ProfileSeq],
        own_haplotype: &[usize],
        other_haplotype: &[usize],
        reference: &PhasingReference,
    ) -> Vec<usize> {
        own.iter()
            .enumerate()
            .filter(|(_, pseq)| {
                let own_score = Self::log_prob_of_read_given_haplotype(
                    own_haplotype,
                    self.ref_start,
                    self.length,
                    pseq,
                    reference,
                );
                let other_score = Self::log_prob_of_read_given_haplotype(
                    other_haplotype,
                    self.ref_start,
                    self.length,
                    pseq,
                    reference,
                );
                own_score < other_score
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /**
     * Iteratively re-partition the reads: per round, move every read that
     * scores strictly higher under the other haplotype, flip the path's
     * partition bits for the moved reads, and recompute the per-site
     * predictions. Stops when a round moves nothing.
     */
    pub fn refine(
        &mut self,
        hmm: &ReadPartitioningHmm,
        path: &mut [u64],
        reference: &PhasingReference,
        params: &PhaseParams,
        max_iterations: usize,
    ) {
        let mut iteration = 0;
        while iteration < max_iterations {
            iteration += 1;

            let reads1_to_2 = self.reads_preferring_other_haplotype(
                &self.reads1,
                &self.haplotype_string1,
                &self.haplotype_string2,
                reference,
            );
            let reads2_to_1 = self.reads_preferring_other_haplotype(
                &self.reads2,
                &self.haplotype_string2,
                &self.haplotype_string1,
                reference,
            );

            debug!(
                "At iteration {} of partition refinement found {} reads moving 1 -> 2 and {} reads moving 2 -> 1",
                iteration,
                reads1_to_2.len(),
                reads2_to_1.len()
            );
            if reads1_to_2.is_empty() && reads2_to_1.is_empty() {
                break;
            }

            let mut flipping_reads: HashSet<usize> = HashSet::new();

            let mut moved1: Vec<ProfileSeq> = Vec::new();
            for idx in reads1_to_2.iter().rev() {
                let pseq = self.reads1.swap_remove(*idx);
                flipping_reads.insert(pseq.read_no);
                moved1.push(pseq);
            }
            let mut moved2: Vec<ProfileSeq> = Vec::new();
            for idx in reads2_to_1.iter().rev() {
                let pseq = self.reads2.swap_remove(*idx);
                flipping_reads.insert(pseq.read_no);
                moved2.push(pseq);
            }
            self.reads2.extend(moved1);
            self.reads1.extend(moved2);

            // Flip the moved reads in every column of the path, then refresh
            // the per-site predictions
            for (column, partition) in hmm.columns.iter().zip(path.iter_mut()) {
                for (bit, r) in column.reads.iter().enumerate() {
                    if flipping_reads.contains(&hmm.profile_seqs[*r].read_no) {
                        *partition ^= 1 << bit;
                    }
                }
            }
            for (column, partition) in hmm.columns.iter().zip(path.iter()) {
                self.fill_in_predicted_genome(
                    *partition,
                    column,
                    reference,
                    params,
                    &hmm.profile_seqs,
                );
            }
        }
    }
}
