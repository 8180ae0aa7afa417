use std::collections::HashMap;

use ndarray::Array2;

use crate::bubble::anchors;
use crate::bubble::candidate_alleles;
use crate::bubble::read_substrings::{get_read_substrings, ReadSubstring};
use crate::model::vcf_entry::VcfEntry;
use crate::pair_hmm::state_machine::{compute_forward_probability, StateMachine};
use crate::params::PhaseParams;
use crate::poa::Poa;
use crate::reads::chunk_read::ChunkRead;
use crate::sequence::alphabet::{symbol_string_from_rle, Alphabet};
use crate::sequence::rle_string::RleString;

/**
 * A variant site along the reference window: the candidate alleles over the
 * spanned interval, the reads aligned across it, and the dense matrix of
 * per-allele per-read alignment log likelihoods.
 */
#[derive(Debug, Clone)]
pub struct Bubble {
    /// 0-based RLE reference offset where the bubble begins.
    pub ref_start: usize,
    /// Reference length of the bubble in RLE units.
    pub bubble_length: usize,
    pub ref_allele: RleString,
    pub alleles: Vec<RleString>,
    pub reads: Vec<ReadSubstring>,
    /// Log likelihoods, row-major by allele: [allele_no x read_no].
    pub allele_read_supports: Array2<f32>,
    /// Prefix sum of preceding bubbles' allele counts.
    pub allele_offset: usize,
    /// Candidate variant columns within the bubble, relative to ref_start.
    pub variant_position_offsets: Vec<usize>,
}

impl Bubble {
    pub fn allele_no(&self) -> usize {
        self.alleles.len()
    }

    pub fn read_no(&self) -> usize {
        self.reads.len()
    }

    pub fn reference_allele_index(&self) -> Option<usize> {
        self.alleles.iter().position(|a| *a == self.ref_allele)
    }

    /// Summed read support for the given allele.
    pub fn log_likelihood_of_allele(&self, allele: usize) -> f64 {
        (0..self.read_no())
            .map(|i| self.allele_read_supports[[allele, i]] as f64)
            .sum()
    }

    pub fn highest_likelihood_allele(&self) -> usize {
        let mut max_allele = 0;
        let mut max_likelihood = self.log_likelihood_of_allele(0);
        for i in 1..self.allele_no() {
            let likelihood = self.log_likelihood_of_allele(i);
            if likelihood > max_likelihood {
                max_allele = i;
                max_likelihood = likelihood;
            }
        }
        max_allele
    }

    /**
     * Per-allele strand skew: the difference between mean forward and mean
     * reverse strand support, normalized by the overall mean support.
     */
    pub fn strand_skews(&self, reads: &[ChunkRead]) -> Vec<f64> {
        let allele_no = self.allele_no();
        let mut forward_supports = vec![0.0; allele_no];
        let mut reverse_supports = vec![0.0; allele_no];
        let mut total_forward = 0usize;
        let mut total_reverse = 0usize;

        for (i, rs) in self.reads.iter().enumerate() {
            let supports = if reads[rs.read_no].forward_strand {
                total_forward += 1;
                &mut forward_supports
            } else {
                total_reverse += 1;
                &mut reverse_supports
            };
            for (j, s) in supports.iter_mut().enumerate() {
                *s += self.allele_read_supports[[j, i]] as f64;
            }
        }

        (0..allele_no)
            .map(|j| {
                (forward_supports[j] / total_forward.max(1) as f64
                    - reverse_supports[j] / total_reverse.max(1) as f64)
                    / ((forward_supports[j] + reverse_supports[j]).abs()
                        / (total_forward + total_reverse).max(1) as f64)
            })
            .collect()
    }
}

/**
 * The linear sequence of bubbles over a reference window, in strictly
 * ascending ref_start order with non-overlapping spans. The reference
 * string is borrowed from the POA; graphs built from VCF entry substrings
 * alone carry no reference view.
 */
#[derive(Debug)]
pub struct BubbleGraph<'a> {
    pub ref_string: Option<&'a RleString>,
    pub bubbles: Vec<Bubble>,
    pub total_alleles: usize,
}

/// Exclusive upper bound on repeat counts fed to pair-HMM symbols.
pub fn maximum_repeat_length(params: &PhaseParams) -> usize {
    if params.use_run_length_encoding {
        params.max_repeat_count
    } else {
        2
    }
}

/**
 * Dense [allele_no x read_no] forward log probabilities of each read
 * substring against each allele. Scores are memoized per distinct read
 * substring (keyed structurally on RLE bases plus repeat counts) so
 * duplicate substrings reuse the whole allele column; the cache lives only
 * for this call.
 */
pub fn allele_read_supports(
    alleles: &[RleString],
    read_substrings: &[ReadSubstring],
    reads: &[ChunkRead],
    max_repeat_count: usize,
    params: &PhaseParams,
) -> Array2<f32> {
    let alphabet = Alphabet::default();
    let allele_no = alleles.len();
    let read_no = read_substrings.len();
    let mut supports = Array2::<f32>::zeros((allele_no, read_no));

    let allele_symbol_strings: Vec<_> = alleles
        .iter()
        .map(|a| {
            symbol_string_from_rle(
                a,
                &alphabet,
                params.use_repeat_counts_in_alignment,
                max_repeat_count,
            )
        })
        .collect();

    let forward_sm = StateMachine::for_forward_strand_read(params);
    let reverse_sm = StateMachine::for_reverse_strand_read(params);
    let anchor_pairs: Vec<(usize, usize)> = Vec::new();

    let mut cached_scores: HashMap<RleString, usize> = HashMap::new();

    for (k, rs) in read_substrings.iter().enumerate() {
        let read_substring = rs.rle_string(reads);

        if let Some(&index) = cached_scores.get(&read_substring) {
            for j in 0..allele_no {
                supports[[j, k]] = supports[[j, index]];
            }
            continue;
        }

        let read_symbols = symbol_string_from_rle(
            &read_substring,
            &alphabet,
            params.use_repeat_counts_in_alignment,
            max_repeat_count,
        );
        let sm = if reads[rs.read_no].forward_strand {
            &forward_sm
        } else {
            &reverse_sm
        };

        cached_scores.insert(read_substring, k);
        for (j, allele_symbols) in allele_symbol_strings.iter().enumerate() {
            supports[[j, k]] =
                compute_forward_probability(allele_symbols, &read_symbols, &anchor_pairs, sm) as f32;
        }
    }

    supports
}

impl<'a> BubbleGraph<'a> {
    pub fn from_poa(poa: &'a Poa, reads: &[ChunkRead], params: &PhaseParams) -> BubbleGraph<'a> {
        Self::from_poa_and_vcf(poa, reads, None, params, false)
    }

    pub fn from_poa_for_phasing(
        poa: &'a Poa,
        reads: &[ChunkRead],
        params: &PhaseParams,
    ) -> BubbleGraph<'a> {
        Self::from_poa_and_vcf(poa, reads, None, params, true)
    }

    /**
     * Walk the anchor mask of the POA and build a bubble for every
     * non-trivial inter-anchor interval with read support and more than one
     * allele. When vcf_entries is given the variant mask is replaced by the
     * VCF positions before anchors are derived.
     *
     * Node observations must be sorted (Poa::sort_observations) beforehand.
     */
    pub fn from_poa_and_vcf(
        poa: &'a Poa,
        reads: &[ChunkRead],
        vcf_entries: Option<&[VcfEntry]>,
        params: &PhaseParams,
        phasing: bool,
    ) -> BubbleGraph<'a> {
        let candidate_weights = anchors::candidate_weights(poa, params);

        debug!(
            "Got avg. coverage: {:.2} for region of length {} and avg. candidate weight of {:.2}",
            poa.avg_coverage(0, poa.nodes.len()),
            poa.nodes.len(),
            candidate_weights.iter().sum::<f64>() / poa.nodes.len().max(1) as f64
        );

        let (anchor_mask, candidate_positions) =
            anchors::anchor_positions(poa, &candidate_weights, vcf_entries, params);

        let mut bubbles = Vec::new();
        let mut p_anchor = 0usize;

        for i in 1..poa.nodes.len() {
            if !anchor_mask[i] {
                continue;
            }
            if i - p_anchor != 1 {
                // A potential bubble between the anchors
                let from = p_anchor + 1;
                let to = i;
                let read_subs = get_read_substrings(reads, poa, from, to, params, true);

                if !read_subs.is_empty() {
                    let use_read_alleles = if phasing {
                        params.use_read_alleles_in_phasing
                    } else {
                        params.use_read_alleles
                    };

                    let mut alleles = if use_read_alleles {
                        candidate_alleles::candidate_alleles_from_read_substrings(&read_subs, reads)
                    } else {
                        // Progressively demand higher weight candidates until
                        // the combination count fits
                        let mut weight_adjustment = 1.0;
                        loop {
                            match candidate_alleles::candidate_consensus_substrings(
                                poa,
                                from,
                                to,
                                &candidate_weights,
                                weight_adjustment,
                                params.max_consensus_strings,
                            ) {
                                Some(alleles) => break alleles,
                                None => weight_adjustment *= 1.5,
                            }
                        }
                    };

                    let ref_start = p_anchor;
                    let bubble_length = i - 1 - p_anchor;
                    let ref_allele = poa.ref_string.copy_substring(ref_start, bubble_length);
                    let expanded_ref = ref_allele.expand();

                    if !alleles.iter().any(|a| *a == expanded_ref) {
                        alleles.push(expanded_ref);
                    }

                    // Trivial intervals with a single allele are pure anchors
                    if alleles.len() > 1 {
                        let rle_alleles: Vec<RleString> = alleles
                            .iter()
                            .map(|a| {
                                if params.use_run_length_encoding {
                                    RleString::construct(a)
                                } else {
                                    RleString::construct_no_rle(a)
                                }
                            })
                            .collect();

                        let supports = allele_read_supports(
                            &rle_alleles,
                            &read_subs,
                            reads,
                            poa.max_repeat_count,
                            params,
                        );

                        let variant_position_offsets = (0..bubble_length)
                            .filter(|vp| candidate_positions[ref_start + 1 + vp])
                            .collect();

                        bubbles.push(Bubble {
                            ref_start,
                            bubble_length,
                            ref_allele,
                            alleles: rle_alleles,
                            reads: read_subs,
                            allele_read_supports: supports,
                            allele_offset: 0,
                            variant_position_offsets,
                        });
                    }
                }
            }
            p_anchor = i;
        }

        Self::finish(Some(&poa.ref_string), bubbles)
    }

    /**
     * Build a bubble graph whose sites and alleles come straight from VCF
     * entries, with read substrings supplied per entry by the ingestion
     * layer. Entries with no reads are skipped. Returns the graph plus the
     * index of the entry behind each bubble.
     */
    pub fn from_vcf_entries(
        vcf_entries: &[VcfEntry],
        mut entry_substrings: Vec<Vec<ReadSubstring>>,
        reads: &[ChunkRead],
        params: &PhaseParams,
    ) -> (BubbleGraph<'a>, Vec<usize>) {
        assert_eq!(vcf_entries.len(), entry_substrings.len());
        let max_repeat = maximum_repeat_length(params);

        let mut bubbles = Vec::new();
        let mut entries_to_bubbles = Vec::new();
        let mut entries_without_substrings = 0usize;

        for (v, entry) in vcf_entries.iter().enumerate() {
            assert!(entry.allele_substrings.len() >= 2);
            let read_subs = std::mem::take(&mut entry_substrings[v]);

            // Nothing to phase with
            if read_subs.is_empty() {
                entries_without_substrings += 1;
                continue;
            }

            let rle_alleles: Vec<RleString> = entry
                .allele_substrings
                .iter()
                .map(|a| {
                    if params.use_run_length_encoding {
                        RleString::construct(a)
                    } else {
                        RleString::construct_no_rle(a)
                    }
                })
                .collect();
            let ref_allele = rle_alleles[0].clone();

            let supports = allele_read_supports(&rle_alleles, &read_subs, reads, max_repeat, params);

            bubbles.push(Bubble {
                ref_start: entry.ref_aln_start,
                bubble_length: entry.ref_aln_stop_incl - entry.ref_aln_start,
                ref_allele,
                alleles: rle_alleles,
                reads: read_subs,
                allele_read_supports: supports,
                allele_offset: 0,
                variant_position_offsets: vec![entry.ref_pos],
            });
            entries_to_bubbles.push(v);
        }

        if entries_without_substrings > 0 {
            info!(
                "Skipped {} VCF entries with no aligned read substrings",
                entries_without_substrings
            );
        }

        (Self::finish(None, bubbles), entries_to_bubbles)
    }

    fn finish(ref_string: Option<&'a RleString>, mut bubbles: Vec<Bubble>) -> BubbleGraph<'a> {
        let mut allele_offset = 0;
        for bubble in bubbles.iter_mut() {
            bubble.allele_offset = allele_offset;
            allele_offset += bubble.allele_no();
        }
        BubbleGraph {
            ref_string,
            bubbles,
            total_alleles: allele_offset,
        }
    }

    pub fn bubble_no(&self) -> usize {
        self.bubbles.len()
    }

    /// The highest-likelihood allele of every bubble, for consensus calling.
    pub fn consensus_path(&self) -> Vec<usize> {
        self.bubbles
            .iter()
            .map(|b| b.highest_likelihood_allele())
            .collect()
    }
}
