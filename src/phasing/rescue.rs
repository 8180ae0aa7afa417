use std::collections::HashSet;

use crate::bubble::bubble_graph::{allele_read_supports, maximum_repeat_length, BubbleGraph};
use crate::bubble::read_substrings::{get_read_substrings, ReadSubstring};
use crate::model::vcf_entry::VcfEntry;
use crate::params::PhaseParams;
use crate::phasing::genome_fragment::GenomeFragment;
use crate::phasing::phasing_engine::{BubblePhasingRecord, PhasingRecord, ReadPhasingRecord};
use crate::poa::Poa;
use crate::reads::chunk_read::ChunkRead;
use crate::sequence::rle_string::RleString;
use crate::utils::math_utils::MathUtils;

/// Read classification against the two phased haplotypes: summed log odds
/// per read, accumulated across every heterozygous site.
struct HaplotypeScores {
    hap1: Vec<f64>,
    hap2: Vec<f64>,
}

impl HaplotypeScores {
    fn new(read_count: usize) -> HaplotypeScores {
        HaplotypeScores {
            hap1: vec![0.0; read_count],
            hap2: vec![0.0; read_count],
        }
    }

    /**
     * Score one heterozygous site: alleles[0] and alleles[1] are the two
     * chosen haplotype alleles; each read contributes its normalized log
     * odds to both accumulators. Returns the per-read records for
     * reporting.
     */
    fn score_site(
        &mut self,
        alleles: &[RleString],
        read_substrings: &[ReadSubstring],
        reads: &[ChunkRead],
        max_repeat_count: usize,
        params: &PhaseParams,
    ) -> Vec<ReadPhasingRecord> {
        let supports =
            allele_read_supports(alleles, read_substrings, reads, max_repeat_count, params);

        let mut records = Vec::with_capacity(read_substrings.len());
        for (k, rs) in read_substrings.iter().enumerate() {
            let support_hap1 = supports[[0, k]] as f64;
            let support_hap2 = supports[[1, k]] as f64;

            self.hap1[rs.read_no] +=
                support_hap1 - MathUtils::log_add_exact(support_hap1, support_hap2);
            self.hap2[rs.read_no] +=
                support_hap2 - MathUtils::log_add_exact(support_hap2, support_hap1);

            records.push(ReadPhasingRecord {
                name: reads[rs.read_no].read_name.clone(),
                qual: rs.qual_value,
                hap_support_h1: support_hap1,
                hap_support_h2: support_hap2,
            });
        }
        records
    }

    /**
     * Final assignment: each read goes to the haplotype with the larger
     * accumulated score, or stays unclassified on a tie.
     */
    fn classify(&self, reads: &[ChunkRead]) -> (HashSet<usize>, HashSet<usize>) {
        let mut hap1_reads = HashSet::new();
        let mut hap2_reads = HashSet::new();
        let mut unclassified = 0usize;
        let mut no_score = 0usize;

        for read_no in 0..reads.len() {
            if self.hap1[read_no] > self.hap2[read_no] {
                hap1_reads.insert(read_no);
            } else if self.hap2[read_no] > self.hap1[read_no] {
                hap2_reads.insert(read_no);
            } else {
                if self.hap1[read_no] == 0.0 {
                    no_score += 1;
                }
                unclassified += 1;
            }
        }

        let total = reads.len().max(1);
        info!(
            "Of {} reads: {} ({:.2}) were hap1, {} ({:.2}) were hap2, {} ({:.2}) were unclassified with {} having no score.",
            reads.len(),
            hap1_reads.len(),
            hap1_reads.len() as f64 / total as f64,
            hap2_reads.len(),
            hap2_reads.len() as f64 / total as f64,
            unclassified,
            unclassified as f64 / total as f64,
            no_score
        );

        (hap1_reads, hap2_reads)
    }
}

fn haplotype_alleles_for_site(
    hap1: &RleString,
    hap2: &RleString,
    ref_allele: Option<&RleString>,
    params: &PhaseParams,
) -> Vec<RleString> {
    let construct = |expanded: &[u8]| {
        if params.use_run_length_encoding {
            RleString::construct(expanded)
        } else {
            RleString::construct_no_rle(expanded)
        }
    };

    let mut alleles = vec![construct(&hap1.expand()), construct(&hap2.expand())];
    if let Some(ref_allele) = ref_allele {
        if alleles.iter().all(|a| a != ref_allele) {
            info!(
                "While partitioning filtered reads did not see ref allele {}",
                ref_allele
            );
            alleles.push(construct(&ref_allele.expand()));
        }
    }
    alleles
}

/**
 * Assign reads left out of phasing to a haplotype by re-scoring them
 * against the chosen allele pair of every heterozygous primary bubble. The
 * POA must cover the given reads; extraction is unfiltered so low quality
 * reads still get placed. When a phasing record is supplied, the scored
 * bubbles are appended to its filtered section.
 */
pub fn partition_filtered_reads_from_poa(
    poa: &Poa,
    reads: &[ChunkRead],
    fragment: &GenomeFragment,
    bg: &BubbleGraph,
    params: &PhaseParams,
    mut record: Option<&mut PhasingRecord>,
    rle_to_non_rle: &[usize],
    chunk_offset: usize,
) -> (HashSet<usize>, HashSet<usize>) {
    let mut scores = HaplotypeScores::new(reads.len());

    for i in 0..fragment.length {
        let bubble = &bg.bubbles[fragment.ref_start + i];
        let hap1_allele = fragment.haplotype_string1[i];
        let hap2_allele = fragment.haplotype_string2[i];

        // Only hets carry phasing signal
        if hap1_allele == hap2_allele {
            continue;
        }

        let read_substrings = get_read_substrings(
            reads,
            poa,
            bubble.ref_start + 1,
            bubble.ref_start + bubble.bubble_length + 1,
            params,
            false,
        );
        if read_substrings.is_empty() {
            continue;
        }

        let alleles = haplotype_alleles_for_site(
            &bubble.alleles[hap1_allele],
            &bubble.alleles[hap2_allele],
            Some(&bubble.ref_allele),
            params,
        );
        assert!(alleles.len() == 2 || alleles.len() == 3);

        let read_records = scores.score_site(
            &alleles,
            &read_substrings,
            reads,
            poa.max_repeat_count,
            params,
        );

        if let Some(record) = record.as_mut() {
            record.filtered.push(BubblePhasingRecord {
                ref_pos: chunk_offset + rle_to_non_rle[bubble.ref_start],
                rle_ref_pos: bubble.ref_start,
                strand_skew: None,
                reads: read_records,
            });
        }
    }

    scores.classify(reads)
}

/**
 * As partition_filtered_reads_from_poa, but over a VCF driven bubble graph:
 * read substrings come from the per-entry substring map built by the
 * ingestion layer, and sites are the phased genome fragment's heterozygous
 * bubbles.
 */
pub fn partition_filtered_reads_from_vcf_entries(
    vcf_entries: &[VcfEntry],
    entries_to_bubbles: &[usize],
    entry_substrings: &[Vec<ReadSubstring>],
    fragment: &GenomeFragment,
    bg: &BubbleGraph,
    reads: &[ChunkRead],
    params: &PhaseParams,
) -> (HashSet<usize>, HashSet<usize>) {
    let mut scores = HaplotypeScores::new(reads.len());
    let max_repeat_count = maximum_repeat_length(params);

    for i in 0..fragment.length {
        let bubble_index = fragment.ref_start + i;
        let bubble = &bg.bubbles[bubble_index];
        let entry_index = entries_to_bubbles[bubble_index];

        let hap1_allele = fragment.haplotype_string1[i];
        let hap2_allele = fragment.haplotype_string2[i];
        if hap1_allele == hap2_allele {
            continue;
        }

        let read_substrings = &entry_substrings[entry_index];
        if read_substrings.is_empty() {
            continue;
        }

        let alleles = haplotype_alleles_for_site(
            &bubble.alleles[hap1_allele],
            &bubble.alleles[hap2_allele],
            None,
            params,
        );
        scores.score_site(&alleles, read_substrings, reads, max_repeat_count, params);
    }

    scores.classify(reads)
}

/**
 * As partition_filtered_reads_from_vcf_entries, but with the allele pair
 * taken from the entries' phased genotypes instead of an inferred genome
 * fragment, for re-haplotagging against an existing phased VCF.
 */
pub fn partition_filtered_reads_from_phased_vcf_entries(
    vcf_entries: &[VcfEntry],
    entries_to_bubbles: &[usize],
    entry_substrings: &[Vec<ReadSubstring>],
    bg: &BubbleGraph,
    reads: &[ChunkRead],
    params: &PhaseParams,
) -> (HashSet<usize>, HashSet<usize>) {
    let mut scores = HaplotypeScores::new(reads.len());
    let max_repeat_count = maximum_repeat_length(params);

    for (bubble_index, bubble) in bg.bubbles.iter().enumerate() {
        let entry_index = entries_to_bubbles[bubble_index];
        let entry = &vcf_entries[entry_index];

        if !entry.is_het() {
            continue;
        }

        let read_substrings = &entry_substrings[entry_index];
        if read_substrings.is_empty() {
            continue;
        }

        let alleles = haplotype_alleles_for_site(
            &bubble.alleles[entry.gt1],
            &bubble.alleles[entry.gt2],
            None,
            params,
        );
        scores.score_site(&alleles, read_substrings, reads, max_repeat_count, params);
    }

    scores.classify(reads)
}
