use std::collections::HashSet;

use hashlink::LinkedHashMap;

use crate::bubble::bubble_graph::{Bubble, BubbleGraph};
use crate::params::PhaseParams;
use crate::phasing::genome_fragment::GenomeFragment;
use crate::phasing::profile_seq::{profile_seqs_from_bubble_graph, ProfileSeq};
use crate::phasing::reference::PhasingReference;
use crate::phasing::rp_hmm;
use crate::reads::chunk_read::ChunkRead;
use crate::utils::errors::SkuaError;
use crate::utils::math_utils::MathUtils;

/**
 * Per-read support entry of the phasing record emitted alongside phased
 * output.
 */
#[derive(Debug, Clone, Serialize)]
pub struct ReadPhasingRecord {
    pub name: String,
    pub qual: f64,
    #[serde(rename = "hapSupportH1")]
    pub hap_support_h1: f64,
    #[serde(rename = "hapSupportH2")]
    pub hap_support_h2: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BubblePhasingRecord {
    #[serde(rename = "refPos")]
    pub ref_pos: usize,
    #[serde(rename = "rleRefPos")]
    pub rle_ref_pos: usize,
    #[serde(rename = "strandSkew", skip_serializing_if = "Option::is_none")]
    pub strand_skew: Option<f64>,
    pub reads: Vec<ReadPhasingRecord>,
}

/// The JSON document describing per-bubble phasing evidence, for both the
/// primary (phased) bubbles and the bubbles used to place filtered reads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhasingRecord {
    pub primary: Vec<BubblePhasingRecord>,
    pub filtered: Vec<BubblePhasingRecord>,
}

/**
 * Greedily limit the per-site read depth: profile sequences are considered
 * longest span first and a sequence is discarded when any site it covers is
 * already at max_coverage_depth. Returns the discarded read indices.
 */
pub fn filter_reads_by_coverage_depth(
    profile_seqs: &LinkedHashMap<usize, ProfileSeq>,
    reference: &PhasingReference,
    params: &PhaseParams,
) -> HashSet<usize> {
    let mut ordered: Vec<&ProfileSeq> = profile_seqs.values().collect();
    ordered.sort_by_key(|p| (std::cmp::Reverse(p.length), p.read_no));

    let mut depths = vec![0usize; reference.len()];
    let mut discarded = HashSet::new();

    for pseq in ordered {
        let over_capacity = (pseq.ref_start..pseq.ref_end())
            .any(|site| depths[site] >= params.max_coverage_depth);
        if over_capacity {
            discarded.insert(pseq.read_no);
        } else {
            for site in pseq.ref_start..pseq.ref_end() {
                depths[site] += 1;
            }
        }
    }

    discarded
}

/**
 * Run the phasing algorithm over a bubble graph, splitting the embedded
 * reads into two haplotype partitions.
 *
 * The forward and reverse strand reads are phased as separate HMM tiling
 * paths which are then merged and fused into a single HMM, so that strand
 * correlated signal cannot seed the partition. Ancestor substitution
 * probabilities are disabled while the per-strand paths are built and
 * re-enabled for the fused forward-backward pass. Reads dropped by the
 * coverage-depth filter are added back afterwards to whichever inferred
 * haplotype explains them better.
 *
 * Returns the genome fragment plus the full read index -> profile sequence
 * map for downstream reporting.
 */
pub fn phase_bubble_graph(
    bg: &BubbleGraph,
    reference: &PhasingReference,
    reads: &[ChunkRead],
    params: &PhaseParams,
) -> Result<(GenomeFragment, LinkedHashMap<usize, ProfileSeq>), SkuaError> {
    params.validate()?;
    assert_eq!(reference.len(), bg.bubble_no());

    let reads_to_pseqs = profile_seqs_from_bubble_graph(bg, reads);
    if reads.len() != reads_to_pseqs.len() {
        info!(
            "In converting from reads to profile sequences have {} reads and {} profile sequences",
            reads.len(),
            reads_to_pseqs.len()
        );
    }

    // Deal with the case that the alignment is empty
    if reads_to_pseqs.is_empty() {
        return Ok((
            GenomeFragment::construct_empty(&reference.reference_name),
            reads_to_pseqs,
        ));
    }

    info!("Filtering reads by coverage depth");
    let discarded_reads = filter_reads_by_coverage_depth(&reads_to_pseqs, reference, params);

    // Partition the surviving reads by strand
    let mut forward_strand_pseqs = Vec::new();
    let mut reverse_strand_pseqs = Vec::new();
    for (read_no, pseq) in reads_to_pseqs.iter() {
        if discarded_reads.contains(read_no) {
            continue;
        }
        if pseq.forward_strand {
            forward_strand_pseqs.push(pseq.clone());
        } else {
            reverse_strand_pseqs.push(pseq.clone());
        }
    }
    info!(
        "Got {} forward strand reads for phasing and {} reverse strand reads for phasing",
        forward_strand_pseqs.len(),
        reverse_strand_pseqs.len()
    );

    // Build the per-strand tiling paths with ancestor substitution
    // probabilities switched off
    let mut construction_params = params.clone();
    construction_params.include_ancestor_sub_prob = false;

    info!("Phasing forward strand reads");
    let tiling_path_forward =
        rp_hmm::rp_hmms(forward_strand_pseqs, reference, &construction_params)?;
    info!("Phasing reverse strand reads");
    let tiling_path_reverse =
        rp_hmm::rp_hmms(reverse_strand_pseqs, reference, &construction_params)?;

    info!("Joining forward and reverse strand phasing");
    let merged = rp_hmm::merge_two_tiling_paths(
        tiling_path_forward,
        tiling_path_reverse,
        reference,
        &construction_params,
    );
    let mut hmm = match rp_hmm::fuse_tiling_path(merged, reference, &construction_params) {
        Some(hmm) => hmm,
        None => {
            // Every read was removed by the coverage filter; there is no
            // fragment to phase against, so nothing gets rescued either
            return Ok((
                GenomeFragment::construct_empty(&reference.reference_name),
                reads_to_pseqs,
            ));
        }
    };

    // The fused pass uses the configured ancestor substitution setting
    rp_hmm::forward_backward(&mut hmm, reference, params);
    info!(
        "Forward probability of the hmm: {:.4}, backward prob: {:.4}",
        hmm.forward_log_prob, hmm.backward_log_prob
    );

    let mut path = rp_hmm::forward_trace_back(&hmm, params);

    assert!(hmm.ref_start + hmm.ref_length <= bg.bubble_no());
    let mut fragment = GenomeFragment::construct(&hmm, &path, reference, params);
    fragment.refine(
        &hmm,
        &mut path,
        reference,
        params,
        params.rounds_of_iterative_refinement,
    );
    assert_eq!(fragment.length, hmm.ref_length);

    // For reads that exceeded the coverage depth, add them back to the
    // haplotype they fit best
    for read_no in &discarded_reads {
        let pseq = &reads_to_pseqs[read_no];
        let i = GenomeFragment::log_prob_of_read_given_haplotype(
            &fragment.haplotype_string1,
            fragment.ref_start,
            fragment.length,
            pseq,
            reference,
        );
        let j = GenomeFragment::log_prob_of_read_given_haplotype(
            &fragment.haplotype_string2,
            fragment.ref_start,
            fragment.length,
            pseq,
            reference,
        );
        if i < j {
            fragment.reads2.push(pseq.clone());
        } else {
            fragment.reads1.push(pseq.clone());
        }
    }

    debug_assert_eq!(
        fragment.reads1.len() + fragment.reads2.len(),
        reads_to_pseqs.len()
    );

    Ok((fragment, reads_to_pseqs))
}

/**
 * Binomial p-value for the correlation between a bubble's read partition
 * and read orientation: counts a positive for each partition-1 forward
 * strand read and each partition-2 reverse strand read.
 */
pub fn bubble_phased_strand_skew(
    bubble: &Bubble,
    reads: &[ChunkRead],
    fragment: &GenomeFragment,
) -> f64 {
    let reads1: HashSet<usize> = fragment.reads1.iter().map(|p| p.read_no).collect();
    let reads2: HashSet<usize> = fragment.reads2.iter().map(|p| p.read_no).collect();

    let mut total = 0u64;
    let mut positives = 0u64;
    for rs in &bubble.reads {
        if reads1.contains(&rs.read_no) {
            total += 1;
            if reads[rs.read_no].forward_strand {
                positives += 1;
            }
        } else if reads2.contains(&rs.read_no) {
            total += 1;
            if !reads[rs.read_no].forward_strand {
                positives += 1;
            }
        }
    }
    MathUtils::binomial_p_value(total, positives)
}

/// Fraction of bubbles whose partition-vs-strand skew p-value is below 0.05.
pub fn skewed_bubbles_fraction(
    bg: &BubbleGraph,
    reads: &[ChunkRead],
    fragment: &GenomeFragment,
) -> f64 {
    if bg.bubble_no() == 0 {
        return 0.0;
    }
    let skewed = bg
        .bubbles
        .iter()
        .filter(|b| bubble_phased_strand_skew(b, reads, fragment) < 0.05)
        .count();
    skewed as f64 / bg.bubble_no() as f64
}

/**
 * The per-bubble phasing evidence for heterozygous primary bubbles:
 * reference positions (raw, via the RLE coordinate map and chunk offset),
 * the strand skew p-value, and every read's support for the two chosen
 * haplotype alleles.
 */
pub fn primary_phasing_records(
    bg: &BubbleGraph,
    fragment: &GenomeFragment,
    reads: &[ChunkRead],
    rle_to_non_rle: &[usize],
    chunk_offset: usize,
) -> Vec<BubblePhasingRecord> {
    let mut records = Vec::new();
    for i in 0..fragment.length {
        let bubble = &bg.bubbles[fragment.ref_start + i];
        let hap1_allele = fragment.haplotype_string1[i];
        let hap2_allele = fragment.haplotype_string2[i];

        // Only heterozygous sites are informative
        if hap1_allele == hap2_allele {
            continue;
        }

        let read_records = bubble
            .reads
            .iter()
            .enumerate()
            .map(|(j, rs)| ReadPhasingRecord {
                name: reads[rs.read_no].read_name.clone(),
                qual: rs.qual_value,
                hap_support_h1: bubble.allele_read_supports[[hap1_allele, j]] as f64,
                hap_support_h2: bubble.allele_read_supports[[hap2_allele, j]] as f64,
            })
            .collect();

        records.push(BubblePhasingRecord {
            ref_pos: chunk_offset + rle_to_non_rle[bubble.ref_start],
            rle_ref_pos: bubble.ref_start,
            strand_skew: Some(bubble_phased_strand_skew(bubble, reads, fragment)),
            reads: read_records,
        });
    }
    records
}
