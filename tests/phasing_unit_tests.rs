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

use std::collections::HashSet;

use skua_phase::bubble::bubble_graph::BubbleGraph;
use skua_phase::params::PhaseParams;
use skua_phase::phasing::phasing_engine::{
    bubble_phased_strand_skew, filter_reads_by_coverage_depth, phase_bubble_graph,
    primary_phasing_records, skewed_bubbles_fraction, PhasingRecord,
};
use skua_phase::phasing::profile_seq::profile_seqs_from_bubble_graph;
use skua_phase::phasing::reference::PhasingReference;
use skua_phase::phasing::rescue::partition_filtered_reads_from_poa;
use skua_phase::pair_hmm::state_machine::{compute_forward_probability, StateMachine};
use skua_phase::poa::{BaseObservation, Poa};
use skua_phase::reads::chunk_read::ChunkRead;
use skua_phase::sequence::alphabet::{Alphabet, Symbol};
use skua_phase::sequence::rle_string::RleString;

fn test_params() -> PhaseParams {
    let mut params = PhaseParams::default();
    params.use_run_length_encoding = false;
    params.use_repeat_counts_in_alignment = false;
    params.column_anchor_trim = 1;
    params.candidate_variant_weight = 0.5;
    params
}

fn make_read(name: &str, seq: &str, forward_strand: bool) -> ChunkRead {
    ChunkRead::new(
        name.to_string(),
        RleString::construct_no_rle(seq.as_bytes()),
        None,
        forward_strand,
    )
}

fn build_poa(ref_seq: &str, reads: &[ChunkRead]) -> Poa {
    let alphabet = Alphabet::default();
    let mut poa = Poa::new(RleString::construct_no_rle(ref_seq.as_bytes()), 10);
    for (read_no, read) in reads.iter().enumerate() {
        for (offset, base) in read.rle_read.bases().iter().enumerate() {
            let symbol = alphabet.char_to_symbol(*base) as usize;
            let node = &mut poa.nodes[offset + 1];
            node.base_weights[symbol] += 1.0;
            node.repeat_count_weights[1] += 1.0;
            node.observations.push(BaseObservation {
                read_no,
                offset,
                weight: 1.0,
            });
        }
    }
    poa.sort_observations();
    poa
}

fn partition_read_sets(
    fragment: &skua_phase::phasing::genome_fragment::GenomeFragment,
) -> (HashSet<usize>, HashSet<usize>) {
    (
        fragment.reads1.iter().map(|p| p.read_no).collect(),
        fragment.reads2.iter().map(|p| p.read_no).collect(),
    )
}

#[test]
fn single_snp_phasing_partitions_reads_by_allele() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let mut reads = Vec::new();
    for i in 0..7 {
        reads.push(make_read(&format!("alt_read_{}", i), alt_seq, i % 2 == 0));
    }
    for i in 0..3 {
        reads.push(make_read(&format!("ref_read_{}", i), ref_seq, i % 2 == 0));
    }
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, pseqs) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    assert_eq!(fragment.length, 1);
    assert_ne!(fragment.haplotype_string1[0], fragment.haplotype_string2[0]);
    assert_eq!(pseqs.len(), 10);

    // Every read ends up in exactly one partition
    let (reads1, reads2) = partition_read_sets(&fragment);
    assert_eq!(reads1.len() + reads2.len(), 10);
    assert!(reads1.is_disjoint(&reads2));

    // Reads sharing an allele end up on the same side
    let alt_reads: HashSet<usize> = (0..7).collect();
    let ref_reads: HashSet<usize> = (7..10).collect();
    assert!(
        (reads1 == alt_reads && reads2 == ref_reads)
            || (reads1 == ref_reads && reads2 == alt_reads)
    );

    // Haplotype probabilities are probabilities
    for i in 0..fragment.length {
        assert!(fragment.haplotype_probs1[i] >= 0.0 && fragment.haplotype_probs1[i] <= 1.0);
        assert!(fragment.haplotype_probs2[i] >= 0.0 && fragment.haplotype_probs2[i] <= 1.0);
        assert!(fragment.genotype_probs[i] >= 0.0 && fragment.genotype_probs[i] <= 1.0);
    }
}

#[test]
fn homozygous_window_phases_to_empty_fragment() {
    let ref_seq = "ACGTACGTACGTACGTACGT";
    let reads: Vec<ChunkRead> = (0..5)
        .map(|i| make_read(&format!("read_{}", i), ref_seq, i % 2 == 0))
        .collect();
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    assert_eq!(fragment.length, 0);
    assert!(fragment.reads1.is_empty());
    assert!(fragment.reads2.is_empty());
}

#[test]
fn multi_site_phasing_is_consistent_across_bubbles() {
    let ref_seq: String = "A".repeat(30);
    let mut alt = ref_seq.clone().into_bytes();
    for pos in [5, 15, 25] {
        alt[pos] = b'G';
    }
    let alt_seq = String::from_utf8(alt).unwrap();

    let mut reads = Vec::new();
    for i in 0..3 {
        reads.push(make_read(&format!("alt_read_{}", i), &alt_seq, i % 2 == 0));
    }
    for i in 0..3 {
        reads.push(make_read(&format!("ref_read_{}", i), &ref_seq, i % 2 == 0));
    }
    let poa = build_poa(&ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    assert_eq!(fragment.length, 3);
    for i in 0..3 {
        assert_ne!(fragment.haplotype_string1[i], fragment.haplotype_string2[i]);
    }

    let (reads1, reads2) = partition_read_sets(&fragment);
    let alt_reads: HashSet<usize> = (0..3).collect();
    let ref_reads: HashSet<usize> = (3..6).collect();
    assert!(
        (reads1 == alt_reads && reads2 == ref_reads)
            || (reads1 == ref_reads && reads2 == alt_reads)
    );
}

#[test]
fn coverage_filter_discards_excess_reads() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let reads: Vec<ChunkRead> = (0..20)
        .map(|i| {
            let seq = if i % 2 == 0 { alt_seq } else { ref_seq };
            make_read(&format!("read_{}", i), seq, i % 2 == 0)
        })
        .collect();
    let poa = build_poa(ref_seq, &reads);
    let mut params = test_params();
    params.max_coverage_depth = 10;

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let pseqs = profile_seqs_from_bubble_graph(&bg, &reads);

    let discarded = filter_reads_by_coverage_depth(&pseqs, &reference, &params);
    assert_eq!(discarded.len(), 10);
    let expected: HashSet<usize> = (10..20).collect();
    assert_eq!(discarded, expected);
}

#[test]
fn coverage_capped_reads_are_rescued_into_a_partition() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let reads: Vec<ChunkRead> = (0..20)
        .map(|i| {
            let seq = if i % 2 == 0 { alt_seq } else { ref_seq };
            make_read(&format!("read_{}", i), seq, i % 2 == 0)
        })
        .collect();
    let poa = build_poa(ref_seq, &reads);
    let mut params = test_params();
    params.max_coverage_depth = 10;

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    // All 20 reads are in exactly one partition, the capped ones included
    let (reads1, reads2) = partition_read_sets(&fragment);
    assert_eq!(reads1.len() + reads2.len(), 20);
    assert!(reads1.is_disjoint(&reads2));

    // Rescue follows the allele carried by the read
    let alt_reads: HashSet<usize> = (0..20).filter(|i| i % 2 == 0).collect();
    let ref_reads: HashSet<usize> = (0..20).filter(|i| i % 2 == 1).collect();
    assert!(
        (reads1 == alt_reads && reads2 == ref_reads)
            || (reads1 == ref_reads && reads2 == alt_reads)
    );
}

#[test]
fn filtered_reads_are_partitioned_against_phased_haplotypes() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let mut reads = Vec::new();
    for i in 0..7 {
        reads.push(make_read(&format!("alt_read_{}", i), alt_seq, i % 2 == 0));
    }
    for i in 0..3 {
        reads.push(make_read(&format!("ref_read_{}", i), ref_seq, i % 2 == 0));
    }
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    // A separate table of reads excluded from phasing, aligned to the same
    // window
    let filtered_reads = vec![
        make_read("filtered_alt_0", alt_seq, true),
        make_read("filtered_alt_1", alt_seq, false),
        make_read("filtered_ref_0", ref_seq, true),
        make_read("filtered_ref_1", ref_seq, false),
    ];
    let filtered_poa = build_poa(ref_seq, &filtered_reads);
    let rle_to_non_rle = poa.ref_string.rle_to_non_rle_coord_map();

    let mut record = PhasingRecord::default();
    let (hap1_reads, hap2_reads) = partition_filtered_reads_from_poa(
        &filtered_poa,
        &filtered_reads,
        &fragment,
        &bg,
        &params,
        Some(&mut record),
        &rle_to_non_rle,
        0,
    );

    assert_eq!(hap1_reads.len() + hap2_reads.len(), 4);
    assert!(hap1_reads.is_disjoint(&hap2_reads));

    // Alt-carrying filtered reads land with the alt haplotype
    let bubble = &bg.bubbles[0];
    let alt_allele = bubble
        .alleles
        .iter()
        .position(|a| a.expand() == b"AG".to_vec())
        .unwrap();
    let alt_is_hap1 = fragment.haplotype_string1[0] == alt_allele;
    let (alt_set, ref_set) = if alt_is_hap1 {
        (&hap1_reads, &hap2_reads)
    } else {
        (&hap2_reads, &hap1_reads)
    };
    let expected_alt: HashSet<usize> = [0, 1].iter().cloned().collect();
    let expected_ref: HashSet<usize> = [2, 3].iter().cloned().collect();
    assert_eq!(*alt_set, expected_alt);
    assert_eq!(*ref_set, expected_ref);

    // The scored site was appended to the filtered record
    assert_eq!(record.filtered.len(), 1);
    assert_eq!(record.filtered[0].reads.len(), 4);
    assert_eq!(record.filtered[0].rle_ref_pos, bubble.ref_start);
}

#[test]
fn strand_confounded_bubble_is_flagged_as_skewed() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let mut reads = Vec::new();
    for i in 0..4 {
        reads.push(make_read(&format!("alt_read_{}", i), alt_seq, true));
    }
    for i in 0..4 {
        reads.push(make_read(&format!("ref_read_{}", i), ref_seq, false));
    }
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    let p_value = bubble_phased_strand_skew(&bg.bubbles[0], &reads, &fragment);
    assert!(p_value < 0.05);
    assert_relative_eq!(skewed_bubbles_fraction(&bg, &reads, &fragment), 1.0);
}

#[test]
fn balanced_strands_are_not_flagged_as_skewed() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let mut reads = Vec::new();
    for i in 0..6 {
        reads.push(make_read(&format!("alt_read_{}", i), alt_seq, i % 2 == 0));
    }
    for i in 0..6 {
        reads.push(make_read(&format!("ref_read_{}", i), ref_seq, i % 2 == 0));
    }
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    let p_value = bubble_phased_strand_skew(&bg.bubbles[0], &reads, &fragment);
    assert!(p_value > 0.05);
}

#[test]
fn phasing_record_serializes_with_expected_keys() {
    let ref_seq = "AAAAAAAAAAAAAAAAAAAA";
    let alt_seq = "AAAAAAAAAAGAAAAAAAAA";
    let mut reads = Vec::new();
    for i in 0..4 {
        reads.push(make_read(&format!("alt_read_{}", i), alt_seq, i % 2 == 0));
    }
    for i in 0..4 {
        reads.push(make_read(&format!("ref_read_{}", i), ref_seq, i % 2 == 0));
    }
    let poa = build_poa(ref_seq, &reads);
    let params = test_params();

    let bg = BubbleGraph::from_poa_for_phasing(&poa, &reads, &params);
    let reference = PhasingReference::from_bubble_graph(&bg, "test_window", &params);
    let (fragment, _) = phase_bubble_graph(&bg, &reference, &reads, &params).unwrap();

    let rle_to_non_rle = poa.ref_string.rle_to_non_rle_coord_map();
    let mut record = PhasingRecord::default();
    record.primary = primary_phasing_records(&bg, &fragment, &reads, &rle_to_non_rle, 1000);

    let value = serde_json::to_value(&record).unwrap();
    assert!(value.get("primary").is_some());
    assert!(value.get("filtered").is_some());

    let primary = value["primary"].as_array().unwrap();
    assert_eq!(primary.len(), 1);
    let site = &primary[0];
    assert_eq!(site["rleRefPos"].as_u64().unwrap(), 9);
    assert_eq!(site["refPos"].as_u64().unwrap(), 1009);
    assert!(site.get("strandSkew").is_some());

    let site_reads = site["reads"].as_array().unwrap();
    assert_eq!(site_reads.len(), 8);
    for read in site_reads {
        assert!(read.get("name").is_some());
        assert!(read.get("qual").is_some());
        assert!(read.get("hapSupportH1").is_some());
        assert!(read.get("hapSupportH2").is_some());
    }
}

#[test]
fn forward_probability_prefers_the_matching_sequence() {
    let params = test_params();
    let sm = StateMachine::for_forward_strand_read(&params);
    let alphabet = Alphabet::default();

    let to_symbols = |seq: &[u8]| -> Vec<Symbol> {
        seq.iter()
            .map(|b| Symbol {
                base: alphabet.char_to_symbol(*b),
                repeat_count: 1,
            })
            .collect()
    };

    let read = to_symbols(b"ACGT");
    let matching = to_symbols(b"ACGT");
    let mismatching = to_symbols(b"ACCT");

    let anchor_pairs = Vec::new();
    let match_prob = compute_forward_probability(&matching, &read, &anchor_pairs, &sm);
    let mismatch_prob = compute_forward_probability(&mismatching, &read, &anchor_pairs, &sm);

    assert!(match_prob > mismatch_prob);
    assert!(match_prob < 0.0);

    // Empty against empty is the unit alignment
    let empty: Vec<Symbol> = Vec::new();
    assert_relative_eq!(compute_forward_probability(&empty, &empty, &anchor_pairs, &sm), 0.0);
}
