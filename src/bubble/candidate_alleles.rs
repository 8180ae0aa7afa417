use hashlink::LinkedHashMap;

use crate::bubble::read_substrings::ReadSubstring;
use crate::poa::Poa;
use crate::reads::chunk_read::ChunkRead;
use crate::sequence::rle_string::RleString;

/**
 * All combinations of candidate variants (substitutions x repeat count
 * changes x inserts x deletes) over the POA node interval [from, to), each
 * as an expanded consensus substring. The unedited reference string is
 * always among the results.
 *
 * Returns None as soon as a recursion level exceeds max_strings, signalling
 * the caller to retry with a larger weight adjustment.
 */
pub fn candidate_consensus_substrings(
    poa: &Poa,
    from: usize,
    to: usize,
    candidate_weights: &[f64],
    weight_adjustment: f64,
    max_strings: usize,
) -> Option<Vec<Vec<u8>>> {
    // Suffixes first
    let suffixes = if from + 1 < to {
        candidate_consensus_substrings(poa, from + 1, to, candidate_weights, weight_adjustment, max_strings)?
    } else {
        vec![Vec::new()]
    };

    let node = &poa.nodes[from];
    let candidate_weight = candidate_weights[from] * weight_adjustment;

    let mut consensus_substrings: Vec<Vec<u8>> = Vec::new();

    for base in node.candidate_bases(&poa.alphabet, candidate_weight) {
        for repeat_count in node.candidate_repeat_counts(candidate_weight) {
            let bases = vec![base; repeat_count];

            // No-edit extension of every suffix
            for suffix in &suffixes {
                let mut s = bases.clone();
                s.extend_from_slice(suffix);
                consensus_substrings.push(s);
            }

            // Insert extensions
            for insert in node.candidate_inserts(candidate_weight) {
                let expanded_insert = insert.insert.expand();
                for suffix in &suffixes {
                    let mut s = bases.clone();
                    s.extend_from_slice(&expanded_insert);
                    s.extend_from_slice(suffix);
                    consensus_substrings.push(s);
                }
            }

            // Delete extensions, deduplicated by membership
            for delete in node.candidate_deletes(candidate_weight) {
                for suffix in &suffixes {
                    let mut s = bases.clone();
                    if suffix.len() >= delete.length {
                        s.extend_from_slice(&suffix[delete.length..]);
                    }
                    if !consensus_substrings.contains(&s) {
                        consensus_substrings.push(s);
                    }
                }
            }
        }
    }

    if consensus_substrings.len() > max_strings {
        // Too many combinations
        return None;
    }

    Some(consensus_substrings)
}

/**
 * Consensus RleString for a group of RleStrings sharing the same compressed
 * base string: element-wise mean repeat counts, rounded and clamped to
 * [1, 255].
 */
fn consensus_rle_string(group: &[RleString]) -> RleString {
    let r = group.last().unwrap();
    let mut repeat_counts = Vec::with_capacity(r.len());
    for j in 0..r.len() {
        let total: u64 = group.iter().map(|s| s.repeat_counts()[j] as u64).sum();
        let mean = (total as f32 / group.len() as f32).round() as u64;
        repeat_counts.push(mean.clamp(1, 255) as u8);
    }
    RleString::from_parts(r.bases().to_vec(), repeat_counts)
}

/**
 * Candidate alleles taken directly from the read substrings: group the
 * substrings by RLE string (keyed on both the compressed bases and the
 * repeat counts), then expand the consensus of each group.
 */
pub fn candidate_alleles_from_read_substrings(
    read_substrings: &[ReadSubstring],
    reads: &[ChunkRead],
) -> Vec<Vec<u8>> {
    let mut groups: LinkedHashMap<RleString, Vec<RleString>> = LinkedHashMap::new();
    for rs in read_substrings {
        let rle = rs.rle_string(reads);
        groups.entry(rle.clone()).or_insert_with(Vec::new).push(rle);
    }

    groups
        .values()
        .map(|group| consensus_rle_string(group).expand())
        .collect()
}
