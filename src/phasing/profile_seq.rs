use hashlink::LinkedHashMap;

use crate::bubble::bubble_graph::BubbleGraph;
use crate::phasing::reference::Site;
use crate::reads::chunk_read::ChunkRead;
use crate::utils::math_utils::MathUtils;

/// Scale between natural-log probabilities and quantized profile bytes.
pub const PROFILE_PROB_SCALAR: f64 = 30.0;

/**
 * A read reduced to its quantized per-bubble allele weights: for every
 * bubble the read spans, one byte per allele holding the scaled negative
 * log probability of the read given that allele, normalized by the
 * log-sum over the bubble's alleles. Byte 0 therefore marks the best
 * supported allele (up to normalization mass shared between close alleles),
 * 255 the floor.
 */
#[derive(Debug, Clone)]
pub struct ProfileSeq {
    pub read_no: usize,
    pub read_name: String,
    pub forward_strand: bool,
    /// First bubble index the read is aligned to.
    pub ref_start: usize,
    /// Number of bubbles spanned.
    pub length: usize,
    /// Global allele index of the first spanned bubble's first allele.
    pub allele_offset: usize,
    pub profile_probs: Vec<u8>,
}

impl ProfileSeq {
    pub fn ref_end(&self) -> usize {
        self.ref_start + self.length
    }

    pub fn spans_site(&self, site_index: usize) -> bool {
        site_index >= self.ref_start && site_index < self.ref_end()
    }

    /// Natural log probability of this read given the site's allele.
    pub fn site_allele_log_prob(&self, site: &Site, allele: usize) -> f64 {
        let index = site.allele_offset + allele - self.allele_offset;
        -(self.profile_probs[index] as f64) / PROFILE_PROB_SCALAR
    }
}

/**
 * Convert every read attached to the bubble graph into a profile sequence,
 * keyed by read index. A read's span runs from the first to the last
 * bubble it has an aligned substring in; bubbles inside the span the read
 * has no substring for keep their zero bytes.
 */
pub fn profile_seqs_from_bubble_graph(
    bg: &BubbleGraph,
    reads: &[ChunkRead],
) -> LinkedHashMap<usize, ProfileSeq> {
    // The last bubble each read is observed to be part of
    let mut read_ends: LinkedHashMap<usize, usize> = LinkedHashMap::new();
    for (i, bubble) in bg.bubbles.iter().enumerate() {
        for rs in &bubble.reads {
            *read_ends.entry(rs.read_no).or_insert(i) = i;
        }
    }

    let mut reads_to_pseqs: LinkedHashMap<usize, ProfileSeq> = LinkedHashMap::new();

    for (i, bubble) in bg.bubbles.iter().enumerate() {
        for (j, rs) in bubble.reads.iter().enumerate() {
            if !reads_to_pseqs.contains_key(&rs.read_no) {
                let end = read_ends[&rs.read_no];
                assert!(i <= end);
                let length = end - i + 1;
                let total_alleles: usize = bg.bubbles[i..=end].iter().map(|b| b.allele_no()).sum();
                reads_to_pseqs.insert(
                    rs.read_no,
                    ProfileSeq {
                        read_no: rs.read_no,
                        read_name: reads[rs.read_no].read_name.clone(),
                        forward_strand: reads[rs.read_no].forward_strand,
                        ref_start: i,
                        length,
                        allele_offset: bubble.allele_offset,
                        profile_probs: vec![0; total_alleles],
                    },
                );
            }
            let pseq = reads_to_pseqs.get_mut(&rs.read_no).unwrap();
            assert!(bubble.allele_offset >= pseq.allele_offset);
            assert!(i < pseq.ref_start + pseq.length);

            // Total log probability of the read over the bubble's alleles,
            // the normalizing constant for the strip
            let supports: Vec<f64> = (0..bubble.allele_no())
                .map(|k| bubble.allele_read_supports[[k, j]] as f64)
                .collect();
            let total_log_prob = MathUtils::log_sum_exp(&supports);

            let allele_offset = bubble.allele_offset - pseq.allele_offset;
            for (k, log_prob) in supports.iter().enumerate() {
                let l = (PROFILE_PROB_SCALAR * (total_log_prob - log_prob)).round();
                pseq.profile_probs[allele_offset + k] = l.clamp(0.0, 255.0) as u8;
            }
        }
    }

    reads_to_pseqs
}
