use crate::bubble::bubble_graph::BubbleGraph;
use crate::params::PhaseParams;
use crate::sequence::rle_string::RleString;
use crate::utils::errors::SkuaError;

/**
 * Stitch a consensus sequence from a chosen allele per bubble and the
 * reference substrings between bubbles, tracking the alignment between the
 * old reference and the new consensus.
 *
 * The returned map gives, for each RLE reference position, the RLE
 * consensus position it maps to, or -1 where no confident mapping exists
 * (inside bubbles whose chosen allele differs from the reference). With run
 * length encoding on, a substring whose first base equals the previously
 * emitted base will be squashed into the preceding run by the final
 * re-encoding; the coordinate bookkeeping skips one reference position to
 * account for this.
 */
pub fn consensus_string(
    bg: &BubbleGraph,
    consensus_path: &[usize],
    params: &PhaseParams,
) -> Result<(RleString, Vec<i64>), SkuaError> {
    let ref_string = bg.ref_string.ok_or_else(|| {
        SkuaError::MissingReference(
            "Consensus stitching requires a bubble graph with a reference view".to_string(),
        )
    })?;
    assert_eq!(consensus_path.len(), bg.bubble_no());

    let mut poa_to_consensus = vec![-1i64; ref_string.len()];
    let mut consensus_substrings: Vec<Vec<u8>> = Vec::new();

    let mut previous_base = b'-';
    let mut j = 0usize; // Index in the consensus string
    let mut k = 0usize; // Index in the reference string
    let mut total_diffs = 0usize;

    for (i, bubble) in bg.bubbles.iter().enumerate() {
        // Reference between the previous bubble (or start) and this one
        if k < bubble.ref_start {
            let ref_substring = ref_string.copy_substring(k, bubble.ref_start - k);
            assert!(ref_substring.len() > 0);
            consensus_substrings.push(ref_substring.expand());

            if params.use_run_length_encoding && ref_substring.bases()[0] == previous_base {
                k += 1;
            }
            while k < bubble.ref_start {
                poa_to_consensus[k] = j as i64;
                k += 1;
                j += 1;
            }
            previous_base = *ref_substring.bases().last().unwrap();
        }

        let consensus_substring = &bubble.alleles[consensus_path[i]];
        assert!(consensus_substring.len() > 0);
        consensus_substrings.push(consensus_substring.expand());

        if *consensus_substring == bubble.ref_allele {
            // Same as the existing reference, maintain the alignment
            if params.use_run_length_encoding && consensus_substring.bases()[0] == previous_base {
                k += 1;
            }
            while k < bubble.ref_start + bubble.ref_allele.len() {
                poa_to_consensus[k] = j as i64;
                k += 1;
                j += 1;
            }
        } else {
            debug!(
                "Consensus diff {} over reference interval [{}, {})",
                total_diffs,
                k,
                k + bubble.ref_allele.len()
            );
            total_diffs += 1;
            k += bubble.ref_allele.len();
            j += consensus_substring.len();
            // The first position is squashed into the preceding run when it
            // continues it
            if params.use_run_length_encoding && consensus_substring.bases()[0] == previous_base {
                j -= 1;
            }
        }
        previous_base = *consensus_substring.bases().last().unwrap();
    }

    // Reference suffix after the last bubble
    if k < ref_string.len() {
        let ref_substring = ref_string.copy_substring(k, ref_string.len() - k);
        consensus_substrings.push(ref_substring.expand());

        if params.use_run_length_encoding && ref_substring.bases()[0] == previous_base {
            k += 1;
        }
        while k < ref_string.len() {
            poa_to_consensus[k] = j as i64;
            k += 1;
            j += 1;
        }
    }

    let expanded: Vec<u8> = consensus_substrings.concat();
    let new_consensus = if params.use_run_length_encoding {
        RleString::construct(&expanded)
    } else {
        RleString::construct_no_rle(&expanded)
    };

    assert_eq!(new_consensus.len(), j);

    Ok((new_consensus, poa_to_consensus))
}
