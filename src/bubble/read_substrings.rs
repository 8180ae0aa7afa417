use ordered_float::OrderedFloat;

use crate::params::PhaseParams;
use crate::poa::{Poa, PoaNode};
use crate::reads::chunk_read::ChunkRead;
use crate::sequence::rle_string::RleString;

/**
 * A read's substring over a bubble interval: the source read (by index into
 * the chunk read table), the RLE coordinates of the slice, and the mean
 * phred quality over the slice (-1 when the read carries no qualities).
 *
 * When the slice comes from a VCF driven path instead of POA observations
 * the materialized substring is stored directly and start/length are unused.
 */
#[derive(Debug, Clone)]
pub struct ReadSubstring {
    pub read_no: usize,
    pub start: usize,
    pub length: usize,
    pub substring: Option<RleString>,
    pub qual_value: f64,
}

impl ReadSubstring {
    pub fn from_read(read_no: usize, read: &ChunkRead, start: usize, length: usize) -> ReadSubstring {
        ReadSubstring {
            read_no,
            start,
            length,
            substring: None,
            qual_value: read.mean_quality(start, length),
        }
    }

    pub fn from_materialized(read_no: usize, substring: RleString, qual_value: f64) -> ReadSubstring {
        ReadSubstring {
            read_no,
            start: 0,
            length: substring.len(),
            substring: Some(substring),
            qual_value,
        }
    }

    pub fn rle_string(&self, reads: &[ChunkRead]) -> RleString {
        match &self.substring {
            Some(s) => s.clone(),
            None => reads[self.read_no]
                .rle_read
                .copy_substring(self.start, self.length),
        }
    }
}

/// Step past further observations of the same read, which are presorted to
/// descending weight so the first one seen is the best.
fn skip_dupes(node: &PoaNode, mut i: usize, read_no: usize) -> usize {
    while i < node.observations.len() && node.observations[i].read_no == read_no {
        i += 1;
    }
    i
}

/**
 * Sort substrings by descending quality, then trim the low-quality tail
 * while coverage stays above the configured floor. Substrings with unknown
 * quality (-1) are never trimmed.
 */
fn filter_read_substrings(
    mut substrings: Vec<ReadSubstring>,
    params: &PhaseParams,
) -> Vec<ReadSubstring> {
    substrings.sort_by_key(|rs| std::cmp::Reverse(OrderedFloat(rs.qual_value)));

    while substrings.len() > params.filter_reads_while_have_at_least_this_coverage {
        let tail = substrings.last().unwrap();
        if tail.qual_value >= params.min_avg_base_quality || tail.qual_value == -1.0 {
            break;
        }
        substrings.pop();
    }

    substrings
}

/**
 * Substrings of the reads aligned to the POA node interval [from, to),
 * located through each boundary node's observation list.
 *
 * Boundary policies: a [0, node_count) interval returns whole reads; a
 * left-bounded interval returns read prefixes ending at the interval end; a
 * right-unbounded interval returns read suffixes starting at the interval
 * start; otherwise both boundary nodes are walked with two pointers and the
 * spanned slice of each read appearing at both nodes is taken.
 */
pub fn get_read_substrings(
    reads: &[ChunkRead],
    poa: &Poa,
    from: usize,
    to: usize,
    params: &PhaseParams,
    should_filter: bool,
) -> Vec<ReadSubstring> {
    let mut substrings = Vec::new();
    let node_count = poa.nodes.len();

    if from == 0 {
        if to >= node_count {
            for (read_no, read) in reads.iter().enumerate() {
                substrings.push(ReadSubstring::from_read(read_no, read, 0, read.rle_read.len()));
            }
        } else {
            let node = &poa.nodes[to];
            let mut i = 0;
            while i < node.observations.len() {
                let obs = node.observations[i];
                substrings.push(ReadSubstring::from_read(
                    obs.read_no,
                    &reads[obs.read_no],
                    0,
                    obs.offset,
                ));
                i = skip_dupes(node, i + 1, obs.read_no);
            }
        }
        return if should_filter {
            filter_read_substrings(substrings, params)
        } else {
            substrings
        };
    } else if to >= node_count {
        let node = &poa.nodes[from];
        let mut i = 0;
        while i < node.observations.len() {
            let obs = node.observations[i];
            let read = &reads[obs.read_no];
            substrings.push(ReadSubstring::from_read(
                obs.read_no,
                read,
                obs.offset,
                read.rle_read.len() - obs.offset,
            ));
            i = skip_dupes(node, i + 1, obs.read_no);
        }
        return if should_filter {
            filter_read_substrings(substrings, params)
        } else {
            substrings
        };
    }

    let from_node = &poa.nodes[from];
    let to_node = &poa.nodes[to];

    let mut i = 0;
    let mut j = 0;
    while i < from_node.observations.len() && j < to_node.observations.len() {
        let obs_from = from_node.observations[i];
        let obs_to = to_node.observations[j];

        if obs_from.read_no == obs_to.read_no {
            if obs_to.offset > obs_from.offset {
                // A non zero run of bases
                substrings.push(ReadSubstring::from_read(
                    obs_from.read_no,
                    &reads[obs_from.read_no],
                    obs_from.offset,
                    obs_to.offset - obs_from.offset,
                ));
            }
            i = skip_dupes(from_node, i + 1, obs_from.read_no);
            j = skip_dupes(to_node, j + 1, obs_to.read_no);
        } else if obs_from.read_no < obs_to.read_no {
            i = skip_dupes(from_node, i + 1, obs_from.read_no);
        } else {
            j = skip_dupes(to_node, j + 1, obs_to.read_no);
        }
    }

    if should_filter {
        filter_read_substrings(substrings, params)
    } else {
        substrings
    }
}
