use std::collections::HashSet;

use ordered_float::OrderedFloat;

use crate::params::{PhaseParams, MAX_READ_PARTITIONING_DEPTH};
use crate::phasing::profile_seq::ProfileSeq;
use crate::phasing::reference::{PhasingReference, Site};
use crate::utils::errors::SkuaError;
use crate::utils::math_utils::MathUtils;

/**
 * One hypothesis about how a column's reads split into the two haplotypes,
 * as a bit-vector over the column's read list (bit set = first partition),
 * plus its inference state.
 */
#[derive(Debug, Clone)]
pub struct RpCell {
    pub partition: u64,
    pub emission_log_prob: f64,
    pub forward_log_prob: f64,
    pub backward_log_prob: f64,
}

impl RpCell {
    pub fn new(partition: u64) -> RpCell {
        RpCell {
            partition,
            emission_log_prob: 0.0,
            forward_log_prob: MathUtils::LOG_ZERO,
            backward_log_prob: MathUtils::LOG_ZERO,
        }
    }
}

/**
 * One column of the read partitioning HMM, covering a single site. Bit i of
 * a cell partition refers to reads[i], an index into the owning HMM's
 * profile sequence list.
 */
#[derive(Debug, Clone)]
pub struct RpColumn {
    pub site_index: usize,
    pub reads: Vec<usize>,
    pub cells: Vec<RpCell>,
}

impl RpColumn {
    pub fn read_bit(&self, pseq_index: usize) -> Option<usize> {
        self.reads.iter().position(|r| *r == pseq_index)
    }
}

/**
 * A pruned read partitioning HMM over a contiguous run of sites. Hidden
 * states are read partition bit-vectors; the state space per column is
 * seeded from per-site allele pair splits and from the neighbouring
 * column's states, bounded by max_partitions_per_column. Transitions charge
 * a per-read flip penalty for shared reads that change sides; emissions
 * marginalize the column's reads over ordered allele pairs.
 */
#[derive(Debug, Clone)]
pub struct ReadPartitioningHmm {
    pub ref_start: usize,
    pub ref_length: usize,
    pub profile_seqs: Vec<ProfileSeq>,
    pub columns: Vec<RpColumn>,
    pub forward_log_prob: f64,
    pub backward_log_prob: f64,
}

/**
 * Log probability of a column's reads under a given partition: the sum over
 * both haplotype sides, marginalized over ordered allele pairs with the
 * site's allele priors and, when requested, the ancestral allele
 * substitution structure.
 */
pub fn emission_log_prob(
    site: &Site,
    column_reads: &[usize],
    partition: u64,
    profile_seqs: &[ProfileSeq],
    include_ancestor_sub_prob: bool,
) -> f64 {
    let allele_no = site.allele_number;
    let mut side1 = vec![0.0; allele_no];
    let mut side2 = vec![0.0; allele_no];

    for (bit, r) in column_reads.iter().enumerate() {
        let pseq = &profile_seqs[*r];
        for (a, (s1, s2)) in side1.iter_mut().zip(side2.iter_mut()).enumerate() {
            let lp = pseq.site_allele_log_prob(site, a);
            if (partition >> bit) & 1 == 1 {
                *s1 += lp;
            } else {
                *s2 += lp;
            }
        }
    }

    let mut terms = Vec::with_capacity(allele_no * allele_no);
    let mut ancestor_terms = Vec::with_capacity(allele_no);
    for a1 in 0..allele_no {
        for a2 in 0..allele_no {
            let mut term =
                site.prior_log_prob(a1) + site.prior_log_prob(a2) + side1[a1] + side2[a2];
            if include_ancestor_sub_prob {
                ancestor_terms.clear();
                for a0 in 0..allele_no {
                    ancestor_terms.push(
                        site.prior_log_prob(a0)
                            + site.substitution_log_prob(a0, a1)
                            + site.substitution_log_prob(a0, a2),
                    );
                }
                term += MathUtils::log_sum_exp(&ancestor_terms);
            }
            terms.push(term);
        }
    }

    MathUtils::log_sum_exp(&terms)
}

/// Bit pairs (current bit, previous bit) of the reads shared by two columns.
fn shared_bit_pairs(prev: &RpColumn, curr: &RpColumn) -> Vec<(usize, usize)> {
    curr.reads
        .iter()
        .enumerate()
        .filter_map(|(cb, r)| prev.read_bit(*r).map(|pb| (cb, pb)))
        .collect()
}

fn transition_log_prob(
    pairs: &[(usize, usize)],
    prev_partition: u64,
    curr_partition: u64,
    flip_log_prob: f64,
    stay_log_prob: f64,
) -> f64 {
    let mut flips = 0usize;
    for (cb, pb) in pairs {
        if ((prev_partition >> pb) ^ (curr_partition >> cb)) & 1 == 1 {
            flips += 1;
        }
    }
    flips as f64 * flip_log_prob + (pairs.len() - flips) as f64 * stay_log_prob
}

/**
 * Candidate partitions for a column: the trivial partition, one split per
 * unordered allele pair assigning each read to its better supported side,
 * and every previous-column state projected onto the current read list with
 * entering reads taking their side from the best scoring seed.
 */
fn candidate_partitions(
    site: &Site,
    column_reads: &[usize],
    profile_seqs: &[ProfileSeq],
    prev: Option<&RpColumn>,
    params: &PhaseParams,
) -> Vec<RpCell> {
    let allele_no = site.allele_number;
    let mut seen: HashSet<u64> = HashSet::new();
    let mut partitions: Vec<u64> = Vec::new();

    let mut push = |partitions: &mut Vec<u64>, seen: &mut HashSet<u64>, p: u64| {
        if seen.insert(p) {
            partitions.push(p);
        }
    };

    push(&mut partitions, &mut seen, 0);
    for a1 in 0..allele_no {
        for a2 in (a1 + 1)..allele_no {
            let mut mask = 0u64;
            for (bit, r) in column_reads.iter().enumerate() {
                let pseq = &profile_seqs[*r];
                if pseq.site_allele_log_prob(site, a1) >= pseq.site_allele_log_prob(site, a2) {
                    mask |= 1 << bit;
                }
            }
            push(&mut partitions, &mut seen, mask);
        }
    }

    // Best seed so far decides the side of reads entering at this column
    let best_seed = partitions
        .iter()
        .cloned()
        .max_by_key(|p| {
            OrderedFloat(emission_log_prob(
                site,
                column_reads,
                *p,
                profile_seqs,
                params.include_ancestor_sub_prob,
            ))
        })
        .unwrap_or(0);

    if let Some(prev_column) = prev {
        for cell in &prev_column.cells {
            let mut mask = 0u64;
            for (bit, r) in column_reads.iter().enumerate() {
                let side = match prev_column.read_bit(*r) {
                    Some(pb) => (cell.partition >> pb) & 1,
                    None => (best_seed >> bit) & 1,
                };
                mask |= side << bit;
            }
            push(&mut partitions, &mut seen, mask);
        }
    }

    let mut cells: Vec<RpCell> = partitions
        .into_iter()
        .map(|p| {
            let mut cell = RpCell::new(p);
            cell.emission_log_prob = emission_log_prob(
                site,
                column_reads,
                p,
                profile_seqs,
                params.include_ancestor_sub_prob,
            );
            cell
        })
        .collect();

    cells.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.emission_log_prob)));
    cells.truncate(params.max_partitions_per_column);
    cells
}

impl ReadPartitioningHmm {
    /**
     * Build an HMM over the contiguous site range covered by the given
     * profile sequences, which must form one overlapping chain.
     */
    pub fn new(
        profile_seqs: Vec<ProfileSeq>,
        reference: &PhasingReference,
        params: &PhaseParams,
    ) -> Result<ReadPartitioningHmm, SkuaError> {
        assert!(!profile_seqs.is_empty());
        let ref_start = profile_seqs.iter().map(|p| p.ref_start).min().unwrap();
        let ref_end = profile_seqs.iter().map(|p| p.ref_end()).max().unwrap();

        let mut columns: Vec<RpColumn> = Vec::with_capacity(ref_end - ref_start);
        for site_index in ref_start..ref_end {
            let reads: Vec<usize> = profile_seqs
                .iter()
                .enumerate()
                .filter(|(_, p)| p.spans_site(site_index))
                .map(|(i, _)| i)
                .collect();
            if reads.len() > MAX_READ_PARTITIONING_DEPTH {
                return Err(SkuaError::ExcessiveCoverage(format!(
                    "Site {} has depth {} beyond the partitioning limit of {}",
                    site_index,
                    reads.len(),
                    MAX_READ_PARTITIONING_DEPTH
                )));
            }

            let cells = candidate_partitions(
                &reference.sites[site_index],
                &reads,
                &profile_seqs,
                columns.last(),
                params,
            );
            columns.push(RpColumn {
                site_index,
                reads,
                cells,
            });
        }

        Ok(ReadPartitioningHmm {
            ref_start,
            ref_length: ref_end - ref_start,
            profile_seqs,
            columns,
            forward_log_prob: MathUtils::LOG_ZERO,
            backward_log_prob: MathUtils::LOG_ZERO,
        })
    }

    pub fn ref_end(&self) -> usize {
        self.ref_start + self.ref_length
    }
}

/**
 * Build the tiling path of HMMs for a set of profile sequences: sequences
 * are chained while their site spans overlap, one HMM per chain, ordered by
 * start site. Empty input gives an empty path.
 */
pub fn rp_hmms(
    mut profile_seqs: Vec<ProfileSeq>,
    reference: &PhasingReference,
    params: &PhaseParams,
) -> Result<Vec<ReadPartitioningHmm>, SkuaError> {
    profile_seqs.sort_by_key(|p| (p.ref_start, p.read_no));

    let mut hmms = Vec::new();
    let mut group: Vec<ProfileSeq> = Vec::new();
    let mut group_end = 0usize;

    for pseq in profile_seqs {
        if !group.is_empty() && pseq.ref_start >= group_end {
            hmms.push(ReadPartitioningHmm::new(
                std::mem::take(&mut group),
                reference,
                params,
            )?);
        }
        group_end = group_end.max(pseq.ref_end());
        group.push(pseq);
    }
    if !group.is_empty() {
        hmms.push(ReadPartitioningHmm::new(group, reference, params)?);
    }

    Ok(hmms)
}

/// Concatenate two column read lists and cross their cell sets, offsetting
/// the second column's bits past the first's.
fn cross_combine(
    a_reads: &[usize],
    a_cells: &[RpCell],
    b_reads: &[usize],
    b_cells: &[RpCell],
) -> (Vec<usize>, Vec<u64>) {
    let mut reads = a_reads.to_vec();
    reads.extend_from_slice(b_reads);
    assert!(reads.len() <= MAX_READ_PARTITIONING_DEPTH);
    let shift = a_reads.len();

    let mut partitions = Vec::with_capacity(a_cells.len().max(1) * b_cells.len().max(1));
    let a_partitions: Vec<u64> = if a_cells.is_empty() {
        vec![0]
    } else {
        a_cells.iter().map(|c| c.partition).collect()
    };
    let b_partitions: Vec<u64> = if b_cells.is_empty() {
        vec![0]
    } else {
        b_cells.iter().map(|c| c.partition).collect()
    };
    for am in &a_partitions {
        for bm in &b_partitions {
            let shifted = if shift >= MAX_READ_PARTITIONING_DEPTH {
                0
            } else {
                bm << shift
            };
            partitions.push(am | shifted);
        }
    }
    (reads, partitions)
}

fn rescore_and_prune(
    partitions: Vec<u64>,
    site: &Site,
    reads: &[usize],
    profile_seqs: &[ProfileSeq],
    params: &PhaseParams,
) -> Vec<RpCell> {
    let mut seen = HashSet::new();
    let mut cells: Vec<RpCell> = partitions
        .into_iter()
        .filter(|p| seen.insert(*p))
        .map(|p| {
            let mut cell = RpCell::new(p);
            cell.emission_log_prob = emission_log_prob(
                site,
                reads,
                p,
                profile_seqs,
                params.include_ancestor_sub_prob,
            );
            cell
        })
        .collect();
    cells.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.emission_log_prob)));
    cells.truncate(params.max_partitions_per_column);
    cells
}

/// Merge one overlapping HMM pair into a single HMM over the union span.
fn merge_hmms(
    x: ReadPartitioningHmm,
    y: ReadPartitioningHmm,
    reference: &PhasingReference,
    params: &PhaseParams,
) -> ReadPartitioningHmm {
    let x_ref_end = x.ref_end();
    let y_ref_end = y.ref_end();
    let ref_start = x.ref_start.min(y.ref_start);
    let ref_end = x_ref_end.max(y_ref_end);
    let offset = x.profile_seqs.len();

    let mut profile_seqs = x.profile_seqs;
    profile_seqs.extend(y.profile_seqs);

    let empty_reads: Vec<usize> = Vec::new();
    let empty_cells: Vec<RpCell> = Vec::new();

    let mut columns = Vec::with_capacity(ref_end - ref_start);
    for site_index in ref_start..ref_end {
        let (x_reads, x_cells) = if site_index >= x.ref_start && site_index < x_ref_end {
            let col = &x.columns[site_index - x.ref_start];
            (&col.reads, &col.cells)
        } else {
            (&empty_reads, &empty_cells)
        };
        let (y_reads, y_cells) = if site_index >= y.ref_start && site_index < y_ref_end {
            let col = &y.columns[site_index - y.ref_start];
            (&col.reads, &col.cells)
        } else {
            (&empty_reads, &empty_cells)
        };

        let shifted_y_reads: Vec<usize> = y_reads.iter().map(|r| r + offset).collect();
        let (reads, partitions) = cross_combine(x_reads, x_cells, &shifted_y_reads, y_cells);
        let cells = rescore_and_prune(
            partitions,
            &reference.sites[site_index],
            &reads,
            &profile_seqs,
            params,
        );
        columns.push(RpColumn {
            site_index,
            reads,
            cells,
        });
    }

    ReadPartitioningHmm {
        ref_start,
        ref_length: ref_end - ref_start,
        profile_seqs,
        columns,
        forward_log_prob: MathUtils::LOG_ZERO,
        backward_log_prob: MathUtils::LOG_ZERO,
    }
}

/**
 * Interleave two tiling paths (one per strand) in site order, merging HMMs
 * wherever their spans overlap, so the result is an ordered path of
 * disjoint HMMs.
 */
pub fn merge_two_tiling_paths(
    a: Vec<ReadPartitioningHmm>,
    b: Vec<ReadPartitioningHmm>,
    reference: &PhasingReference,
    params: &PhaseParams,
) -> Vec<ReadPartitioningHmm> {
    let mut hmms: Vec<ReadPartitioningHmm> = a.into_iter().chain(b.into_iter()).collect();
    hmms.sort_by_key(|h| h.ref_start);

    let mut merged: Vec<ReadPartitioningHmm> = Vec::new();
    for hmm in hmms {
        let overlaps = merged
            .last()
            .map(|last| hmm.ref_start < last.ref_end())
            .unwrap_or(false);
        if overlaps {
            let last = merged.pop().unwrap();
            merged.push(merge_hmms(last, hmm, reference, params));
        } else {
            merged.push(hmm);
        }
    }
    merged
}

/**
 * Fuse an ordered path of disjoint HMMs into one HMM spanning the full
 * window. Sites covered by no HMM get an empty column whose single state is
 * the trivial partition.
 */
pub fn fuse_tiling_path(
    mut hmms: Vec<ReadPartitioningHmm>,
    reference: &PhasingReference,
    params: &PhaseParams,
) -> Option<ReadPartitioningHmm> {
    if hmms.is_empty() {
        return None;
    }
    hmms.sort_by_key(|h| h.ref_start);

    let ref_start = hmms[0].ref_start;
    let ref_end = hmms.iter().map(|h| h.ref_end()).max().unwrap();

    let mut profile_seqs: Vec<ProfileSeq> = Vec::new();
    let mut columns: Vec<RpColumn> = (ref_start..ref_end)
        .map(|site_index| RpColumn {
            site_index,
            reads: Vec::new(),
            cells: vec![RpCell::new(0)],
        })
        .collect();

    for hmm in hmms {
        let offset = profile_seqs.len();
        for column in hmm.columns {
            let target = &mut columns[column.site_index - ref_start];
            let shifted_reads: Vec<usize> = column.reads.iter().map(|r| r + offset).collect();
            if target.reads.is_empty() {
                target.reads = shifted_reads;
                target.cells = column.cells;
            } else {
                let (reads, partitions) =
                    cross_combine(&target.reads, &target.cells, &shifted_reads, &column.cells);
                target.reads = reads;
                target.cells = partitions.into_iter().map(RpCell::new).collect();
            }
        }
        profile_seqs.extend(hmm.profile_seqs);
    }

    // Re-score every column against the full profile sequence list
    for column in columns.iter_mut() {
        let partitions: Vec<u64> = column.cells.iter().map(|c| c.partition).collect();
        column.cells = rescore_and_prune(
            partitions,
            &reference.sites[column.site_index],
            &column.reads,
            &profile_seqs,
            params,
        );
    }

    Some(ReadPartitioningHmm {
        ref_start,
        ref_length: ref_end - ref_start,
        profile_seqs,
        columns,
        forward_log_prob: MathUtils::LOG_ZERO,
        backward_log_prob: MathUtils::LOG_ZERO,
    })
}

/**
 * Run the forward-backward algorithm over the pruned state space. Emissions
 * are recomputed first with the ancestor substitution setting currently in
 * force, so a path built with it disabled can be fused and then evaluated
 * with it enabled.
 */
pub fn forward_backward(
    hmm: &mut ReadPartitioningHmm,
    reference: &PhasingReference,
    params: &PhaseParams,
) {
    for column in hmm.columns.iter_mut() {
        let site = &reference.sites[column.site_index];
        for cell in column.cells.iter_mut() {
            cell.emission_log_prob = emission_log_prob(
                site,
                &column.reads,
                cell.partition,
                &hmm.profile_seqs,
                params.include_ancestor_sub_prob,
            );
        }
    }

    let flip = params.read_partition_flip_prob.ln();
    let stay = (1.0 - params.read_partition_flip_prob).ln();
    let n = hmm.columns.len();

    // Forward sweep
    for ci in 0..n {
        if ci == 0 {
            for cell in hmm.columns[0].cells.iter_mut() {
                cell.forward_log_prob = cell.emission_log_prob;
            }
            continue;
        }
        let pairs = shared_bit_pairs(&hmm.columns[ci - 1], &hmm.columns[ci]);
        let prev: Vec<(u64, f64)> = hmm.columns[ci - 1]
            .cells
            .iter()
            .map(|c| (c.partition, c.forward_log_prob))
            .collect();
        for cell in hmm.columns[ci].cells.iter_mut() {
            let terms: Vec<f64> = prev
                .iter()
                .map(|(pm, pf)| pf + transition_log_prob(&pairs, *pm, cell.partition, flip, stay))
                .collect();
            cell.forward_log_prob = cell.emission_log_prob + MathUtils::log_sum_exp(&terms);
        }
    }
    let final_forwards: Vec<f64> = hmm.columns[n - 1]
        .cells
        .iter()
        .map(|c| c.forward_log_prob)
        .collect();
    hmm.forward_log_prob = MathUtils::log_sum_exp(&final_forwards);

    // Backward sweep
    for cell in hmm.columns[n - 1].cells.iter_mut() {
        cell.backward_log_prob = 0.0;
    }
    for ci in (0..n - 1).rev() {
        let pairs = shared_bit_pairs(&hmm.columns[ci], &hmm.columns[ci + 1]);
        let next: Vec<(u64, f64)> = hmm.columns[ci + 1]
            .cells
            .iter()
            .map(|c| (c.partition, c.emission_log_prob + c.backward_log_prob))
            .collect();
        for cell in hmm.columns[ci].cells.iter_mut() {
            let terms: Vec<f64> = next
                .iter()
                .map(|(nm, nb)| nb + transition_log_prob(&pairs, cell.partition, *nm, flip, stay))
                .collect();
            cell.backward_log_prob = MathUtils::log_sum_exp(&terms);
        }
    }
    let initial_backwards: Vec<f64> = hmm.columns[0]
        .cells
        .iter()
        .map(|c| c.emission_log_prob + c.backward_log_prob)
        .collect();
    hmm.backward_log_prob = MathUtils::log_sum_exp(&initial_backwards);
}

/**
 * Maximum forward-probability path through the HMM, one partition
 * bit-vector per column.
 */
pub fn forward_trace_back(hmm: &ReadPartitioningHmm, params: &PhaseParams) -> Vec<u64> {
    let n = hmm.columns.len();
    if n == 0 {
        return Vec::new();
    }
    let flip = params.read_partition_flip_prob.ln();
    let stay = (1.0 - params.read_partition_flip_prob).ln();

    let mut path = vec![0u64; n];
    let last = &hmm.columns[n - 1];
    let mut chosen = last
        .cells
        .iter()
        .max_by_key(|c| OrderedFloat(c.forward_log_prob))
        .map(|c| c.partition)
        .unwrap_or(0);
    path[n - 1] = chosen;

    for ci in (0..n - 1).rev() {
        let pairs = shared_bit_pairs(&hmm.columns[ci], &hmm.columns[ci + 1]);
        chosen = hmm.columns[ci]
            .cells
            .iter()
            .max_by_key(|c| {
                OrderedFloat(
                    c.forward_log_prob + transition_log_prob(&pairs, c.partition, chosen, flip, stay),
                )
            })
            .map(|c| c.partition)
            .unwrap_or(0);
        path[ci] = chosen;
    }

    path
}
