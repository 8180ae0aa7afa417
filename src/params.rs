use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::utils::errors::SkuaError;

/// Maximum read depth the partition bit-vectors can represent.
pub const MAX_READ_PARTITIONING_DEPTH: usize = 64;

/**
 * Pair-HMM rates for aligning read substrings against candidate alleles.
 * The same shape is used for forward and reverse strand reads; the two
 * machines are constructed separately so strand specific training can be
 * dropped in.
 */
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PairHmmParams {
    pub match_continue_prob: f64,
    pub gap_open_prob: f64,
    pub gap_extend_prob: f64,
    pub base_mismatch_prob: f64,
    pub repeat_count_mismatch_prob: f64,
}

impl Default for PairHmmParams {
    fn default() -> PairHmmParams {
        PairHmmParams {
            match_continue_prob: 0.9,
            gap_open_prob: 0.05,
            gap_extend_prob: 0.6,
            base_mismatch_prob: 0.02,
            repeat_count_mismatch_prob: 0.05,
        }
    }
}

/**
 * Tuning parameters for bubble graph construction, phasing and consensus.
 * Deserializable from a JSON parameter file; all fields fall back to the
 * defaults below.
 */
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhaseParams {
    pub use_run_length_encoding: bool,
    pub use_repeat_counts_in_alignment: bool,
    pub max_repeat_count: usize,

    pub candidate_variant_weight: f64,
    pub column_anchor_trim: usize,
    pub max_consensus_strings: usize,

    pub use_read_alleles: bool,
    pub use_read_alleles_in_phasing: bool,

    pub filter_reads_while_have_at_least_this_coverage: usize,
    pub min_avg_base_quality: f64,

    pub het_substitution_probability: f64,
    pub rounds_of_iterative_refinement: usize,
    pub include_ancestor_sub_prob: bool,

    pub max_coverage_depth: usize,
    pub max_partitions_per_column: usize,
    pub read_partition_flip_prob: f64,

    pub pair_hmm: PairHmmParams,
}

impl Default for PhaseParams {
    fn default() -> PhaseParams {
        PhaseParams {
            use_run_length_encoding: true,
            use_repeat_counts_in_alignment: true,
            max_repeat_count: 51,
            candidate_variant_weight: 0.15,
            column_anchor_trim: 5,
            max_consensus_strings: 100,
            use_read_alleles: false,
            use_read_alleles_in_phasing: true,
            filter_reads_while_have_at_least_this_coverage: 30,
            min_avg_base_quality: 10.0,
            het_substitution_probability: 0.0001,
            rounds_of_iterative_refinement: 3,
            include_ancestor_sub_prob: true,
            max_coverage_depth: MAX_READ_PARTITIONING_DEPTH,
            max_partitions_per_column: 50,
            read_partition_flip_prob: 1e-4,
            pair_hmm: PairHmmParams::default(),
        }
    }
}

impl PhaseParams {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<PhaseParams, SkuaError> {
        let mut contents = String::new();
        File::open(path.as_ref())
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|e| {
                SkuaError::InvalidConfiguration(format!(
                    "Could not read parameter file {:?}: {}",
                    path.as_ref(),
                    e
                ))
            })?;
        let params: PhaseParams = serde_json::from_str(&contents)
            .map_err(|e| SkuaError::InvalidConfiguration(format!("Malformed parameter file: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SkuaError> {
        if self.max_coverage_depth == 0 || self.max_coverage_depth > MAX_READ_PARTITIONING_DEPTH {
            return Err(SkuaError::InvalidConfiguration(format!(
                "max_coverage_depth must be in [1, {}], got {}",
                MAX_READ_PARTITIONING_DEPTH, self.max_coverage_depth
            )));
        }
        if self.het_substitution_probability <= 0.0 || self.het_substitution_probability >= 1.0 {
            return Err(SkuaError::InvalidConfiguration(format!(
                "het_substitution_probability must be in (0, 1), got {}",
                self.het_substitution_probability
            )));
        }
        if self.max_repeat_count < 2 {
            return Err(SkuaError::InvalidConfiguration(format!(
                "max_repeat_count must be at least 2, got {}",
                self.max_repeat_count
            )));
        }
        if self.max_partitions_per_column == 0 {
            return Err(SkuaError::InvalidConfiguration(
                "max_partitions_per_column must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
