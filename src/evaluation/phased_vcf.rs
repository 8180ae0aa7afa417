use std::collections::HashMap;
use std::path::Path;

use itertools::Itertools;
use rust_htslib::bcf::header::HeaderRecord;
use rust_htslib::bcf::record::GenotypeAllele;
use rust_htslib::bcf::{self, Read};

use crate::evaluation::local_phasing_correctness::PhasedVariant;
use crate::utils::errors::SkuaError;

/// Whether the PS FORMAT tag is declared as Integer or String. Detected once
/// from the header; phase sets are normalized to strings internally.
fn phase_set_is_integer(header: &bcf::header::HeaderView) -> Result<bool, SkuaError> {
    for record in header.header_records() {
        if let HeaderRecord::Format { values, .. } = record {
            if values.get("ID").map(|v| v.as_str()) == Some("PS") {
                return match values.get("Type").map(|v| v.as_str()) {
                    Some("Integer") => Ok(true),
                    Some("String") => Ok(false),
                    other => Err(SkuaError::VcfParseError(format!(
                        "Unknown PS type {:?} in VCF header",
                        other
                    ))),
                };
            }
        }
    }
    Err(SkuaError::VcfParseError(
        "PS tag not present in VCF header".to_string(),
    ))
}

fn genotype_allele_index(allele: &GenotypeAllele) -> Option<usize> {
    match allele {
        GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) => Some(*i as usize),
        GenotypeAllele::UnphasedMissing | GenotypeAllele::PhasedMissing => None,
    }
}

/**
 * Read the phased heterozygous PASS variants of a VCF, grouped by contig
 * and sorted by position. Multi-sample files are read for the first sample
 * only. Homozygous, filtered and unphased records are counted and skipped.
 */
pub fn read_phased_variants<P: AsRef<Path>>(
    vcf_path: P,
) -> Result<HashMap<String, Vec<PhasedVariant>>, SkuaError> {
    let path = vcf_path.as_ref();
    let mut reader = bcf::Reader::from_path(path)
        .map_err(|e| SkuaError::VcfParseError(format!("Could not open VCF {:?}: {}", path, e)))?;
    let header = reader.header().clone();

    if header.sample_count() > 1 {
        warn!(
            "Got {} samples reading {:?}, will only take VCF records for the first",
            header.sample_count(),
            path
        );
    }

    let phase_set_is_int = phase_set_is_integer(&header)?;
    let pass_id = header
        .name_to_id(b"PASS")
        .map_err(|_| SkuaError::VcfParseError(format!("No PASS filter in header of {:?}", path)))?;

    let mut entries: HashMap<String, Vec<PhasedVariant>> = HashMap::new();
    let mut total_entries = 0usize;
    let mut skipped_for_not_pass = 0usize;
    let mut skipped_for_homozygous = 0usize;
    let mut skipped_for_no_phase_set = 0usize;
    let mut total_saved = 0usize;

    for result in reader.records() {
        let record = result
            .map_err(|e| SkuaError::VcfParseError(format!("Failed reading {:?}: {}", path, e)))?;
        total_entries += 1;

        if !record.has_filter(&pass_id) {
            skipped_for_not_pass += 1;
            continue;
        }

        let genotypes = record.genotypes().map_err(|e| {
            SkuaError::VcfParseError(format!("Failed to read genotypes in {:?}: {}", path, e))
        })?;
        let genotype = genotypes.get(0);
        let (gt1, gt2) = match (
            genotype.iter().next().and_then(genotype_allele_index),
            genotype.iter().nth(1).and_then(genotype_allele_index),
        ) {
            (Some(gt1), Some(gt2)) => (gt1, gt2),
            _ => {
                skipped_for_homozygous += 1;
                continue;
            }
        };
        if gt1 == gt2 {
            skipped_for_homozygous += 1;
            continue;
        }

        let phase_set = if phase_set_is_int {
            match record.format(b"PS").integer() {
                Ok(values) if !values.is_empty() && !values[0].is_empty() && values[0][0] != 0 => {
                    values[0][0].to_string()
                }
                _ => {
                    skipped_for_no_phase_set += 1;
                    continue;
                }
            }
        } else {
            match record.format(b"PS").string() {
                Ok(values) if !values.is_empty() && values[0] != b"." => {
                    String::from_utf8_lossy(values[0]).to_string()
                }
                _ => {
                    skipped_for_no_phase_set += 1;
                    continue;
                }
            }
        };

        let rid = match record.rid() {
            Some(rid) => rid,
            None => continue,
        };
        let chrom = String::from_utf8_lossy(header.rid2name(rid).map_err(|e| {
            SkuaError::VcfParseError(format!("Unknown contig id in {:?}: {}", path, e))
        })?)
        .to_string();

        let alleles: Vec<String> = record
            .alleles()
            .iter()
            .map(|a| String::from_utf8_lossy(a).to_string())
            .collect();

        let pv = PhasedVariant::new(
            &chrom,
            record.pos(),
            record.qual() as f64,
            alleles,
            gt1,
            gt2,
            &phase_set,
        );
        entries.entry(chrom).or_insert_with(Vec::new).push(pv);
        total_saved += 1;
    }

    info!(
        "Read {} variants from {:?} over {} contigs, keeping {} phased variants and discarding {} \
         for not PASS, {} for HOM, {} for not phased.",
        total_entries,
        path,
        entries.len(),
        total_saved,
        skipped_for_not_pass,
        skipped_for_homozygous,
        skipped_for_no_phase_set
    );

    // Ensure sorted; same-position records are a data anomaly worth noting
    for contig_entries in entries.values_mut() {
        contig_entries.sort_by_key(|pv| pv.ref_pos);
        for (a, b) in contig_entries.iter().tuple_windows() {
            if a.ref_pos == b.ref_pos {
                warn!(
                    "Encountered two variants at same position: {}:{}",
                    a.ref_seq_name, a.ref_pos
                );
            }
        }
    }

    Ok(entries)
}

/// Contig names present in both call sets, sorted.
pub fn shared_contigs(
    entries1: &HashMap<String, Vec<PhasedVariant>>,
    entries2: &HashMap<String, Vec<PhasedVariant>>,
) -> Vec<String> {
    let mut shared: Vec<String> = entries1
        .keys()
        .filter(|contig| entries2.contains_key(*contig))
        .cloned()
        .collect();
    shared.sort();
    shared
}
