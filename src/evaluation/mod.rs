pub mod local_phasing_correctness;
pub mod phased_vcf;
