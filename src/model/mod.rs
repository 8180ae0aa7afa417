pub mod vcf_entry;
