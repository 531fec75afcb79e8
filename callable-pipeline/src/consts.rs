//! File naming and default tool settings.
//!
//! The artifact names are consumed by downstream tooling and must not change.

/// Default interval toolkit executable.
pub const DEFAULT_BEDTOOLS: &str = "bedtools";

/// Default timeout for a single external tool invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

// VCF header parsing

pub const VCF_SUFFIX: &str = ".filtered_variants.vcf";
pub const VCF_META_PREFIX: &str = "##";
pub const VCF_HEADER_PREFIX: &str = "#CHROM";

/// Zero-based index of the first sample column in a VCF header.
pub const VCF_FIRST_SAMPLE_COLUMN: usize = 9;

// raw input layout

pub const RAW_BED_SUFFIX: &str = "_CallableLoci.bed";
pub const DEDUP_REALIGNED_SUFFIX: &str = "_dedup.realigned";

// output layout

pub const OUTPUT_DIR_SUFFIX: &str = "_CallableLoci";
pub const CALLABLE_SUFFIX: &str = "CallableLoci_CALLABLE.bed";
pub const CONTROL_AUTOSOMAL_SUFFIX: &str = "CallableLoci_autosomal.bed";
pub const INTERSECTED_SUFFIX: &str = "_CallableLoci.bed";
pub const SORTED_SUFFIX: &str = "_CallableLoci_sorted.bed";
pub const MERGED_SUFFIX: &str = "_CallableLoci_merged.bed";
pub const MERGED_AUTOSOMAL_SUFFIX: &str = "_CallableLoci_merged_autosomal.bed";
pub const SURVEYED_SUFFIX: &str = "_surveyed.txt";
