//! Sample name resolution.
//!
//! Samples come either from an explicit list or from the `#CHROM` header line of the experiment's
//! VCF, where every column from the tenth onward names a sample. Header-derived lists never
//! contain the control.
use std::io::BufRead;
use std::path::Path;

use log::debug;

use callable_core::utils::get_dynamic_reader;

use crate::config::PipelineConfig;
use crate::consts::{VCF_FIRST_SAMPLE_COLUMN, VCF_HEADER_PREFIX, VCF_META_PREFIX};
use crate::errors::{PipelineError, PipelineResult};

///
/// Determine which samples to process.
///
/// A non-empty explicit list is returned verbatim, without removing the
/// control. Otherwise samples are read from `config.vcf`, or from
/// `<dir_in>/<name>.filtered_variants.vcf` when no VCF path was given.
///
pub fn resolve_samples(config: &PipelineConfig) -> PipelineResult<Vec<String>> {
    if let Some(samples) = config.samples.as_ref().filter(|s| !s.is_empty()) {
        return Ok(samples.clone());
    }

    let vcf = config
        .vcf
        .clone()
        .unwrap_or_else(|| config.default_vcf_path());

    debug!("Reading sample names from {}", vcf.display());
    samples_from_vcf(&vcf, &config.control)
}

///
/// Read the sample columns of a (possibly gzipped) VCF and drop the control.
///
/// # Arguments
/// - path: path to the VCF
/// - control: control sample identifier, which must appear in the header
pub fn samples_from_vcf(path: &Path, control: &str) -> PipelineResult<Vec<String>> {
    if !path.is_file() {
        return Err(PipelineError::MissingVcf(path.to_path_buf()));
    }

    let reader = get_dynamic_reader(path)?;
    let header = read_header_samples(reader)?.ok_or_else(|| {
        PipelineError::Configuration(format!(
            "No {} header line found in {}",
            VCF_HEADER_PREFIX,
            path.display()
        ))
    })?;

    exclude_control(header, control)
}

///
/// Return the sample columns of the first `#CHROM` line, or `None` when the
/// input has no such line. Reading stops at the header.
///
pub fn read_header_samples<R: BufRead>(reader: R) -> std::io::Result<Option<Vec<String>>> {
    for line in reader.lines() {
        let line = line?;

        if line.starts_with(VCF_META_PREFIX) {
            continue;
        }

        if line.starts_with(VCF_HEADER_PREFIX) {
            let samples = line
                .trim()
                .split('\t')
                .skip(VCF_FIRST_SAMPLE_COLUMN)
                .map(String::from)
                .collect();
            return Ok(Some(samples));
        }
    }

    Ok(None)
}

fn exclude_control(mut samples: Vec<String>, control: &str) -> PipelineResult<Vec<String>> {
    match samples.iter().position(|s| s == control) {
        Some(idx) => {
            samples.remove(idx);
            Ok(samples)
        }
        None => Err(PipelineError::Configuration(format!(
            "Control sample `{}` not found in VCF header (samples: {})",
            control,
            samples.join(", ")
        ))),
    }
}
