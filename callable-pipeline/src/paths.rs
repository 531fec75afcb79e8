use std::path::{Path, PathBuf};

use crate::consts::*;

/// `<dir_in>/<sample>/<sample>_CallableLoci.bed`
pub fn preferred_raw_bed(dir_in: &Path, sample: &str) -> PathBuf {
    dir_in
        .join(sample)
        .join(format!("{}{}", sample, RAW_BED_SUFFIX))
}

/// `<dir_in>/<sample>_dedup.realigned/<sample>_dedup.realigned_CallableLoci.bed`
pub fn fallback_raw_bed(dir_in: &Path, sample: &str) -> PathBuf {
    let stem = format!("{}{}", sample, DEDUP_REALIGNED_SUFFIX);
    dir_in.join(&stem).join(format!("{}{}", stem, RAW_BED_SUFFIX))
}

///
/// Locate a sample's raw CallableLoci file, preferring the plain layout and
/// falling back to the `_dedup.realigned` layout. Returns `None` when neither
/// file exists.
///
pub fn resolve_raw_bed(dir_in: &Path, sample: &str) -> Option<PathBuf> {
    let preferred = preferred_raw_bed(dir_in, sample);
    if preferred.is_file() {
        return Some(preferred);
    }

    Some(fallback_raw_bed(dir_in, sample)).filter(|p| p.is_file())
}

/// Artifacts derived from the control sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlArtifacts {
    pub callable: PathBuf,
    pub autosomal: PathBuf,
}

/// Artifacts derived for one sample, in stage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleArtifacts {
    pub callable: PathBuf,
    pub intersected: PathBuf,
    pub sorted: PathBuf,
    pub merged: PathBuf,
    pub merged_autosomal: PathBuf,
    pub surveyed: PathBuf,
}

///
/// Names every artifact of an experiment under its output directory.
///
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    out_dir: PathBuf,
    control: String,
}

impl ArtifactLayout {
    pub fn new<P: Into<PathBuf>>(out_dir: P, control: &str) -> Self {
        ArtifactLayout {
            out_dir: out_dir.into(),
            control: control.to_string(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn control(&self) -> ControlArtifacts {
        ControlArtifacts {
            callable: self.callable(&self.control),
            autosomal: self
                .out_dir
                .join(format!("{}{}", self.control, CONTROL_AUTOSOMAL_SUFFIX)),
        }
    }

    pub fn sample(&self, sample: &str) -> SampleArtifacts {
        let pair = format!("{}_{}", sample, self.control);
        let paired = |suffix: &str| self.out_dir.join(format!("{}{}", pair, suffix));

        SampleArtifacts {
            callable: self.callable(sample),
            intersected: paired(INTERSECTED_SUFFIX),
            sorted: paired(SORTED_SUFFIX),
            merged: paired(MERGED_SUFFIX),
            merged_autosomal: paired(MERGED_AUTOSOMAL_SUFFIX),
            surveyed: paired(SURVEYED_SUFFIX),
        }
    }

    fn callable(&self, id: &str) -> PathBuf {
        self.out_dir.join(format!("{}{}", id, CALLABLE_SUFFIX))
    }
}
