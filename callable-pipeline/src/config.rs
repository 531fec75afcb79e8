use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_BEDTOOLS, DEFAULT_TIMEOUT_SECS, OUTPUT_DIR_SUFFIX, VCF_SUFFIX};
use crate::errors::{PipelineError, PipelineResult};

///
/// External tool settings, optionally loaded from a `.toml` file. Missing keys
/// fall back to their defaults.
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub bedtools: String,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            bedtools: DEFAULT_BEDTOOLS.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TryFrom<&Path> for ToolsConfig {
    type Error = PipelineError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let config = toml::from_str(&toml_str)?;
        Ok(config)
    }
}

///
/// Everything a pipeline run needs. Built once at startup and passed to every
/// component; there is no process-wide state.
///
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dir_in: PathBuf,
    pub dir_out: PathBuf,
    pub name: String,
    pub control: String,
    pub samples: Option<Vec<String>>,
    pub vcf: Option<PathBuf>,
    pub verbose: bool,
    pub overwrite: bool,
    pub threads: usize,
    pub tools: ToolsConfig,
}

impl PipelineConfig {
    ///
    /// Create a new config with default options.
    ///
    /// # Arguments
    /// - dir_in: directory holding one folder of CallableLoci output per sample
    /// - dir_out: base directory for the experiment output folder
    /// - name: experiment name
    /// - control: control (bulk) sample identifier
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        dir_in: P,
        dir_out: Q,
        name: &str,
        control: &str,
    ) -> Self {
        PipelineConfig {
            dir_in: dir_in.into(),
            dir_out: dir_out.into(),
            name: name.to_string(),
            control: control.to_string(),
            samples: None,
            vcf: None,
            verbose: false,
            overwrite: false,
            threads: 1,
            tools: ToolsConfig::default(),
        }
    }

    pub fn with_samples(mut self, samples: Vec<String>) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn with_vcf<P: Into<PathBuf>>(mut self, vcf: P) -> Self {
        self.vcf = Some(vcf.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }

    /// `<dir_in>/<name>.filtered_variants.vcf`
    pub fn default_vcf_path(&self) -> PathBuf {
        self.dir_in.join(format!("{}{}", self.name, VCF_SUFFIX))
    }

    /// `<dir_out>/<name>_CallableLoci`
    pub fn output_dir(&self) -> PathBuf {
        self.dir_out.join(format!("{}{}", self.name, OUTPUT_DIR_SUFFIX))
    }

    ///
    /// Reject settings that would make every stage fail or write outside the
    /// output directory.
    ///
    pub fn validate(&self) -> PipelineResult<()> {
        check_identifier("experiment name", &self.name)?;
        check_identifier("control sample", &self.control)?;

        if let Some(samples) = &self.samples {
            for sample in samples {
                check_identifier("sample", sample)?;
            }
        }

        if self.threads == 0 {
            return Err(PipelineError::Configuration(
                "thread count must be at least 1".to_string(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(PipelineError::Configuration(
                "tool timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }
}

/// Identifiers end up in file names, so they must be non-empty single path components.
pub(crate) fn check_identifier(kind: &str, value: &str) -> PipelineResult<()> {
    if value.is_empty() {
        return Err(PipelineError::Configuration(format!("{} is empty", kind)));
    }

    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(PipelineError::Configuration(format!(
            "{} `{}` is not a valid file name component",
            kind, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn get_test_path(file_name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../tests/data/config")
            .join(file_name)
    }

    #[rstest]
    fn test_tools_config_from_toml() {
        let config = ToolsConfig::try_from(get_test_path("tools.toml").as_path()).unwrap();

        assert_eq!(config.bedtools, "/opt/bedtools2/bin/bedtools");
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.timeout(), Duration::from_secs(600));
    }

    #[rstest]
    fn test_tools_config_missing_keys_take_defaults() {
        let config = ToolsConfig::try_from(get_test_path("partial.toml").as_path()).unwrap();

        assert_eq!(config.bedtools, DEFAULT_BEDTOOLS);
        assert_eq!(config.timeout_secs, 30);
    }

    #[rstest]
    fn test_tools_config_missing_file() {
        let result = ToolsConfig::try_from(get_test_path("missing.toml").as_path());
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[rstest]
    fn test_tools_config_invalid_toml() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("bad.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"\n").unwrap();

        let result = ToolsConfig::try_from(path.as_path());
        assert!(matches!(result, Err(PipelineError::Toml(_))));
    }

    #[rstest]
    fn test_derived_paths() {
        let config = PipelineConfig::new("/data/in", "/data/out", "exp1", "bulk");

        assert_eq!(
            config.default_vcf_path(),
            PathBuf::from("/data/in/exp1.filtered_variants.vcf")
        );
        assert_eq!(config.output_dir(), PathBuf::from("/data/out/exp1_CallableLoci"));
    }

    #[rstest]
    fn test_trailing_slash_gives_same_paths() {
        let with_slash = PipelineConfig::new("/data/in/", "/data/out/", "exp1", "bulk");
        let without = PipelineConfig::new("/data/in", "/data/out", "exp1", "bulk");

        assert_eq!(with_slash.default_vcf_path(), without.default_vcf_path());
        assert_eq!(with_slash.output_dir(), without.output_dir());
    }

    #[rstest]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::new("in", "out", "exp1", "bulk").validate().is_ok());
    }

    #[rstest]
    #[case("", "bulk")]
    #[case("exp1", "")]
    #[case("../exp1", "bulk")]
    #[case("exp1", "bulk/one")]
    #[case("exp1", "..")]
    fn test_invalid_identifiers(#[case] name: &str, #[case] control: &str) {
        let config = PipelineConfig::new("in", "out", name, control);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[rstest]
    fn test_invalid_sample_identifier() {
        let config = PipelineConfig::new("in", "out", "exp1", "bulk")
            .with_samples(vec!["cell1".to_string(), "x/y".to_string()]);
        assert!(config.validate().is_err());
    }

    #[rstest]
    fn test_zero_threads_and_timeout_rejected() {
        let config = PipelineConfig::new("in", "out", "exp1", "bulk").with_threads(0);
        assert!(config.validate().is_err());

        let tools = ToolsConfig {
            timeout_secs: 0,
            ..ToolsConfig::default()
        };
        let config = PipelineConfig::new("in", "out", "exp1", "bulk").with_tools(tools);
        assert!(config.validate().is_err());
    }
}
