use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use callable_core::RegionError;

/// Errors that stop a run before any sample is processed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("VCF file not found: {}", .0.display())]
    MissingVcf(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised while executing one stage. These are recorded in the stage
/// report and never abort the batch.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{program}` timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
