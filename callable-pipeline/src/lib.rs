//! # CallableLoci processing pipeline
//!
//! Derives, for every sample of an experiment, the regions jointly callable with a control (bulk)
//! sample and the total surveyed autosomal length. Each stage writes one artifact under
//! `<dir_out>/<name>_CallableLoci/` and is skipped when its artifact exists and is newer than its inputs, so a run can be
//! repeated safely after a partial failure.
//!
//! ```rust,no_run
//! use callable_pipeline::{PipelineConfig, run};
//!
//! # fn main() -> Result<(), callable_pipeline::PipelineError> {
//! let config = PipelineConfig::new("data/", "results/", "exp1", "bulk").with_verbose(true);
//! let summary = run(config)?;
//! println!("{} stages executed", summary.executed_stages());
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod consts;
pub mod errors;
pub mod paths;
pub mod pipeline;
pub mod samples;
pub mod stage;
pub mod tools;

pub use config::{PipelineConfig, ToolsConfig};
pub use errors::{PipelineError, PipelineResult, StageError};
pub use pipeline::{ControlReport, Pipeline, RunSummary, SampleReport, run};
pub use stage::{SkipReason, Stage, StageOutcome, StageReport};
pub use tools::{Bedtools, IntervalTool};
