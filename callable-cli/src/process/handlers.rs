use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use env_logger::Env;
use log::warn;

use callable_pipeline::{PipelineConfig, RunSummary, ToolsConfig};

use super::cli::*;

///
/// Initialise logging. `RUST_LOG` wins over the verbosity flag.
///
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

pub fn run_process(matches: &ArgMatches) -> Result<()> {
    let config = build_config(matches)?;
    let verbose = config.verbose;

    let summary = callable_pipeline::run(config).context("Failed to process CallableLoci files")?;

    report_summary(&summary, verbose);
    Ok(())
}

fn build_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    let dir_in = matches
        .get_one::<PathBuf>(DIR_IN_ARG)
        .expect("An input directory is required.");
    let dir_out = matches
        .get_one::<PathBuf>(DIR_OUT_ARG)
        .expect("An output directory is required.");
    let name = matches
        .get_one::<String>(NAME_ARG)
        .expect("An experiment name is required.");
    let control = matches
        .get_one::<String>(CONTROL_ARG)
        .expect("A control sample is required.");

    let mut tools = match matches.get_one::<PathBuf>(CONFIG_ARG) {
        Some(path) => ToolsConfig::try_from(path.as_path())
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => ToolsConfig::default(),
    };
    if let Some(timeout) = matches.get_one::<u64>(TIMEOUT_ARG) {
        tools.timeout_secs = *timeout;
    }

    let threads = matches.get_one::<usize>(THREADS_ARG).copied().unwrap_or(1);

    let mut config = PipelineConfig::new(dir_in, dir_out, name, control)
        .with_verbose(matches.get_flag(VERBOSE_ARG))
        .with_overwrite(matches.get_flag(OVERWRITE_ARG))
        .with_threads(threads)
        .with_tools(tools);

    if let Some(samples) = matches.get_many::<String>(SAMPLES_ARG) {
        config = config.with_samples(samples.cloned().collect());
    }
    if let Some(vcf) = matches.get_one::<PathBuf>(VCF_ARG) {
        config = config.with_vcf(vcf);
    }

    Ok(config)
}

fn report_summary(summary: &RunSummary, verbose: bool) {
    if verbose {
        for sample in &summary.samples {
            println!(
                "{}: {} ran, {} skipped, {} failed",
                sample.sample,
                sample.ran(),
                sample.skipped(),
                sample.failed()
            );
        }
    }

    for (subject, report) in summary.failures() {
        warn!(
            "{} stage failed for {}; {} was not produced",
            report.stage,
            subject,
            report.output.display()
        );
    }
}
