use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, info};
use rayon::prelude::*;

use callable_core::utils::get_dynamic_reader;
use callable_core::{LineFilter, filter_region_list, surveyed_length, write_surveyed_length};

use crate::config::PipelineConfig;
use crate::errors::{PipelineResult, StageError};
use crate::paths::{ArtifactLayout, preferred_raw_bed, resolve_raw_bed};
use crate::samples::resolve_samples;
use crate::stage::{SkipReason, Stage, StageOutcome, StageReport, StageRunner};
use crate::tools::{Bedtools, IntervalTool};

/// Stage reports for the control sample.
#[derive(Debug)]
pub struct ControlReport {
    pub control: String,
    pub raw_bed: Option<PathBuf>,
    pub stages: Vec<StageReport>,
}

impl ControlReport {
    /// Whether the control callable file was regenerated (or dropped as stale) in this run.
    pub fn callable_refreshed(&self) -> bool {
        self.stages
            .iter()
            .any(|r| r.stage == Stage::ControlCallable && r.refreshes_downstream())
    }
}

/// Stage reports for one sample, in stage order.
#[derive(Debug)]
pub struct SampleReport {
    pub sample: String,
    pub raw_bed: Option<PathBuf>,
    pub stages: Vec<StageReport>,
}

impl SampleReport {
    pub fn ran(&self) -> usize {
        self.stages.iter().filter(|r| r.outcome.ran()).count()
    }

    pub fn skipped(&self) -> usize {
        self.stages.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.stages.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// Everything a run did.
#[derive(Debug)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub control: ControlReport,
    pub samples: Vec<SampleReport>,
}

impl RunSummary {
    /// Number of stages that executed, control included.
    pub fn executed_stages(&self) -> usize {
        self.control.stages.iter().filter(|r| r.ran()).count()
            + self.samples.iter().map(|s| s.ran()).sum::<usize>()
    }

    /// Every failed stage, with the sample (or control) it belongs to.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &StageReport)> {
        let control = self
            .control
            .stages
            .iter()
            .map(move |r| (self.control.control.as_str(), r));
        let samples = self
            .samples
            .iter()
            .flat_map(|s| s.stages.iter().map(move |r| (s.sample.as_str(), r)));

        control.chain(samples).filter(|(_, r)| r.outcome.is_failed())
    }

    pub fn sample(&self, sample: &str) -> Option<&SampleReport> {
        self.samples.iter().find(|s| s.sample == sample)
    }
}

///
/// The sample-versus-control pipeline, generic over the interval toolkit.
///
pub struct Pipeline<T: IntervalTool> {
    config: PipelineConfig,
    layout: ArtifactLayout,
    runner: StageRunner,
    tool: T,
    progress: Mutex<Box<dyn Write + Send>>,
}

impl<T: IntervalTool> Pipeline<T> {
    pub fn new(config: PipelineConfig, tool: T) -> Self {
        let layout = ArtifactLayout::new(config.output_dir(), &config.control);
        let runner = StageRunner::new(config.overwrite);

        Pipeline {
            config,
            layout,
            runner,
            tool,
            progress: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Send verbose completion lines to `writer` instead of stdout.
    pub fn with_progress<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.progress = Mutex::new(Box::new(writer));
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    ///
    /// Resolve samples, preprocess the control, then process every sample.
    ///
    /// Configuration problems are returned as errors before anything is
    /// written. Stage problems are recorded in the returned summary.
    ///
    pub fn run(&self) -> PipelineResult<RunSummary> {
        self.config.validate()?;
        let sample_ids = resolve_samples(&self.config)?;

        create_dir_all(self.layout.out_dir())?;

        let control = self.preprocess_control();
        let control_refreshed = control.callable_refreshed();

        let samples: Vec<SampleReport> = if self.config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()?;
            pool.install(|| {
                sample_ids
                    .par_iter()
                    .map(|sample| self.process_sample(sample, control_refreshed))
                    .collect()
            })
        } else {
            sample_ids
                .iter()
                .map(|sample| self.process_sample(sample, control_refreshed))
                .collect()
        };

        Ok(RunSummary {
            output_dir: self.layout.out_dir().to_path_buf(),
            control,
            samples,
        })
    }

    ///
    /// Filter the control's raw file to callable records, then to autosomal
    /// records. The autosomal artifact is kept for output compatibility; the
    /// per-sample intersection reads the callable artifact.
    ///
    pub fn preprocess_control(&self) -> ControlReport {
        let control = &self.config.control;
        let artifacts = self.layout.control();
        let raw_bed = resolve_raw_bed(&self.config.dir_in, control);

        if raw_bed.is_none() {
            info!(
                "No CallableLoci file found for control {} in {}",
                control,
                self.config.dir_in.display()
            );
        }
        let raw = raw_bed
            .clone()
            .unwrap_or_else(|| preferred_raw_bed(&self.config.dir_in, control));

        let callable = self.runner.run(
            Stage::ControlCallable,
            &[raw.as_path()],
            &artifacts.callable,
            false,
            |out| filter_file(&raw, out, LineFilter::Callable),
        );
        self.announce(control, &callable);

        let autosomal = self.runner.run(
            Stage::ControlAutosomal,
            &[artifacts.callable.as_path()],
            &artifacts.autosomal,
            callable.refreshes_downstream(),
            |out| filter_file(&artifacts.callable, out, LineFilter::Autosomal),
        );
        self.announce(control, &autosomal);

        ControlReport {
            control: control.clone(),
            raw_bed,
            stages: vec![callable, autosomal],
        }
    }

    ///
    /// Run the six per-sample stages in order. A stage is forced when an
    /// upstream artifact was regenerated or invalidated in this invocation, so
    /// refreshing one artifact refreshes everything derived from it.
    ///
    /// # Arguments
    /// - sample: sample identifier
    /// - control_refreshed: the control callable file was regenerated in this run
    pub fn process_sample(&self, sample: &str, control_refreshed: bool) -> SampleReport {
        let artifacts = self.layout.sample(sample);
        let control_callable = self.layout.control().callable;
        let raw_bed = resolve_raw_bed(&self.config.dir_in, sample);

        if raw_bed.is_none() {
            info!(
                "No CallableLoci file found for sample {} in {}; skipping",
                sample,
                self.config.dir_in.display()
            );
        }
        let raw = raw_bed
            .clone()
            .unwrap_or_else(|| preferred_raw_bed(&self.config.dir_in, sample));

        let mut stages = Vec::with_capacity(6);

        let callable = self.runner.run(
            Stage::Callable,
            &[raw.as_path()],
            &artifacts.callable,
            false,
            |out| filter_file(&raw, out, LineFilter::Callable),
        );
        self.announce(sample, &callable);
        let mut upstream_changed = callable.refreshes_downstream();
        stages.push(callable);

        let intersect = self.runner.run(
            Stage::Intersect,
            &[artifacts.callable.as_path(), control_callable.as_path()],
            &artifacts.intersected,
            upstream_changed || control_refreshed,
            |out| self.tool.intersect(&artifacts.callable, &control_callable, out),
        );
        self.announce(sample, &intersect);
        upstream_changed = intersect.refreshes_downstream();
        stages.push(intersect);

        let sort = self.runner.run(
            Stage::Sort,
            &[artifacts.intersected.as_path()],
            &artifacts.sorted,
            upstream_changed,
            |out| self.tool.sort(&artifacts.intersected, out),
        );
        self.announce(sample, &sort);
        upstream_changed = sort.refreshes_downstream();
        stages.push(sort);

        let merge = self.runner.run(
            Stage::Merge,
            &[artifacts.sorted.as_path()],
            &artifacts.merged,
            upstream_changed,
            |out| self.tool.merge(&artifacts.sorted, out),
        );
        self.announce(sample, &merge);
        upstream_changed = merge.refreshes_downstream();
        stages.push(merge);

        let autosomal = self.runner.run(
            Stage::Autosomal,
            &[artifacts.merged.as_path()],
            &artifacts.merged_autosomal,
            upstream_changed,
            |out| filter_file(&artifacts.merged, out, LineFilter::Autosomal),
        );
        self.announce(sample, &autosomal);
        upstream_changed = autosomal.refreshes_downstream();
        stages.push(autosomal);

        let survey = self.runner.run(
            Stage::Survey,
            &[artifacts.merged_autosomal.as_path()],
            &artifacts.surveyed,
            upstream_changed,
            |out| survey_file(&artifacts.merged_autosomal, out),
        );
        self.announce(sample, &survey);
        stages.push(survey);

        SampleReport {
            sample: sample.to_string(),
            raw_bed,
            stages,
        }
    }

    fn announce(&self, subject: &str, report: &StageReport) {
        match &report.outcome {
            StageOutcome::Ran => {
                let message = self.completion_message(subject, report.stage);
                debug!("{}", message);
                if self.config.verbose {
                    self.print_progress(&message);
                }
            }
            StageOutcome::Skipped(reason @ SkipReason::MissingInput(_)) => {
                info!("Skipped {} for {}: {}", report.stage, subject, reason)
            }
            StageOutcome::Skipped(reason) => {
                debug!("Skipped {} for {}: {}", report.stage, subject, reason)
            }
            StageOutcome::Failed(e) => {
                error!("Stage {} failed for {}: {}", report.stage, subject, e)
            }
        }
    }

    fn print_progress(&self, message: &str) {
        let mut progress = match self.progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(progress, "{}", message).and_then(|_| progress.flush()) {
            debug!("Could not write progress: {}", e);
        }
    }

    fn completion_message(&self, subject: &str, stage: Stage) -> String {
        let exp = &self.config.name;
        match stage {
            Stage::ControlCallable => format!("Filtered CALLABLE file for exp: {}", exp),
            Stage::ControlAutosomal => format!(
                "Filtered for autosomal regions on the CALLABLE bulk file for exp: {}",
                exp
            ),
            Stage::Callable => format!("Created CALLABLE file for sample {} in exp {}", subject, exp),
            Stage::Intersect => format!(
                "Intersected Callable bed file for sample {} in exp {} with the bulk {}",
                subject, exp, self.config.control
            ),
            Stage::Sort => format!("Sorted intersected bed for sample {} in exp {}", subject, exp),
            Stage::Merge => format!(
                "Merged overlapping regions in bed for sample {} in exp {}",
                subject, exp
            ),
            Stage::Autosomal => format!(
                "Filtered for autosomal sites for sample {} in exp {}",
                subject, exp
            ),
            Stage::Survey => format!(
                "Counted surveyed region for sample {} in exp {}",
                subject, exp
            ),
        }
    }
}

///
/// Run the full pipeline with `bedtools` as the interval toolkit.
///
pub fn run(config: PipelineConfig) -> PipelineResult<RunSummary> {
    let tool = Bedtools::from_config(&config.tools);
    Pipeline::new(config, tool).run()
}

fn filter_file(input: &Path, output: &Path, filter: LineFilter) -> Result<(), StageError> {
    let reader = get_dynamic_reader(input)?;
    let mut writer = BufWriter::new(File::create(output)?);

    let stats = filter_region_list(reader, &mut writer, filter)?;
    writer.flush()?;

    debug!(
        "{} filter kept {}/{} lines of {}",
        filter,
        stats.kept,
        stats.seen,
        input.display()
    );
    Ok(())
}

fn survey_file(input: &Path, output: &Path) -> Result<(), StageError> {
    let total = surveyed_length(get_dynamic_reader(input)?)?;

    let mut writer = File::create(output)?;
    write_surveyed_length(&mut writer, total)?;
    Ok(())
}
