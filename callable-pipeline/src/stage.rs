//! Idempotent stage execution.
//!
//! A stage runs only when all of its inputs exist and its output is missing or stale (or
//! regeneration is forced). Stages write into a named temporary file next to their artifact and
//! persist it into place on success, so an interrupted or failed stage never leaves a
//! half-written artifact behind.
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::errors::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ControlCallable,
    ControlAutosomal,
    Callable,
    Intersect,
    Sort,
    Merge,
    Autosomal,
    Survey,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ControlCallable => "control-callable",
            Stage::ControlAutosomal => "control-autosomal",
            Stage::Callable => "callable",
            Stage::Intersect => "intersect",
            Stage::Sort => "sort",
            Stage::Merge => "merge",
            Stage::Autosomal => "autosomal",
            Stage::Survey => "survey",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The artifact already exists and regeneration was not forced.
    UpToDate,
    /// A required input is absent, usually because an upstream stage was skipped or failed.
    MissingInput(PathBuf),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpToDate => write!(f, "output already exists"),
            SkipReason::MissingInput(path) => write!(f, "missing input {}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Ran,
    Skipped(SkipReason),
    Failed(StageError),
}

impl StageOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, StageOutcome::Ran)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct StageReport {
    pub stage: Stage,
    pub output: PathBuf,
    pub outcome: StageOutcome,
    /// A stale artifact was removed because the stage could not rebuild it.
    pub invalidated: bool,
}

impl StageReport {
    pub fn ran(&self) -> bool {
        self.outcome.ran()
    }

    /// Whether stages consuming this artifact must be rebuilt too.
    pub fn refreshes_downstream(&self) -> bool {
        self.ran() || self.invalidated
    }
}

///
/// Decide whether a stage producing `output` has to run.
///
/// # Arguments
/// - output: the stage's artifact
/// - overwrite: force regeneration of an existing artifact
pub fn should_run(output: &Path, overwrite: bool) -> bool {
    overwrite || !output.exists()
}

///
/// Whether `output` is older than any of its `inputs`. A missing output is stale;
/// inputs whose modification time cannot be read are ignored.
///
pub fn is_stale(inputs: &[&Path], output: &Path) -> bool {
    let Some(built) = modified(output) else {
        return true;
    };
    inputs
        .iter()
        .filter_map(|input| modified(input))
        .any(|changed| changed > built)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

///
/// Gates and executes stages.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct StageRunner {
    overwrite: bool,
}

impl StageRunner {
    pub fn new(overwrite: bool) -> Self {
        StageRunner { overwrite }
    }

    ///
    /// Run one stage.
    ///
    /// The action receives the temporary path it must write to. `force` marks the
    /// artifact as stale, e.g. because an upstream stage ran in this invocation.
    /// An artifact older than one of its inputs is stale as well. When a stale
    /// artifact cannot be rebuilt it is removed, so a later run regenerates it.
    ///
    /// # Arguments
    /// - stage: which stage this is
    /// - inputs: files that must exist for the stage to run
    /// - output: the stage's artifact
    /// - force: regenerate even when the artifact exists
    /// - action: produces the artifact content at the given path
    pub fn run<F>(
        &self,
        stage: Stage,
        inputs: &[&Path],
        output: &Path,
        force: bool,
        action: F,
    ) -> StageReport
    where
        F: FnOnce(&Path) -> Result<(), StageError>,
    {
        let stale = force || is_stale(inputs, output);

        let outcome = match inputs.iter().find(|input| !input.is_file()) {
            Some(missing) => StageOutcome::Skipped(SkipReason::MissingInput(missing.to_path_buf())),
            None if !should_run(output, self.overwrite || stale) => {
                StageOutcome::Skipped(SkipReason::UpToDate)
            }
            None => execute(output, action),
        };

        let invalidated = stale && !outcome.ran() && invalidate(stage, output);

        StageReport {
            stage,
            output: output.to_path_buf(),
            outcome,
            invalidated,
        }
    }
}

fn execute<F>(output: &Path, action: F) -> StageOutcome
where
    F: FnOnce(&Path) -> Result<(), StageError>,
{
    match write_atomically(output, action) {
        Ok(()) => StageOutcome::Ran,
        Err(e) => StageOutcome::Failed(e),
    }
}

/// The temporary file is deleted on drop unless it was persisted.
fn write_atomically<F>(output: &Path, action: F) -> Result<(), StageError>
where
    F: FnOnce(&Path) -> Result<(), StageError>,
{
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let scratch = NamedTempFile::new_in(dir)?;

    action(scratch.path())?;
    scratch.persist(output).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a stale artifact. Returns whether one was removed.
fn invalidate(stage: Stage, output: &Path) -> bool {
    match fs::remove_file(output) {
        Ok(()) => {
            info!("Removed stale {} artifact {}", stage, output.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove stale artifact {}: {}", output.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;
    use std::io::Write;
    use std::thread;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use rstest::*;

    struct Scratch {
        dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    impl Scratch {
        fn entries(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.bed");
        fs::write(&input, "chr1\t0\t10\n").unwrap();
        let output = dir.path().join("output.bed");
        Scratch { dir, input, output }
    }

    fn write_marker(content: &'static str) -> impl FnOnce(&Path) -> Result<(), StageError> {
        move |path| Ok(fs::write(path, content)?)
    }

    fn set_age(path: &Path, age: Duration) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    #[rstest]
    fn test_should_run(scratch: Scratch) {
        assert!(should_run(&scratch.output, false));
        assert!(!should_run(&scratch.input, false));
        assert!(should_run(&scratch.input, true));
    }

    #[rstest]
    fn test_is_stale(scratch: Scratch) {
        assert!(is_stale(&[&scratch.input], &scratch.output));

        fs::write(&scratch.output, "built").unwrap();
        set_age(&scratch.input, Duration::from_secs(3600));
        assert!(!is_stale(&[&scratch.input], &scratch.output));

        set_age(&scratch.output, Duration::from_secs(7200));
        assert!(is_stale(&[&scratch.input], &scratch.output));

        // unreadable inputs do not make an artifact stale
        let missing = scratch.input.with_file_name("absent.bed");
        assert!(!is_stale(&[&missing], &scratch.output));
    }

    #[rstest]
    fn test_runs_when_output_missing(scratch: Scratch) {
        let report = StageRunner::new(false).run(
            Stage::Sort,
            &[&scratch.input],
            &scratch.output,
            false,
            write_marker("new"),
        );

        assert!(report.ran());
        assert!(report.refreshes_downstream());
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "new");
        assert_eq!(scratch.entries(), vec!["input.bed", "output.bed"]);
    }

    #[rstest]
    fn test_up_to_date_output_is_preserved(scratch: Scratch) {
        fs::write(&scratch.output, "old").unwrap();
        set_age(&scratch.input, Duration::from_secs(3600));
        let report = StageRunner::new(false).run(
            Stage::Sort,
            &[&scratch.input],
            &scratch.output,
            false,
            write_marker("new"),
        );

        assert!(matches!(
            report.outcome,
            StageOutcome::Skipped(SkipReason::UpToDate)
        ));
        assert!(!report.refreshes_downstream());
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "old");
    }

    #[rstest]
    fn test_output_older_than_input_is_rebuilt(scratch: Scratch) {
        fs::write(&scratch.output, "old").unwrap();
        set_age(&scratch.output, Duration::from_secs(3600));

        let report = StageRunner::new(false).run(
            Stage::Sort,
            &[&scratch.input],
            &scratch.output,
            false,
            write_marker("new"),
        );

        assert!(report.ran());
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "new");
    }

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    fn test_forced_regeneration(scratch: Scratch, #[case] overwrite: bool, #[case] force: bool) {
        fs::write(&scratch.output, "old").unwrap();
        let report = StageRunner::new(overwrite).run(
            Stage::Merge,
            &[&scratch.input],
            &scratch.output,
            force,
            write_marker("new"),
        );

        assert!(report.ran());
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "new");
    }

    #[rstest]
    fn test_missing_input_skips_even_when_forced(scratch: Scratch) {
        let missing = scratch.input.with_file_name("absent.bed");
        let report = StageRunner::new(true).run(
            Stage::Intersect,
            &[&scratch.input, &missing],
            &scratch.output,
            true,
            write_marker("new"),
        );

        assert!(matches!(
            report.outcome,
            StageOutcome::Skipped(SkipReason::MissingInput(ref p)) if *p == missing
        ));
        assert!(!scratch.output.exists());
    }

    #[rstest]
    fn test_missing_input_keeps_artifact_when_not_stale(scratch: Scratch) {
        let missing = scratch.input.with_file_name("absent.bed");
        fs::write(&scratch.output, "old").unwrap();

        let report = StageRunner::new(false).run(
            Stage::Callable,
            &[&missing],
            &scratch.output,
            false,
            write_marker("new"),
        );

        assert!(report.outcome.is_skipped());
        assert!(!report.invalidated);
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "old");
    }

    #[rstest]
    fn test_failure_leaves_no_partial_artifact(scratch: Scratch) {
        let report = StageRunner::new(false).run(
            Stage::Merge,
            &[&scratch.input],
            &scratch.output,
            false,
            |path| {
                fs::write(path, "partial")?;
                Err(StageError::Io(io::Error::other("tool crashed")))
            },
        );

        assert!(report.outcome.is_failed());
        assert!(!scratch.output.exists());
        assert_eq!(scratch.entries(), vec!["input.bed"]);
    }

    #[rstest]
    fn test_failure_keeps_previous_artifact(scratch: Scratch) {
        fs::write(&scratch.output, "old").unwrap();
        let report = StageRunner::new(true).run(
            Stage::Merge,
            &[&scratch.input],
            &scratch.output,
            false,
            |_| Err(StageError::Io(io::Error::other("tool crashed"))),
        );

        assert!(report.outcome.is_failed());
        assert!(!report.invalidated);
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "old");
    }

    #[rstest]
    fn test_stale_artifact_is_removed_when_rebuild_fails(scratch: Scratch) {
        fs::write(&scratch.output, "old").unwrap();
        let report = StageRunner::new(false).run(
            Stage::Merge,
            &[&scratch.input],
            &scratch.output,
            true,
            |_| Err(StageError::Io(io::Error::other("tool crashed"))),
        );

        assert!(report.outcome.is_failed());
        assert!(report.invalidated);
        assert!(report.refreshes_downstream());
        assert!(!scratch.output.exists());
    }

    #[rstest]
    fn test_concurrent_writers_of_one_artifact(scratch: Scratch) {
        let runner = StageRunner::new(true);
        let slow_write = |path: &Path| -> Result<(), StageError> {
            let mut file = File::create(path)?;
            file.write_all(b"chr1\t0\t")?;
            thread::sleep(Duration::from_millis(200));
            file.write_all(b"10\n")?;
            Ok(())
        };

        let reports: Vec<StageReport> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        runner.run(Stage::Intersect, &[&scratch.input], &scratch.output, false, slow_write)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(reports.iter().all(|r| r.ran()));
        assert_eq!(fs::read_to_string(&scratch.output).unwrap(), "chr1\t0\t10\n");
        assert_eq!(scratch.entries(), vec!["input.bed", "output.bed"]);
    }
}
