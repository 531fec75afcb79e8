//! External interval tooling.
//!
//! Intersect, sort and merge are delegated to an interval toolkit. [`Bedtools`] drives the
//! `bedtools` executable with plain argument vectors (no shell) and redirects its stdout into the
//! stage's output file. Every invocation is bounded by a timeout; an expired child is killed.
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::config::ToolsConfig;
use crate::errors::StageError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

///
/// Interval algebra used by the pipeline. Implementations write their result to
/// `output`, which is always a fresh temporary file.
///
pub trait IntervalTool: Send + Sync {
    /// Regions of `a` overlapping `b`, clipped to the overlap.
    fn intersect(&self, a: &Path, b: &Path, output: &Path) -> Result<(), StageError>;

    /// Sort by chromosome, then start.
    fn sort(&self, input: &Path, output: &Path) -> Result<(), StageError>;

    /// Coalesce overlapping and book-ended regions of a sorted file.
    fn merge(&self, input: &Path, output: &Path) -> Result<(), StageError>;
}

#[derive(Debug, Clone)]
pub struct Bedtools {
    program: String,
    timeout: Duration,
}

impl Bedtools {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Bedtools {
            program: program.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Bedtools::new(&config.bedtools, config.timeout())
    }

    fn run(&self, args: &[&OsStr], output: &Path) -> Result<(), StageError> {
        run_to_file(&self.program, args, output, self.timeout)
    }
}

impl IntervalTool for Bedtools {
    fn intersect(&self, a: &Path, b: &Path, output: &Path) -> Result<(), StageError> {
        self.run(
            &[
                OsStr::new("intersect"),
                OsStr::new("-a"),
                a.as_os_str(),
                OsStr::new("-b"),
                b.as_os_str(),
            ],
            output,
        )
    }

    fn sort(&self, input: &Path, output: &Path) -> Result<(), StageError> {
        self.run(&[OsStr::new("sort"), OsStr::new("-i"), input.as_os_str()], output)
    }

    fn merge(&self, input: &Path, output: &Path) -> Result<(), StageError> {
        self.run(&[OsStr::new("merge"), OsStr::new("-i"), input.as_os_str()], output)
    }
}

///
/// Run `program` with `args`, sending its stdout to `output`.
///
/// A non-zero exit becomes [StageError::ExitStatus] carrying the captured
/// stderr; exceeding `timeout` kills the child and becomes [StageError::Timeout].
///
/// # Arguments
/// - program: executable name or path
/// - args: argument vector, passed without shell interpretation
/// - output: file receiving stdout (created or truncated)
/// - timeout: wall-clock limit for the invocation
pub fn run_to_file<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    output: &Path,
    timeout: Duration,
) -> Result<(), StageError> {
    let stdout = File::create(output)?;

    debug!(
        "Running {} {}",
        program,
        args.iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| StageError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // drain stderr concurrently so a chatty tool cannot block on a full pipe
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let status = wait_with_timeout(&mut child, timeout)?;
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    match status {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(StageError::ExitStatus {
            program: program.to_string(),
            status,
            stderr: stderr.trim().to_string(),
        }),
        None => Err(StageError::Timeout {
            program: program.to_string(),
            timeout,
        }),
    }
}

/// Wait for `child`, killing it once `timeout` has elapsed. `None` means it was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    let mut reaper = Reaper::new(child);

    loop {
        if let Some(status) = reaper.try_wait()? {
            return Ok(Some(status));
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            reaper.kill()?;
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

///
/// Kills and reaps a child that has not been observed to exit when dropped,
/// including on early returns through `?`.
///
struct Reaper<'a> {
    child: &'a mut Child,
    exited: bool,
}

impl<'a> Reaper<'a> {
    fn new(child: &'a mut Child) -> Self {
        Reaper {
            child,
            exited: false,
        }
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.exited = status.is_some();
        Ok(status)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        self.exited = true;
        Ok(())
    }
}

impl Drop for Reaper<'_> {
    fn drop(&mut self) {
        if !self.exited {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[cfg(unix)]
    #[rstest]
    fn test_stdout_goes_to_output(tempdir: tempfile::TempDir) {
        let input = tempdir.path().join("input.bed");
        let output = tempdir.path().join("output.bed");
        fs::write(&input, "chr1\t0\t10\n").unwrap();

        run_to_file("cat", &[input.as_os_str()], &output, Duration::from_secs(10)).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "chr1\t0\t10\n");
    }

    #[cfg(unix)]
    #[rstest]
    fn test_non_zero_exit(tempdir: tempfile::TempDir) {
        let output = tempdir.path().join("output.bed");
        let err = run_to_file("false", &[] as &[&str], &output, Duration::from_secs(10)).unwrap_err();

        assert!(matches!(err, StageError::ExitStatus { ref program, .. } if program == "false"));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_stderr_is_captured(tempdir: tempfile::TempDir) {
        let output = tempdir.path().join("output.bed");
        let missing = tempdir.path().join("missing.bed");
        let err = run_to_file("cat", &[missing.as_os_str()], &output, Duration::from_secs(10))
            .unwrap_err();

        match err {
            StageError::ExitStatus { stderr, .. } => assert!(stderr.contains("missing.bed")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[rstest]
    fn test_timeout_kills_child(tempdir: tempfile::TempDir) {
        let output = tempdir.path().join("output.bed");
        let started = Instant::now();
        let err = run_to_file("sleep", &["30"], &output, Duration::from_millis(200)).unwrap_err();

        assert!(matches!(err, StageError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_dropped_reaper_kills_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();

        drop(Reaper::new(&mut child));

        assert!(child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_reaper_leaves_exited_child_alone() {
        let mut child = Command::new("true").spawn().unwrap();
        {
            let mut reaper = Reaper::new(&mut child);
            while reaper.try_wait().unwrap().is_none() {
                thread::sleep(POLL_INTERVAL);
            }
        }

        assert!(child.try_wait().unwrap().unwrap().success());
    }

    #[rstest]
    fn test_missing_program(tempdir: tempfile::TempDir) {
        let output = tempdir.path().join("output.bed");
        let tool = Bedtools::new("definitely-not-bedtools-4f2c", Duration::from_secs(1));
        let err = tool.sort(&output, &output).unwrap_err();

        assert!(matches!(err, StageError::Spawn { .. }));
    }

    #[rstest]
    fn test_from_config() {
        let tool = Bedtools::from_config(&ToolsConfig {
            bedtools: "/opt/bin/bedtools".to_string(),
            timeout_secs: 12,
        });

        assert_eq!(tool.program, "/opt/bin/bedtools");
        assert_eq!(tool.timeout, Duration::from_secs(12));
    }
}
