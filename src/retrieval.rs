use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::Accession;
use crate::error::FetchError;
use crate::scratch::ScratchDir;

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_THREADS: u32 = 6;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub fasterq_dump: Option<String>,
    pub version: Option<String>,
}

/// Result of one run of the retrieval tool. The exit code is informational;
/// success is judged by the files left in the scratch directory.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub exit_code: Option<i32>,
    pub stderr: String,
}

pub trait RetrievalTool: Send + Sync {
    fn fetch(
        &self,
        accession: &Accession,
        scratch: &Path,
        threads: u32,
    ) -> Result<Invocation, FetchError>;
    fn tool_info(&self) -> ToolInfo;
}

impl<T: RetrievalTool + ?Sized> RetrievalTool for &T {
    fn fetch(
        &self,
        accession: &Accession,
        scratch: &Path,
        threads: u32,
    ) -> Result<Invocation, FetchError> {
        (**self).fetch(accession, scratch, threads)
    }

    fn tool_info(&self) -> ToolInfo {
        (**self).tool_info()
    }
}

#[derive(Debug, Clone)]
pub enum ToolStatus {
    Ready,
    Missing { message: String },
}

#[derive(Clone)]
pub struct FasterqDump {
    program: Option<PathBuf>,
}

impl FasterqDump {
    pub fn new() -> Self {
        Self {
            program: find_in_path("fasterq-dump"),
        }
    }

    /// Uses `program` as given, except that a bare name such as
    /// `fasterq-dump` is looked up on `PATH` like `Command` would.
    pub fn with_program(program: PathBuf) -> Self {
        let resolved = if is_bare_name(&program) {
            program.to_str().and_then(find_in_path)
        } else {
            None
        };
        Self {
            program: Some(resolved.unwrap_or(program)),
        }
    }

    pub fn tool_status(&self) -> ToolStatus {
        match &self.program {
            Some(path) if path.exists() => ToolStatus::Ready,
            Some(path) => ToolStatus::Missing {
                message: format!("fasterq-dump not found at {}", path.display()),
            },
            None => ToolStatus::Missing {
                message: "missing fasterq-dump (SRA Toolkit)".to_string(),
            },
        }
    }

    fn require_program(&self) -> Result<&PathBuf, FetchError> {
        self.program
            .as_ref()
            .ok_or_else(|| FetchError::MissingTool("fasterq-dump".to_string()))
    }

    pub fn args(accession: &Accession, scratch: &Path, threads: u32) -> Vec<String> {
        let dir = scratch.to_string_lossy().to_string();
        vec![
            "-O".to_string(),
            dir.clone(),
            "-t".to_string(),
            dir,
            "-e".to_string(),
            threads.to_string(),
            accession.as_str().to_string(),
        ]
    }
}

impl Default for FasterqDump {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalTool for FasterqDump {
    fn fetch(
        &self,
        accession: &Accession,
        scratch: &Path,
        threads: u32,
    ) -> Result<Invocation, FetchError> {
        let program = self.require_program()?;
        let args = Self::args(accession, scratch, threads);
        debug!(program = %program.display(), ?args, "running fasterq-dump");
        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|err| FetchError::ToolLaunch {
                tool: program.display().to_string(),
                message: err.to_string(),
            })?;
        Ok(Invocation {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            fasterq_dump: self
                .program
                .as_ref()
                .map(|path| path.display().to_string()),
            version: self
                .program
                .as_ref()
                .and_then(|path| tool_version(path, &["--version"])),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub retries: u32,
    pub threads: u32,
    /// Fail the batch when any accession yields no files, not only when
    /// nothing has been downloaded yet.
    pub strict: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            threads: DEFAULT_THREADS,
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub last: Invocation,
    pub attempts: u32,
    pub produced: bool,
}

/// Runs the tool for one accession until `<acc>.fastq` or `<acc>_1.fastq`
/// shows up in the scratch directory, at most `retries + 1` times.
pub fn fetch_with_retries<T: RetrievalTool + ?Sized>(
    tool: &T,
    accession: &Accession,
    scratch: &ScratchDir,
    threads: u32,
    retries: u32,
    sink: &dyn ProgressSink,
) -> Result<RetryOutcome, FetchError> {
    sink.event(ProgressEvent {
        message: format!("Downloading sequences of sample: {accession}..."),
        elapsed: None,
    });
    let single = accession.single_fastq();
    let forward = accession.forward_fastq();

    let mut remaining = retries;
    let mut attempts = 0;
    loop {
        let start = Instant::now();
        let last = tool.fetch(accession, scratch.path(), threads)?;
        attempts += 1;
        let produced = scratch.contains(&single) || scratch.contains(&forward);
        debug!(
            %accession,
            attempts,
            exit_code = ?last.exit_code,
            latency_ms = start.elapsed().as_millis() as u64,
            produced,
            "fasterq-dump finished"
        );
        if produced || remaining == 0 {
            return Ok(RetryOutcome {
                last,
                attempts,
                produced,
            });
        }
        remaining -= 1;
        sink.event(ProgressEvent {
            message: format!("retrying {} times", remaining + 1),
            elapsed: Some(start.elapsed()),
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessionReport {
    pub accession: String,
    pub attempts: u32,
    pub produced: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub accessions: Vec<AccessionReport>,
}

impl BatchReport {
    pub fn any_produced(&self) -> bool {
        self.accessions.iter().any(|item| item.produced)
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.accessions
            .iter()
            .filter(|item| !item.produced)
            .map(|item| item.accession.as_str())
    }
}

/// Downloads every accession in order into the scratch directory.
///
/// An accession without output is fatal while nothing else has been
/// downloaded (the tool or the network is broken). Once some accession has
/// produced files, later misses are only reported, unless `strict` is set.
pub fn fetch_all<T: RetrievalTool + ?Sized>(
    tool: &T,
    accessions: &[Accession],
    scratch: &ScratchDir,
    options: &RetrievalOptions,
    sink: &dyn ProgressSink,
) -> Result<BatchReport, FetchError> {
    let mut report = BatchReport::default();
    for accession in accessions {
        let outcome = fetch_with_retries(
            tool,
            accession,
            scratch,
            options.threads,
            options.retries,
            sink,
        )?;
        if !outcome.produced {
            if !report.any_produced() {
                return Err(FetchError::FetchFailed {
                    accession: accession.to_string(),
                    stderr: outcome.last.stderr,
                });
            }
            if options.strict {
                return Err(FetchError::MissingOutput {
                    accession: accession.to_string(),
                });
            }
            warn!(
                %accession,
                attempts = outcome.attempts,
                stderr = %outcome.last.stderr,
                "no sequences downloaded, skipping"
            );
        }
        report.accessions.push(AccessionReport {
            accession: accession.to_string(),
            attempts: outcome.attempts,
            produced: outcome.produced,
        });
    }
    Ok(report)
}

fn is_bare_name(program: &Path) -> bool {
    let mut components = program.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}
