use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::casava::{self, CasavaDir, WrittenFile};
use crate::domain::{Accession, Mate, TrailingPolicy};
use crate::error::FetchError;
use crate::retrieval::{self, BatchReport, RetrievalOptions, RetrievalTool, ToolInfo};
use crate::scratch::ScratchDir;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub retrieval: RetrievalOptions,
    pub truncated: TrailingPolicy,
    /// Parent of the scratch directory; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub single_dir: String,
    pub paired_dir: String,
    pub single: Vec<WrittenFile>,
    pub paired: Vec<WrittenFile>,
    pub accessions: BatchReport,
    pub fetched_at: String,
    pub tool: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<T: RetrievalTool> {
    tool: T,
}

impl<T: RetrievalTool> App<T> {
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    pub fn tool_info(&self) -> ToolInfo {
        self.tool.tool_info()
    }

    /// Downloads `accessions` and writes them as Casava directories
    /// `<output>/single` and `<output>/paired`.
    ///
    /// Both directories always end up non-empty: a layout without data gets
    /// empty placeholder files for the sentinel sample.
    pub fn get_sequences(
        &self,
        accessions: &[Accession],
        output: &Utf8Path,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let single_dir = CasavaDir::create(output.join("single"))?;
        let paired_dir = CasavaDir::create(output.join("paired"))?;

        let scratch = ScratchDir::new(options.scratch_root.as_deref())?;
        info!(scratch = %scratch.path().display(), count = accessions.len(), "fetching runs");

        let report = retrieval::fetch_all(
            &self.tool,
            accessions,
            &scratch,
            &options.retrieval,
            sink,
        )?;

        sink.event(ProgressEvent {
            message: "Compressing and renaming downloaded files".to_string(),
            elapsed: Some(start.elapsed()),
        });
        let classified = casava::process_downloads(&scratch)?;

        let single = if classified.single.is_empty() {
            sink.event(ProgressEvent {
                message: "No single-read sequences available for these accessions".to_string(),
                elapsed: None,
            });
            vec![single_dir.write_placeholder(Mate::Forward)?]
        } else {
            casava::write_single(
                &scratch.single_dir(),
                &single_dir,
                &classified.single,
                options.truncated,
            )?
        };

        let paired = if classified.paired.is_empty() {
            sink.event(ProgressEvent {
                message: "No paired-end sequences available for these accessions".to_string(),
                elapsed: None,
            });
            vec![
                paired_dir.write_placeholder(Mate::Forward)?,
                paired_dir.write_placeholder(Mate::Reverse)?,
            ]
        } else {
            casava::write_paired(
                &scratch.paired_dir(),
                &paired_dir,
                &classified.paired,
                options.truncated,
            )?
        };

        sink.event(ProgressEvent {
            message: format!(
                "Wrote {} single-end and {} paired-end files",
                single.len(),
                paired.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(FetchResult {
            single_dir: single_dir.path().to_string(),
            paired_dir: paired_dir.path().to_string(),
            single,
            paired,
            accessions: report,
            fetched_at: iso_timestamp(),
            tool: format!("kira-sra/{}", env!("CARGO_PKG_VERSION")),
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
