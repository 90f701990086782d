use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid accession: {0:?}")]
    InvalidAccession(String),

    #[error("no accessions given and no config file kira-sra.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install the SRA Toolkit and make sure fasterq-dump is on PATH"))]
    MissingTool(String),

    #[error("failed to launch {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    #[error("{accession} could not be downloaded with the following fasterq-dump error returned: {stderr}")]
    FetchFailed { accession: String, stderr: String },

    #[error("{accession} produced no sequence files after all retries")]
    MissingOutput { accession: String },

    #[error("failed to compress {path}: {message}")]
    Compression { path: PathBuf, message: String },

    #[error("unexpected file name in download directory: {0}")]
    UnexpectedFilename(String),

    #[error("paired-end files cannot be matched into R1/R2 pairs: {0}")]
    PairingMismatch(String),

    #[error("truncated FASTQ record in {path}: only {lines} of 4 lines present")]
    TruncatedRecord { path: PathBuf, lines: usize },

    #[error("output directory is not empty: {0}")]
    OutputNotEmpty(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}
