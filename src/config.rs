use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{Accession, TrailingPolicy};
use crate::error::FetchError;
use crate::retrieval::{DEFAULT_RETRIES, DEFAULT_THREADS};

pub const DEFAULT_CONFIG_FILE: &str = "kira-sra.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub accessions: Vec<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub truncated: Option<TrailingPolicy>,
    #[serde(default)]
    pub fasterq_dump: Option<PathBuf>,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub accessions: Vec<Accession>,
    pub retries: u32,
    pub threads: u32,
    pub strict: bool,
    pub truncated: TrailingPolicy,
    pub fasterq_dump: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            accessions: Vec::new(),
            retries: DEFAULT_RETRIES,
            threads: DEFAULT_THREADS,
            strict: false,
            truncated: TrailingPolicy::default(),
            fasterq_dump: None,
            scratch_dir: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-sra.json` from the working directory.
    ///
    /// A missing default file resolves to the defaults when `required` is
    /// false, and is an error otherwise.
    pub fn resolve(path: Option<&str>, required: bool) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            if required {
                return Err(FetchError::MissingConfig);
            }
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let accessions = config
            .accessions
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<Accession>, FetchError>>()?;

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            accessions,
            retries: config.retries.unwrap_or(DEFAULT_RETRIES),
            threads: config.threads.unwrap_or(DEFAULT_THREADS),
            strict: config.strict.unwrap_or(false),
            truncated: config.truncated.unwrap_or_default(),
            fasterq_dump: config.fasterq_dump,
            scratch_dir: config.scratch_dir,
        })
    }
}
