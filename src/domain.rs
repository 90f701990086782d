use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Sample name used for the empty placeholder files written when a layout
/// has no data.
pub const SENTINEL_ACCESSION: &str = "xxx";

/// Run accession as understood by the retrieval tool (SRR, ERR, DRR, ...).
///
/// The value is opaque; only characters that would let it escape the
/// scratch directory are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File written by the tool for a single-end run.
    pub fn single_fastq(&self) -> String {
        format!("{}.fastq", self.0)
    }

    /// Forward-read file written by the tool for a paired-end run.
    pub fn forward_fastq(&self) -> String {
        format!("{}_1.fastq", self.0)
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed != "."
            && trimmed != ".."
            && !trimmed.contains(['/', '\\']);
        if !is_valid {
            return Err(FetchError::InvalidAccession(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mate {
    Forward,
    Reverse,
}

impl Mate {
    pub fn read_number(self) -> u8 {
        match self {
            Mate::Forward => 1,
            Mate::Reverse => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Single,
    Paired,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Single => write!(f, "single"),
            Layout::Paired => write!(f, "paired"),
        }
    }
}

/// Casava 1.8 file name: `<sample>_00_L001_R<read>_001.fastq.gz`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CasavaName {
    sample: String,
    mate: Mate,
}

impl CasavaName {
    pub fn new(sample: impl Into<String>, mate: Mate) -> Self {
        Self {
            sample: sample.into(),
            mate,
        }
    }

    pub fn placeholder(mate: Mate) -> Self {
        Self::new(SENTINEL_ACCESSION, mate)
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn mate(&self) -> Mate {
        self.mate
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CasavaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_00_L001_R{}_001.fastq.gz",
            self.sample,
            self.mate.read_number()
        )
    }
}

/// What to do with a final FASTQ record that has fewer than four lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrailingPolicy {
    /// Fill the missing fields with empty strings and log a warning.
    #[default]
    Pad,
    /// Fail with a truncated-record error.
    Error,
    /// Drop the partial record and log a warning.
    Skip,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_trims() {
        let acc: Accession = "  SRR014966 ".parse().unwrap();
        assert_eq!(acc.as_str(), "SRR014966");
        assert_eq!(acc.single_fastq(), "SRR014966.fastq");
        assert_eq!(acc.forward_fastq(), "SRR014966_1.fastq");
    }

    #[test]
    fn parse_accession_rejects_paths() {
        assert_matches!(
            "../SRR1".parse::<Accession>(),
            Err(FetchError::InvalidAccession(_))
        );
        assert_matches!("".parse::<Accession>(), Err(FetchError::InvalidAccession(_)));
        assert_matches!("..".parse::<Accession>(), Err(FetchError::InvalidAccession(_)));
    }

    #[test]
    fn casava_file_names() {
        assert_eq!(
            CasavaName::new("SRR1", Mate::Forward).file_name(),
            "SRR1_00_L001_R1_001.fastq.gz"
        );
        assert_eq!(
            CasavaName::placeholder(Mate::Reverse).file_name(),
            "xxx_00_L001_R2_001.fastq.gz"
        );
    }
}
