//! Casava 1.8 layout: turning raw `fasterq-dump` output into
//! `<sample>_00_L001_R<read>_001.fastq.gz` files in single-end and
//! paired-end directories.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{CasavaName, Layout, Mate, TrailingPolicy};
use crate::error::FetchError;
use crate::fastq::{FastqReader, FastqWriter};
use crate::scratch::ScratchDir;

static FORWARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_1\.fastq\.gz$").expect("valid regex"));
static REVERSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_2\.fastq\.gz$").expect("valid regex"));
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.fastq\.gz$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    pub layout: Layout,
    pub name: CasavaName,
}

/// Maps a compressed download name to its layout and Casava name.
pub fn classify(file_name: &str) -> Result<ClassifiedFile, FetchError> {
    let (layout, mate, re) = if file_name.ends_with("_1.fastq.gz") {
        (Layout::Paired, Mate::Forward, &*FORWARD_RE)
    } else if file_name.ends_with("_2.fastq.gz") {
        (Layout::Paired, Mate::Reverse, &*REVERSE_RE)
    } else {
        (Layout::Single, Mate::Forward, &*SINGLE_RE)
    };
    let sample = re
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| FetchError::UnexpectedFilename(file_name.to_string()))?;
    Ok(ClassifiedFile {
        layout,
        name: CasavaName::new(sample, mate),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub single: Vec<CasavaName>,
    pub paired: Vec<CasavaName>,
}

/// Compresses the raw downloads, then moves each one under its Casava name
/// into the scratch `single/` or `paired/` staging directory.
pub fn process_downloads(scratch: &ScratchDir) -> Result<Classified, FetchError> {
    compress_all(scratch.path())?;

    let single_dir = scratch.single_dir();
    let paired_dir = scratch.paired_dir();
    for dir in [&single_dir, &paired_dir] {
        fs::create_dir_all(dir).map_err(|err| FetchError::io(dir, err))?;
    }

    let mut classified = Classified::default();
    for path in regular_files(scratch.path())? {
        let file_name = file_name_of(&path)?;
        let ClassifiedFile { layout, name } = classify(&file_name)?;
        let target = match layout {
            Layout::Single => single_dir.join(name.file_name()),
            Layout::Paired => paired_dir.join(name.file_name()),
        };
        debug!(from = %file_name, to = %name, %layout, "renaming download");
        fs::rename(&path, &target).map_err(|err| FetchError::io(&path, err))?;
        match layout {
            Layout::Single => classified.single.push(name),
            Layout::Paired => classified.paired.push(name),
        }
    }
    classified.single.sort();
    classified.paired.sort();
    Ok(classified)
}

/// Gzips every regular file in `dir` that is not compressed yet, replacing
/// the original like `gzip` does. Subdirectories are left alone.
pub fn compress_all(dir: &Path) -> Result<(), FetchError> {
    for path in regular_files(dir)? {
        let is_gz = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        if !is_gz {
            compress_in_place(&path)?;
        }
    }
    Ok(())
}

fn compress_in_place(path: &Path) -> Result<PathBuf, FetchError> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);
    let compression_err = |err: io::Error| FetchError::Compression {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let mut input = BufReader::new(File::open(path).map_err(compression_err)?);
    let output = File::create(&target).map_err(compression_err)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder).map_err(compression_err)?;
    encoder
        .finish()
        .and_then(|mut inner| inner.flush())
        .map_err(compression_err)?;
    fs::remove_file(path).map_err(compression_err)?;
    Ok(target)
}

fn regular_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let entries = fs::read_dir(dir).map_err(|err| FetchError::io(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FetchError::io(dir, err))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> Result<String, FetchError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| FetchError::UnexpectedFilename(path.display().to_string()))
}

/// Output directory holding Casava-named files for one layout.
#[derive(Debug, Clone)]
pub struct CasavaDir {
    root: Utf8PathBuf,
}

impl CasavaDir {
    /// Creates the directory, which must be absent or empty.
    pub fn create(root: Utf8PathBuf) -> Result<Self, FetchError> {
        let path = root.as_std_path();
        if path.exists() {
            let mut entries = fs::read_dir(path).map_err(|err| FetchError::io(path, err))?;
            if entries.next().is_some() {
                return Err(FetchError::OutputNotEmpty(path.to_path_buf()));
            }
        }
        fs::create_dir_all(path).map_err(|err| FetchError::io(path, err))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    pub fn file_path(&self, name: &CasavaName) -> Utf8PathBuf {
        self.root.join(name.file_name())
    }

    pub fn file_names(&self) -> Result<Vec<String>, FetchError> {
        let mut names = regular_files(self.root.as_std_path())?
            .iter()
            .map(|path| file_name_of(path))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    /// Writes an empty gzip file under the sentinel sample name.
    pub fn write_placeholder(&self, mate: Mate) -> Result<WrittenFile, FetchError> {
        let name = CasavaName::placeholder(mate);
        FastqWriter::create(self.file_path(&name).as_std_path())?.finish()?;
        Ok(WrittenFile {
            name: name.file_name(),
            records: 0,
            placeholder: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub name: String,
    pub records: u64,
    pub placeholder: bool,
}

/// Re-encodes each staged single-end file into `dest`.
pub fn write_single(
    staging: &Path,
    dest: &CasavaDir,
    files: &[CasavaName],
    policy: TrailingPolicy,
) -> Result<Vec<WrittenFile>, FetchError> {
    let mut written = Vec::with_capacity(files.len());
    for name in files {
        let input = staging.join(name.file_name());
        let records = crate::fastq::rewrite(&input, dest.file_path(name).as_std_path(), policy)?;
        written.push(WrittenFile {
            name: name.file_name(),
            records,
            placeholder: false,
        });
    }
    Ok(written)
}

/// Sorts the paired names and checks that they form `(R1, R2)` pairs of
/// the same sample.
pub fn pair_up(files: &[CasavaName]) -> Result<Vec<(CasavaName, CasavaName)>, FetchError> {
    let mut sorted = files.to_vec();
    sorted.sort();
    if sorted.len() % 2 != 0 {
        return Err(FetchError::PairingMismatch(format!(
            "odd number of paired files ({})",
            sorted.len()
        )));
    }
    sorted
        .chunks_exact(2)
        .map(|pair| {
            let (fwd, rev) = (&pair[0], &pair[1]);
            if fwd.sample() != rev.sample()
                || fwd.mate() != Mate::Forward
                || rev.mate() != Mate::Reverse
            {
                return Err(FetchError::PairingMismatch(format!("{fwd} and {rev}")));
            }
            Ok((fwd.clone(), rev.clone()))
        })
        .collect()
}

/// Streams each R1/R2 pair record by record into `dest`.
pub fn write_paired(
    staging: &Path,
    dest: &CasavaDir,
    files: &[CasavaName],
    policy: TrailingPolicy,
) -> Result<Vec<WrittenFile>, FetchError> {
    let mut written = Vec::with_capacity(files.len());
    for (fwd_name, rev_name) in pair_up(files)? {
        let mut fwd_in = FastqReader::open(&staging.join(fwd_name.file_name()), policy)?;
        let mut rev_in = FastqReader::open(&staging.join(rev_name.file_name()), policy)?;
        let mut fwd_out = FastqWriter::create(dest.file_path(&fwd_name).as_std_path())?;
        let mut rev_out = FastqWriter::create(dest.file_path(&rev_name).as_std_path())?;

        loop {
            match (fwd_in.next(), rev_in.next()) {
                (Some(fwd), Some(rev)) => {
                    fwd_out.write(&fwd?)?;
                    rev_out.write(&rev?)?;
                }
                (None, None) => break,
                (Some(Err(err)), None) | (None, Some(Err(err))) => return Err(err),
                (Some(Ok(_)), None) | (None, Some(Ok(_))) => {
                    warn!(
                        forward = %fwd_name,
                        reverse = %rev_name,
                        "mates have different record counts, extra records dropped"
                    );
                    break;
                }
            }
        }

        written.push(WrittenFile {
            name: fwd_name.file_name(),
            records: fwd_out.finish()?,
            placeholder: false,
        });
        written.push(WrittenFile {
            name: rev_name.file_name(),
            records: rev_out.finish()?,
            placeholder: false,
        });
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classify_by_suffix() {
        let fwd = classify("SRR1_1.fastq.gz").unwrap();
        assert_eq!(fwd.layout, Layout::Paired);
        assert_eq!(fwd.name.file_name(), "SRR1_00_L001_R1_001.fastq.gz");

        let rev = classify("SRR1_2.fastq.gz").unwrap();
        assert_eq!(rev.layout, Layout::Paired);
        assert_eq!(rev.name.file_name(), "SRR1_00_L001_R2_001.fastq.gz");

        let single = classify("SRR2.fastq.gz").unwrap();
        assert_eq!(single.layout, Layout::Single);
        assert_eq!(single.name.file_name(), "SRR2_00_L001_R1_001.fastq.gz");
    }

    #[test]
    fn classify_rejects_unknown_names() {
        assert_matches!(
            classify("SRR1.sra.gz"),
            Err(FetchError::UnexpectedFilename(_))
        );
    }

    #[test]
    fn pair_up_requires_matching_mates() {
        let pairs = pair_up(&[
            CasavaName::new("SRR2", Mate::Reverse),
            CasavaName::new("SRR1", Mate::Forward),
            CasavaName::new("SRR2", Mate::Forward),
            CasavaName::new("SRR1", Mate::Reverse),
        ])
        .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.sample(), "SRR1");
        assert_eq!(pairs[1].1, CasavaName::new("SRR2", Mate::Reverse));

        assert_matches!(
            pair_up(&[CasavaName::new("SRR1", Mate::Forward)]),
            Err(FetchError::PairingMismatch(_))
        );
        assert_matches!(
            pair_up(&[
                CasavaName::new("SRR1", Mate::Forward),
                CasavaName::new("SRR2", Mate::Reverse),
            ]),
            Err(FetchError::PairingMismatch(_))
        );
    }
}
