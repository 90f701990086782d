//! Gzip FASTQ reading and writing.
//!
//! Records are read four lines at a time with surrounding whitespace
//! stripped, and written back as four `\n`-terminated lines. The reader owns
//! its file handle; to iterate a file again, open a new reader.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::warn;

use crate::domain::TrailingPolicy;
use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub header: String,
    pub sequence: String,
    pub quality_header: String,
    pub quality: String,
}

impl FastqRecord {
    pub fn new(
        header: impl Into<String>,
        sequence: impl Into<String>,
        quality_header: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            header: header.into(),
            sequence: sequence.into(),
            quality_header: quality_header.into(),
            quality: quality.into(),
        }
    }

    fn from_lines(mut lines: Vec<String>) -> Self {
        lines.resize(4, String::new());
        let mut it = lines.into_iter();
        Self {
            header: it.next().unwrap_or_default(),
            sequence: it.next().unwrap_or_default(),
            quality_header: it.next().unwrap_or_default(),
            quality: it.next().unwrap_or_default(),
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for field in [
            &self.header,
            &self.sequence,
            &self.quality_header,
            &self.quality,
        ] {
            out.write_all(field.as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

pub struct FastqReader<R> {
    inner: R,
    path: PathBuf,
    policy: TrailingPolicy,
    line: String,
    done: bool,
}

impl FastqReader<BufReader<MultiGzDecoder<File>>> {
    pub fn open(path: &Path, policy: TrailingPolicy) -> Result<Self, FetchError> {
        let file = File::open(path).map_err(|err| FetchError::io(path, err))?;
        Ok(Self::new(
            BufReader::new(MultiGzDecoder::new(file)),
            path,
            policy,
        ))
    }
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(inner: R, path: impl Into<PathBuf>, policy: TrailingPolicy) -> Self {
        Self {
            inner,
            path: path.into(),
            policy,
            line: String::new(),
            done: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, FetchError> {
        self.line.clear();
        let read = self
            .inner
            .read_line(&mut self.line)
            .map_err(|err| FetchError::io(&self.path, err))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim().to_string()))
    }

    fn partial_record(&mut self, lines: Vec<String>) -> Option<Result<FastqRecord, FetchError>> {
        let present = lines.len();
        match self.policy {
            TrailingPolicy::Pad => {
                warn!(
                    path = %self.path.display(),
                    lines = present,
                    "padding truncated FASTQ record"
                );
                Some(Ok(FastqRecord::from_lines(lines)))
            }
            TrailingPolicy::Skip => {
                warn!(
                    path = %self.path.display(),
                    lines = present,
                    "dropping truncated FASTQ record"
                );
                None
            }
            TrailingPolicy::Error => Some(Err(FetchError::TruncatedRecord {
                path: self.path.clone(),
                lines: present,
            })),
        }
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut lines = Vec::with_capacity(4);
        while lines.len() < 4 {
            match self.next_line() {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        match lines.len() {
            4 => Some(Ok(FastqRecord::from_lines(lines))),
            0 => {
                self.done = true;
                None
            }
            _ => {
                self.done = true;
                self.partial_record(lines)
            }
        }
    }
}

/// Gzip FASTQ output file. Call `finish`; errors raised while finishing on
/// drop are lost.
pub struct FastqWriter {
    encoder: GzEncoder<BufWriter<File>>,
    path: PathBuf,
    records: u64,
}

impl FastqWriter {
    pub fn create(path: &Path) -> Result<Self, FetchError> {
        let file = File::create(path).map_err(|err| FetchError::io(path, err))?;
        Ok(Self {
            encoder: GzEncoder::new(BufWriter::new(file), Compression::default()),
            path: path.to_path_buf(),
            records: 0,
        })
    }

    pub fn write(&mut self, record: &FastqRecord) -> Result<(), FetchError> {
        record
            .write_to(&mut self.encoder)
            .map_err(|err| FetchError::io(&self.path, err))?;
        self.records += 1;
        Ok(())
    }

    /// Writes the gzip trailer and returns the number of records written.
    pub fn finish(self) -> Result<u64, FetchError> {
        let path = self.path;
        let mut inner = self
            .encoder
            .finish()
            .map_err(|err| FetchError::io(&path, err))?;
        inner.flush().map_err(|err| FetchError::io(&path, err))?;
        Ok(self.records)
    }
}

/// Copies every record of `input` into a fresh gzip file at `output`.
pub fn rewrite(input: &Path, output: &Path, policy: TrailingPolicy) -> Result<u64, FetchError> {
    let mut writer = FastqWriter::create(output)?;
    for record in FastqReader::open(input, policy)? {
        writer.write(&record?)?;
    }
    writer.finish()
}
