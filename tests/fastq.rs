use std::io::Write;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_sra_fetch::domain::TrailingPolicy;
use kira_sra_fetch::error::FetchError;
use kira_sra_fetch::fastq::{FastqReader, FastqRecord, FastqWriter, rewrite};

fn write_gz(path: &std::path::Path, text: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn read_all(path: &std::path::Path, policy: TrailingPolicy) -> Result<Vec<FastqRecord>, FetchError> {
    FastqReader::open(path, policy)?.collect()
}

#[test]
fn written_records_read_back_identically() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("reads.fastq.gz");
    let records = vec![
        FastqRecord::new("@SRR1.1 1 length=4", "ACGT", "+SRR1.1 1 length=4", "IIII"),
        FastqRecord::new("@SRR1.2 2 length=6", "NNACGT", "+", "#!IIII"),
        FastqRecord::new("@SRR1.3 3 length=1", "A", "+", "I"),
    ];

    let mut writer = FastqWriter::create(&path).unwrap();
    for record in &records {
        writer.write(record).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), 3);

    assert_eq!(read_all(&path, TrailingPolicy::Error).unwrap(), records);
    // A second reader starts over from the first record.
    assert_eq!(read_all(&path, TrailingPolicy::Error).unwrap(), records);
}

#[test]
fn rewrite_normalizes_line_endings() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.fastq.gz");
    let output = temp.path().join("out.fastq.gz");
    write_gz(&input, "@r1  \r\nACGT\r\n+\r\nIIII\r\n");

    assert_eq!(rewrite(&input, &output, TrailingPolicy::Error).unwrap(), 1);

    let mut decoded = String::new();
    let file = std::fs::File::open(&output).unwrap();
    std::io::Read::read_to_string(&mut flate2::read::GzDecoder::new(file), &mut decoded).unwrap();
    assert_eq!(decoded, "@r1\nACGT\n+\nIIII\n");
}

#[test]
fn truncated_file_follows_policy() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("short.fastq.gz");
    write_gz(&path, "@r1\nACGT\n+\nIIII\n@r2\nAC\n");

    let padded = read_all(&path, TrailingPolicy::Pad).unwrap();
    assert_eq!(padded.len(), 2);
    assert_eq!(padded[1], FastqRecord::new("@r2", "AC", "", ""));

    let skipped = read_all(&path, TrailingPolicy::Skip).unwrap();
    assert_eq!(skipped.len(), 1);

    assert_matches!(
        read_all(&path, TrailingPolicy::Error),
        Err(FetchError::TruncatedRecord { lines: 2, .. })
    );
}

#[test]
fn concatenated_gzip_members_are_read() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("multi.fastq.gz");
    let mut bytes = Vec::new();
    for text in ["@r1\nA\n+\nI\n", "@r2\nC\n+\nJ\n"] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        bytes.extend(encoder.finish().unwrap());
    }
    std::fs::write(&path, bytes).unwrap();

    let records = read_all(&path, TrailingPolicy::Error).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].header, "@r2");
}
