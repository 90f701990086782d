use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{FetchResult, ProgressEvent, ProgressSink};
use crate::retrieval::ToolInfo;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

/// Machine-readable output: silent while running, pretty JSON at the end.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_tools(info: &ToolInfo) -> io::Result<()> {
        Self::print_json(info)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output: progress through `tracing`, summary on stdout.
pub struct TextOutput;

impl TextOutput {
    pub fn print_fetch(result: &FetchResult) {
        println!("single-end: {}", result.single_dir);
        for file in &result.single {
            print_file(&file.name, file.records, file.placeholder);
        }
        println!("paired-end: {}", result.paired_dir);
        for file in &result.paired {
            print_file(&file.name, file.records, file.placeholder);
        }
        let missing = result.accessions.missing().collect::<Vec<_>>();
        if !missing.is_empty() {
            println!("no data for: {}", missing.join(", "));
        }
    }

    pub fn print_tools(info: &ToolInfo) {
        match (&info.fasterq_dump, &info.version) {
            (Some(path), Some(version)) => println!("fasterq-dump: {path} ({version})"),
            (Some(path), None) => println!("fasterq-dump: {path} (version unknown)"),
            (None, _) => println!("fasterq-dump: not found"),
        }
    }
}

fn print_file(name: &str, records: u64, placeholder: bool) {
    if placeholder {
        println!("  {name} (placeholder)");
    } else {
        println!("  {name} ({records} records)");
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}
