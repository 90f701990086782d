use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_sra_fetch::app::{App, FetchOptions};
use kira_sra_fetch::config::{ConfigLoader, ResolvedConfig};
use kira_sra_fetch::domain::{Accession, TrailingPolicy};
use kira_sra_fetch::error::FetchError;
use kira_sra_fetch::output::{JsonOutput, OutputMode, TextOutput};
use kira_sra_fetch::retrieval::{FasterqDump, RetrievalOptions, ToolStatus};

#[derive(Parser)]
#[command(name = "kira-sra")]
#[command(about = "Fetch SRA runs with fasterq-dump into Casava 1.8 FASTQ directories")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download runs and write single-end and paired-end Casava directories")]
    Fetch(FetchArgs),
    #[command(about = "Show the retrieval tool in use")]
    Tools(ToolsArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Run accessions (SRR/ERR/DRR); read from the config file when omitted
    accessions: Vec<String>,

    /// Directory receiving `single/` and `paired/`
    #[arg(long, short = 'o')]
    output_dir: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    /// Extra attempts per accession when no FASTQ file appears
    #[arg(long)]
    retries: Option<u32>,

    /// Threads passed to fasterq-dump
    #[arg(long)]
    threads: Option<u32>,

    /// Parent directory for the temporary download area
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Fail when any accession yields no sequences
    #[arg(long)]
    strict: bool,

    /// Handling of a final FASTQ record with fewer than four lines
    #[arg(long, value_enum)]
    truncated: Option<TrailingPolicy>,
}

#[derive(Args)]
struct ToolsArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::InvalidAccession(_)
        | FetchError::MissingConfig
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_)
        | FetchError::OutputNotEmpty(_) => 2,
        FetchError::MissingTool(_)
        | FetchError::ToolLaunch { .. }
        | FetchError::FetchFailed { .. }
        | FetchError::MissingOutput { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, output_mode),
        Commands::Tools(args) => run_tools(args, output_mode),
    }
}

fn build_tool(config: &ResolvedConfig) -> FasterqDump {
    match &config.fasterq_dump {
        Some(path) => FasterqDump::with_program(path.clone()),
        None => FasterqDump::new(),
    }
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let FetchArgs {
        accessions,
        output_dir,
        config,
        retries,
        threads,
        scratch_dir,
        strict,
        truncated,
    } = args;

    let config_required = accessions.is_empty();
    let resolved = ConfigLoader::resolve(config.as_deref(), config_required)?;

    let accessions = if accessions.is_empty() {
        resolved.accessions.clone()
    } else {
        accessions
            .iter()
            .map(|value| value.parse::<Accession>())
            .collect::<Result<Vec<_>, _>>()?
    };
    if accessions.is_empty() {
        return Err(miette::Report::msg("no accessions to fetch"));
    }

    let tool = build_tool(&resolved);
    if let ToolStatus::Missing { message } = tool.tool_status() {
        return Err(FetchError::MissingTool(message).into());
    }

    let options = FetchOptions {
        retrieval: RetrievalOptions {
            retries: retries.unwrap_or(resolved.retries),
            threads: threads.unwrap_or(resolved.threads),
            strict: strict || resolved.strict,
        },
        truncated: truncated.unwrap_or(resolved.truncated),
        scratch_root: scratch_dir.or(resolved.scratch_dir),
    };

    let app = App::new(tool);
    match output_mode {
        OutputMode::Json => {
            let result = app.get_sequences(&accessions, &output_dir, &options, &JsonOutput)?;
            JsonOutput::print_fetch(&result).into_diagnostic()?;
        }
        OutputMode::Text => {
            let result = app.get_sequences(&accessions, &output_dir, &options, &TextOutput)?;
            TextOutput::print_fetch(&result);
        }
    }
    Ok(())
}

fn run_tools(args: ToolsArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref(), false)?;
    let info = App::new(build_tool(&resolved)).tool_info();
    match output_mode {
        OutputMode::Json => JsonOutput::print_tools(&info).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_tools(&info),
    }
    Ok(())
}
