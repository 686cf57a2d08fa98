//! Offline inspector for sc-memory dumps.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sc_memory::config::default_config_path;
use sc_memory::storage::fs_memory::{self, DumpSummary};
use sc_memory::storage::{IncidenceReport, ScStat, ScStorage, SegmentUsage};
use sc_memory::MemoryConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sc-inspect",
    version,
    about = "Inspect a persisted sc-memory repository",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "SC_MEMORY_CONFIG",
        help = "Configuration file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for reports"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Element counts of the dump.
    Stats {
        #[arg(value_name = "REPO", help = "Repository directory; overrides repo_path")]
        repo: Option<PathBuf>,
    },
    /// Check every incidence ring; exits with 2 when problems are found.
    Verify {
        #[arg(value_name = "REPO", help = "Repository directory; overrides repo_path")]
        repo: Option<PathBuf>,
    },
    /// Per-segment occupancy.
    Segments {
        #[arg(value_name = "REPO", help = "Repository directory; overrides repo_path")]
        repo: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct StatsReport {
    repo: PathBuf,
    dump: DumpSummary,
    stat: ScStat,
}

#[derive(Serialize)]
struct VerifyReport {
    repo: PathBuf,
    consistent: bool,
    #[serde(flatten)]
    incidence: IncidenceReport,
}

#[derive(Serialize)]
struct SegmentsReport {
    repo: PathBuf,
    segments: Vec<SegmentUsage>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Stats { repo } => {
            let (repo, storage, dump) = open(&config, repo)?;
            let report = StatsReport {
                repo,
                dump,
                stat: storage.stat(),
            };
            emit(cli.format, &report, print_stats_text)?;
        }
        Command::Verify { repo } => {
            let (repo, storage, _) = open(&config, repo)?;
            let incidence = storage.validate_incidence();
            let report = VerifyReport {
                repo,
                consistent: incidence.is_consistent(),
                incidence,
            };
            emit(cli.format, &report, print_verify_text)?;
            if !report.consistent {
                std::process::exit(2);
            }
        }
        Command::Segments { repo } => {
            let (repo, storage, _) = open(&config, repo)?;
            let report = SegmentsReport {
                repo,
                segments: storage.segment_usage(),
            };
            emit(cli.format, &report, print_segments_text)?;
        }
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<MemoryConfig, Box<dyn Error>> {
    if let Some(path) = explicit {
        return Ok(MemoryConfig::load(path)?);
    }
    match default_config_path() {
        Some(path) if path.is_file() => Ok(MemoryConfig::load(path)?),
        _ => Ok(MemoryConfig::default()),
    }
}

fn open(
    config: &MemoryConfig,
    repo: Option<PathBuf>,
) -> Result<(PathBuf, ScStorage, DumpSummary), Box<dyn Error>> {
    let repo = repo
        .or_else(|| config.repo_path.clone())
        .ok_or("no repository given and repo_path is not configured")?;
    if !fs_memory::dump_exists(&repo) {
        return Err(format!("no dump found in {}", repo.display()).into());
    }
    let (storage, dump) = fs_memory::load(&repo, config)?;
    Ok((repo, storage, dump))
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn print_field(name: &str, value: impl std::fmt::Display) {
    println!("  {name:.<30} {value}");
}

fn print_stats_text(report: &StatsReport) {
    println!("repository: {}", report.repo.display());
    print_field("nodes", report.stat.node_count);
    print_field("links", report.stat.link_count);
    print_field("connectors", report.stat.connector_count);
    print_field("elements", report.stat.element_count());
    print_field("segments", report.stat.segments_count);
    print_field("empty slots", report.stat.empty_slots);
    print_field("link contents", report.dump.contents);
    print_field("dump bytes", report.dump.bytes);
}

fn print_verify_text(report: &VerifyReport) {
    println!("repository: {}", report.repo.display());
    let incidence = &report.incidence;
    print_field("elements checked", incidence.elements_checked);
    print_field("connectors", incidence.connectors);
    print_field("outgoing entries", incidence.outgoing_total);
    print_field("incoming entries", incidence.incoming_total);
    if report.consistent {
        println!("status: PASS");
    } else {
        println!("status: FAIL ({} issue(s))", incidence.errors.len());
        for (i, error) in incidence.errors.iter().enumerate() {
            println!("  {}. {error}", i + 1);
        }
    }
}

fn print_segments_text(report: &SegmentsReport) {
    println!("repository: {}", report.repo.display());
    println!("  {:>6} {:>8} {:>8} {:>8}", "seg", "capacity", "engaged", "live");
    for seg in &report.segments {
        println!(
            "  {:>6} {:>8} {:>8} {:>8}",
            seg.num, seg.capacity, seg.last_engaged, seg.live
        );
    }
}
