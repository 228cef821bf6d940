use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use realmlog_core::file_utils::find_files_with_extension;
use realmlog_core::parsers::{parse_character_page_file, parse_session_archive};
use realmlog_core::processors::{
    day_stats, process_archives, timeline_to_json, write_turns_csv, ArchiveOutcome,
};
use realmlog_core::{ParserConfig, TracingSink};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "realmlog",
    version = "0.1.0",
    about = "Reconstruct day-by-day timelines from RealmSpeak session exports",
    long_about = None
)]
struct Cli {
    /// Parser configuration (TOML); defaults apply when omitted
    #[arg(long, global = true, env = "REALMLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Path to log file
    #[arg(long, global = true, default_value = "/tmp/realmlog.log")]
    log_file: PathBuf,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a session zip into a JSON report
    Session {
        /// Session export archive
        #[arg(long)]
        input: PathBuf,
        /// Output JSON file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Parse a single character export page
    Character {
        /// Character HTML page
        #[arg(long)]
        input: PathBuf,
        /// Output JSON file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Parse every session archive under a directory
    Batch {
        /// Directory searched recursively for archives
        #[arg(long)]
        input_dir: PathBuf,
        /// Directory receiving one JSON report per archive
        #[arg(long)]
        output_dir: PathBuf,
        /// File name pattern for archives
        #[arg(long, default_value = "*.zip")]
        pattern: String,
    },

    /// Export every character turn of a session as CSV
    ExportTurns {
        /// Session export archive
        #[arg(long)]
        input: PathBuf,
        /// Output CSV file
        #[arg(long)]
        output: PathBuf,
    },

    /// Print per-day counts for a session
    Summary {
        /// Session export archive
        #[arg(long)]
        input: PathBuf,
    },
}

fn setup_logging(verbose: u8, log_file: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(Path::new(".")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("realmlog.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<ParserConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Parser config not found: {:?}", path);
            }
            let config = ParserConfig::from_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load parser config: {}", e))?;
            info!("Loaded parser config from {:?}", path);
            Ok(config)
        }
        None => Ok(ParserConfig::default()),
    }
}

/// Write `content` to `output`, or print it when there is no output file.
async fn emit(content: String, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, content).await?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Archives under `dir` whose file name matches `pattern`.
fn find_archives(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern)
        .map_err(|e| anyhow::anyhow!("Invalid pattern {:?}: {}", pattern, e))?;
    let extension = pattern
        .as_str()
        .rsplit('.')
        .next()
        .filter(|ext| !ext.contains(['*', '?', '[']))
        .unwrap_or("zip")
        .to_string();

    let archives = find_files_with_extension(dir, &extension)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|name| pattern.matches(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    Ok(archives)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = setup_logging(cli.verbose, &cli.log_file)?;

    info!("Starting realmlog CLI");

    let config = load_config(cli.config.as_deref())?;
    let sink = TracingSink;

    match cli.command {
        Commands::Session {
            input,
            output,
            pretty,
        } => {
            if !input.exists() {
                anyhow::bail!("Session archive not found: {:?}", input);
            }
            let report = parse_session_archive(&input, &config, &sink)?;
            for failure in &report.failures {
                tracing::warn!("Failed to parse {}: {}", failure.document, failure.error);
            }
            info!(
                "Parsed {} days and {} characters from {:?}",
                report.timeline.len(),
                report.characters.len(),
                input
            );
            emit(to_json(&report, pretty)?, output.as_deref()).await?;
        }

        Commands::Character {
            input,
            output,
            pretty,
        } => {
            if !input.exists() {
                anyhow::bail!("Character page not found: {:?}", input);
            }
            let page = parse_character_page_file(&input, &config, &sink)?;
            info!(
                "Parsed character {} with {} events",
                page.character,
                page.events.len()
            );
            emit(to_json(&page, pretty)?, output.as_deref()).await?;
        }

        Commands::Batch {
            input_dir,
            output_dir,
            pattern,
        } => {
            if !input_dir.exists() {
                anyhow::bail!("Input directory not found: {:?}", input_dir);
            }
            let archives = find_archives(&input_dir, &pattern)?;
            info!("Found {} session archives", archives.len());

            let progress = ProgressBar::new(archives.len() as u64);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template("[{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta}")?
                    .progress_chars("=>-"),
            );

            let (outcomes, summary) =
                process_archives(&archives, &config, &sink, |_| progress.inc(1));
            progress.finish_and_clear();

            tokio::fs::create_dir_all(&output_dir).await?;
            for outcome in &outcomes {
                match outcome {
                    ArchiveOutcome::Parsed { archive, report } => {
                        let stem = archive
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "session".to_string());
                        let target = output_dir.join(format!("{}.json", stem));
                        tokio::fs::write(&target, to_json(report, true)?).await?;
                        info!("Parsed {:?} -> {:?}", archive, target);
                    }
                    ArchiveOutcome::Failed { archive, error } => {
                        tracing::warn!("Error for {:?}: {}", archive, error);
                    }
                }
            }

            info!("--- Summary ---");
            info!("Total processed: {}", summary.total_processed);
            info!("Parsed: {}", summary.parsed);
            info!("Failed: {}", summary.failed);
            info!("Documents failed: {}", summary.documents_failed);
            info!("Days reconstructed: {}", summary.days);
        }

        Commands::ExportTurns { input, output } => {
            if !input.exists() {
                anyhow::bail!("Session archive not found: {:?}", input);
            }
            let report = parse_session_archive(&input, &config, &sink)?;
            let mut buffer = Vec::new();
            let rows = write_turns_csv(&report.timeline, &mut buffer)?;
            tokio::fs::write(&output, buffer).await?;
            info!("Wrote {} turn rows to {:?}", rows, output);
        }

        Commands::Summary { input } => {
            if !input.exists() {
                anyhow::bail!("Session archive not found: {:?}", input);
            }
            let report = parse_session_archive(&input, &config, &sink)?;
            println!(
                "{:<16} {:>5} {:>6} {:>7} {:>7} {:>10} {:>6} {:>5}",
                "day", "roll", "turns", "actions", "blocked", "combats", "spawns", "open"
            );
            for stats in day_stats(&report.timeline) {
                let roll = stats
                    .monster_roll
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<16} {:>5} {:>6} {:>7} {:>7} {:>4}/{:<5} {:>6} {:>5}",
                    format!("Month {}, Day {}", stats.month, stats.day),
                    roll,
                    stats.turns,
                    stats.actions,
                    stats.blocked,
                    stats.meaningful_combats,
                    stats.combats,
                    stats.spawns,
                    stats.unterminated_combats
                );
            }
            for page in &report.characters {
                println!(
                    "{} ({}): {}, {} events",
                    page.character,
                    page.player,
                    page.game_length,
                    page.events.len()
                );
            }
            for failure in &report.failures {
                println!("failed: {}: {}", failure.document, failure.error);
            }
        }
    }

    info!("realmlog CLI finished");
    Ok(())
}
