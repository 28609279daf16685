use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use listenbrainz_analysis::config::{AppConfig, CliConfig, FileConfig};
use listenbrainz_analysis::{pipeline, MalformedPolicy};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "listenbrainz-analysis")]
#[command(about = "Load a ListenBrainz listen log into SQLite and export activity reports")]
struct CliArgs {
    /// Path to the JSON-lines listen log.
    #[clap(value_parser = parse_path)]
    pub input: Option<PathBuf>,

    /// Path to the SQLite listen database. Defaults to ListenBrainz.db.
    #[clap(long, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// Directory the CSV reports are written to. Defaults to the current directory.
    #[clap(long, value_parser = parse_path)]
    pub output_dir: Option<PathBuf>,

    /// Day (YYYY-MM-DD, UTC) for the active users report. Defaults to 2019-03-01.
    #[clap(long)]
    pub target_date: Option<NaiveDate>,

    /// How many users the most active users report lists. Defaults to 10.
    #[clap(long)]
    pub top_users: Option<usize>,

    /// What to do with lines that are not valid listens.
    #[clap(long, value_enum)]
    pub on_malformed: Option<MalformedPolicy>,

    /// Commit every N listens instead of loading the whole log in one transaction.
    #[clap(long)]
    pub batch_size: Option<usize>,

    /// Only load and index, do not write reports.
    #[clap(long, default_value_t = false)]
    pub skip_reports: bool,

    /// Optional TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            input_path: args.input.clone(),
            db_path: args.db.clone(),
            output_dir: args.output_dir.clone(),
            target_date: args.target_date,
            top_users: args.top_users,
            on_malformed: args.on_malformed,
            batch_size: args.batch_size,
            skip_reports: args.skip_reports,
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    let summary = pipeline::run(&config)?;

    info!(
        "Done: {} listens parsed, {} skipped, {} report files written",
        summary.ingest.events_parsed,
        summary.ingest.lines_skipped,
        summary.report_files.len()
    );
    Ok(())
}
