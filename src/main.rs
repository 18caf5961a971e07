use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use iamsnap::api::AdminClient;
use iamsnap::config::{self, Config};
use iamsnap::export::{self, Manifest, Outcome};
use iamsnap::resource::{self, Fetcher};
use iamsnap::sink::JsonFileSink;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Snapshot an account's identity and queue inventory
#[derive(Parser, Debug)]
#[command(name = "iamsnap", version = iamsnap::VERSION, about, long_about = None)]
struct Args {
    /// Administrative API endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory to write snapshots to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Resource to export (repeatable; default: all)
    #[arg(short, long = "resource")]
    resources: Vec<String>,

    /// Only enumerate queues whose names start with this prefix
    #[arg(long)]
    queue_prefix: Option<String>,

    /// List exportable resources and exit
    #[arg(long)]
    list_resources: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log file (default: <config dir>/iamsnap/iamsnap.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Remember the endpoint in the config file
    #[arg(long)]
    save_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = log_file.unwrap_or_else(get_log_path);

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("iamsnap {} started with log level: {:?}", iamsnap::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("iamsnap").join("iamsnap.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".iamsnap").join("iamsnap.log");
    }
    PathBuf::from("iamsnap.log")
}

fn print_resources() {
    for key in resource::get_all_resource_keys() {
        if let Some(def) = resource::get_resource(key) {
            println!("{:<36} {}", key, def.display_name);
        }
    }
}

fn print_summary(manifest: &Manifest, output: &std::path::Path) {
    for status in &manifest.resources {
        match &status.outcome {
            Outcome::Ok { items } => {
                eprintln!("ok     {:<36} {:>6} item(s)  {}ms", status.resource, items, status.elapsed_ms)
            }
            Outcome::Error { message } => eprintln!("error  {:<36} {}", status.resource, message),
        }
    }
    eprintln!("run {} written to {}", manifest.run_id, output.display());
}

async fn run(args: Args) -> Result<bool> {
    let mut config = Config::load();

    let endpoint = config.effective_endpoint(args.endpoint.as_deref());
    if args.save_config {
        config.set_endpoint(&endpoint)?;
    }

    let resources = config.effective_resources(&args.resources);
    if let Some(unknown) = resources.iter().find(|k| resource::get_resource(k).is_none()) {
        anyhow::bail!("Unknown resource: {} (see --list-resources)", unknown);
    }

    let output = config.effective_output_dir(args.output.as_deref());
    tracing::info!("Using endpoint: {}, output: {}", endpoint, output.display());

    let client = AdminClient::new(&endpoint, config::token_from_env())?;
    let fetcher = Fetcher::new(client, config.fetch_settings(args.queue_prefix.as_deref()));
    let sink = JsonFileSink::create(&output).await?;

    let manifest = export::run(&fetcher, &resources, &sink).await?;
    print_summary(&manifest, sink.dir());

    Ok(manifest.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if args.list_resources {
        print_resources();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
