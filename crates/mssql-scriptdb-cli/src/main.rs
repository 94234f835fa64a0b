//! mssql-scriptdb CLI - Script SQL Server objects into re-runnable files.

use clap::{Args, Parser, Subcommand};
use mssql_scriptdb::{
    Config, ExportSummary, MssqlPool, Orchestrator, ProgressEvent, SchemaProvider, ScriptError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mssql-scriptdb")]
#[command(about = "Script SQL Server objects into idempotent deployment files")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by the export commands.
#[derive(Args)]
struct ExportArgs {
    /// Override destination folder
    #[arg(long)]
    path: Option<PathBuf>,

    /// Override source database
    #[arg(long)]
    database: Option<String>,

    /// Keep CREATE statements instead of rewriting them to ALTER
    #[arg(long)]
    force_create: bool,

    /// Omit the existence-guard headers
    #[arg(long)]
    no_headers: bool,
}

impl ExportArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.path {
            config.export.path = Some(path);
        }
        if let Some(database) = self.database {
            config.source.database = database;
        }
        if self.force_create {
            config.export.script_as_alter = false;
        }
        if self.no_headers {
            config.export.use_headers = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export every object of the selected tasks
    Export {
        /// Comma-separated task list: SPROC,TABLE,UDT,UDF,VIEW,TRIG,PS,PF
        #[arg(long)]
        tasks: Option<String>,

        #[command(flatten)]
        args: ExportArgs,
    },

    /// Export the objects named in an input list, one per line
    Script {
        /// Input list of dotted object names
        #[arg(long, short)]
        file: PathBuf,

        #[command(flatten)]
        args: ExportArgs,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ScriptError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(ScriptError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Export { tasks, args } => {
            args.apply(&mut config);
            if let Some(tasks) = tasks {
                config.export.tasks = vec![tasks];
            }
            config.validate()?;
            // Fail on a bad destination before opening any connection.
            config.export.check_destination()?;

            print_banner(cli.output_json);
            let pool = MssqlPool::new(config.source.clone()).await?;
            let (orchestrator, printer) =
                build_orchestrator(pool, &config, cli.progress, cli.output_json);

            let result = orchestrator.run().await;
            drop(orchestrator);
            let _ = printer.await;

            print_summary(&result?, cli.output_json)?;
        }

        Commands::Script { file, args } => {
            args.apply(&mut config);
            config.validate()?;

            print_banner(cli.output_json);
            let pool = MssqlPool::new(config.source.clone()).await?;
            let (orchestrator, printer) =
                build_orchestrator(pool, &config, cli.progress, cli.output_json);

            let result = orchestrator.run_input_file(&file).await;
            drop(orchestrator);
            let _ = printer.await;

            print_summary(&result?, cli.output_json)?;
        }

        Commands::HealthCheck => {
            let pool = MssqlPool::new(config.source.clone()).await?;
            let result = pool.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MSSQL): {} ({}ms)",
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref version) = result.server_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if !result.connected {
                return Err(ScriptError::pool(
                    result.error.unwrap_or_else(|| "unreachable".to_string()),
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

/// Wire the orchestrator to a progress printer task.
///
/// The printer ends once the orchestrator (and with it the sender) is dropped.
fn build_orchestrator(
    pool: MssqlPool,
    config: &Config,
    json_progress: bool,
    output_json: bool,
) -> (Orchestrator, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(64);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if json_progress {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{}", line);
                }
            } else if !output_json {
                println!("{}", event);
            }
        }
    });

    let database = pool.database().to_string();
    let source: Arc<dyn SchemaProvider> = Arc::new(pool);
    let orchestrator = Orchestrator::new(source, config.export.clone(), database).with_progress(tx);

    (orchestrator, printer)
}

fn print_banner(output_json: bool) {
    if !output_json {
        println!(
            "mssql-scriptdb {} started {}",
            env!("CARGO_PKG_VERSION"),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_summary(summary: &ExportSummary, output_json: bool) -> Result<(), ScriptError> {
    if output_json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("\nExport completed!");
    println!("  Run ID: {}", summary.run_id);
    println!("  Duration: {:.2}s", summary.duration_seconds);
    println!("  Objects written: {}", summary.objects_written);
    if summary.objects_failed > 0 {
        println!("  Failed objects: {:?}", summary.failed_objects);
    }
    if !summary.rejected_names.is_empty() {
        println!("  Rejected names:");
        for rejected in &summary.rejected_names {
            println!("    {}: {}", rejected.input, rejected.reason);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
