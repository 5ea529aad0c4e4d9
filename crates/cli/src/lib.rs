use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use threadmap_indexer::{ContextValidator, IndexBuilder, IndexOptions};
use threadmap_journal::{summarize, AgentLogger};
use threadmap_protocol::{machine_block_schema, RepoLayout};

mod api;
mod config;
mod runner;

pub use api::RuntimeApi;
pub use config::{JournalConfig, ThreadmapConfig};
pub use runner::{resolve_executable, run_cycle, run_refresh};

pub(crate) fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "threadmap")]
#[command(about = "Thread relationship index and agent log tooling", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Repository root (default: nearest ancestor holding .github/copilot)
    #[arg(long, global = true, env = "THREADMAP_ROOT")]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build index.json from session context files
    Index(IndexArgs),

    /// Regenerate the runtime cache in a child process
    Refresh(RootArg),

    /// Log start, refresh, summarize, log end
    Cycle(RootArg),

    /// Summarize runtime logs into summary.json
    Summarize(RootArg),

    /// Validate one session context file
    Validate(ValidateArgs),

    /// Write or read agent log entries
    #[command(subcommand)]
    Log(LogCommand),

    /// Read the runtime cache
    #[command(subcommand)]
    Show(ShowCommand),

    /// Print the JSON Schema of the machine block
    Schema,
}

#[derive(Args)]
struct RootArg {
    /// Repository root
    #[arg(value_name = "ROOT")]
    repo_root: Option<PathBuf>,
}

#[derive(Args)]
struct IndexArgs {
    /// Write thread-map.inferred.json when relationships are inferred
    #[arg(long)]
    export_map: bool,

    /// Output directory (default: .github/copilot)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Repository root
    #[arg(value_name = "ROOT")]
    repo_root: Option<PathBuf>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Context file to validate
    file: PathBuf,

    /// Repository root
    #[arg(value_name = "ROOT")]
    repo_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum LogCommand {
    /// Append one entry to today's log
    Write(LogWriteArgs),

    /// Last entries of today's log
    Tail {
        /// Number of entries (default from threadmap.toml, else 10)
        #[arg(short)]
        n: Option<usize>,
    },

    /// Entries across all days, newest first
    Recent {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[derive(Args)]
struct LogWriteArgs {
    /// Agent name (default from threadmap.toml)
    #[arg(long)]
    agent: Option<String>,

    #[arg(long)]
    action: String,

    #[arg(long)]
    session: Option<String>,

    /// JSON value; non-objects are stored as {"value": ...}
    #[arg(long)]
    details: Option<String>,

    /// JSON value; non-objects are stored as {"value": ...}
    #[arg(long)]
    extra: Option<String>,
}

#[derive(Subcommand)]
enum ShowCommand {
    /// Thread names in the runtime index
    Threads,

    /// One thread node
    Thread { name: String },

    /// Threads reachable from NAME, nearest first
    Expand {
        name: String,

        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Sessions in the runtime index
    Sessions,

    /// Metadata of the last index run
    LastRun,

    /// Latest log summary
    Summary,
}

/// Root precedence: positional argument, `--root` / `$THREADMAP_ROOT`, nearest
/// ancestor of the working directory holding `.github/copilot`, working directory.
fn resolve_layout(positional: Option<PathBuf>, global: Option<PathBuf>) -> Result<RepoLayout> {
    if let Some(root) = positional.or(global) {
        return Ok(RepoLayout::new(root));
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let root = RepoLayout::discover_root(&cwd).unwrap_or(cwd);
    Ok(RepoLayout::new(root))
}

fn parse_json_arg(raw: Option<&str>, name: &str) -> Result<serde_json::Value> {
    match raw {
        None => Ok(serde_json::Value::Null),
        Some(text) => {
            serde_json::from_str(text).with_context(|| format!("--{name} is not valid JSON"))
        }
    }
}

pub fn main_entry() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let status = match cli.command {
        Commands::Index(args) => run_index(args, cli.root)?,
        Commands::Refresh(args) => run_refresh(&resolve_layout(args.repo_root, cli.root)?)?,
        Commands::Cycle(args) => run_cycle(&resolve_layout(args.repo_root, cli.root)?)?,
        Commands::Summarize(args) => run_summarize(&resolve_layout(args.repo_root, cli.root)?)?,
        Commands::Validate(args) => run_validate(args, cli.root)?,
        Commands::Log(cmd) => run_log(cmd, cli.root)?,
        Commands::Show(cmd) => run_show(cmd, cli.root)?,
        Commands::Schema => {
            print_stdout(&machine_block_schema()?)?;
            0
        }
    };

    Ok(ExitCode::from(u8::try_from(status).unwrap_or(1)))
}

fn run_index(args: IndexArgs, global_root: Option<PathBuf>) -> Result<i32> {
    let layout = resolve_layout(args.repo_root, global_root)?;
    let config = ThreadmapConfig::load(&layout)?;
    let options = IndexOptions {
        out_dir: args.out_dir,
        export_map: args.export_map,
        inference: config.inference,
    };

    let outcome = IndexBuilder::new(layout, options)
        .context("Failed to prepare index build")?
        .run()
        .context("Failed to build index")?;

    print_stdout(&format!(
        "Wrote {} (embedded threads); files: {:?}",
        outcome.index_path.display(),
        outcome.files_written
    ))?;
    Ok(0)
}

fn run_summarize(layout: &RepoLayout) -> Result<i32> {
    match summarize(layout).context("Failed to summarize logs")? {
        Some(summary) => {
            print_stdout("summary:")?;
            print_json(&summary)?;
        }
        None => print_stdout("no logs dir")?,
    }
    Ok(0)
}

fn run_validate(args: ValidateArgs, global_root: Option<PathBuf>) -> Result<i32> {
    let layout = resolve_layout(args.repo_root, global_root)?;
    let validator = ContextValidator::new(layout)?;
    let report = validator.validate_file(&args.file);
    for finding in &report.findings {
        print_stdout(&finding.to_string())?;
    }
    Ok(report.exit_code())
}

fn run_log(cmd: LogCommand, global_root: Option<PathBuf>) -> Result<i32> {
    let layout = resolve_layout(None, global_root)?;
    let config = ThreadmapConfig::load(&layout)?;

    match cmd {
        LogCommand::Write(args) => {
            let details = parse_json_arg(args.details.as_deref(), "details")?;
            let extra = parse_json_arg(args.extra.as_deref(), "extra")?;
            let agent = args.agent.unwrap_or(config.journal.default_agent);
            let entry = AgentLogger::new(&layout, agent)
                .try_log(args.session.as_deref(), &args.action, details, extra)
                .context("Failed to write log entry")?;
            print_json(&entry)?;
        }
        LogCommand::Tail { n } => {
            let logger = AgentLogger::new(&layout, config.journal.default_agent);
            let entries = logger.tail(n.unwrap_or(config.journal.tail))?;
            print_json(&entries)?;
        }
        LogCommand::Recent { limit } => {
            print_json(&RuntimeApi::new(layout).read_logs(limit)?)?;
        }
    }
    Ok(0)
}

fn run_show(cmd: ShowCommand, global_root: Option<PathBuf>) -> Result<i32> {
    let api = RuntimeApi::new(resolve_layout(None, global_root)?);

    match cmd {
        ShowCommand::Threads => print_json(&api.list_threads()?)?,
        ShowCommand::Thread { name } => match api.get_thread(&name)? {
            Some(node) => print_json(&node)?,
            None => {
                log::error!("Unknown thread: {name}");
                return Ok(1);
            }
        },
        ShowCommand::Expand { name, depth } => {
            let related: Vec<serde_json::Value> = api
                .expand(&name, depth)?
                .into_iter()
                .map(|r| {
                    serde_json::json!({
                        "name": r.name,
                        "distance": r.distance,
                        "via": r.via,
                        "score": r.score,
                    })
                })
                .collect();
            print_json(&related)?;
        }
        ShowCommand::Sessions => print_json(&api.sessions()?)?,
        ShowCommand::LastRun => print_json(&api.read_last_run()?)?,
        ShowCommand::Summary => print_json(&api.read_summary()?)?,
    }
    Ok(0)
}
