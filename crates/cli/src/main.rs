//! forcesync command-line host.
//!
//! Plays the role of the editor host for the core library: it owns the
//! conflict workflow and the command registry, presents diffs and
//! notifications in the terminal, and runs anonymous code.

mod conflicts;
mod execute;
mod host;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use forcesync_core::commands::CommandRegistry;
use forcesync_core::config::AppConfig;
use forcesync_core::execute::Selection;
use forcesync_core::host::Host;
use forcesync_core::ConflictWorkflow;

use crate::conflicts::ConflictsAction;
use crate::host::{ConsoleHost, TerminalDiffPresenter};

/// Config file looked up in the current directory.
const LOCAL_CONFIG_FILE: &str = "forcesync.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// forcesync command-line host.
#[derive(Parser, Debug)]
#[command(
    name = "forcesync",
    version,
    about = "Detect and resolve local/remote metadata conflicts and run anonymous code"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to ./forcesync.toml,
    /// then the user config directory, then built-in defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./forcesync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// List the registered conflict command identifiers.
    Commands,

    /// Detect, inspect, and resolve conflicts.
    Conflicts {
        #[command(subcommand)]
        action: ConflictsAction,
    },

    /// Execute anonymous code from a file, a selection, or inline text.
    Execute {
        /// File to execute.
        #[arg(short, long, conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Inline code to execute.
        #[arg(long)]
        code: Option<String>,

        /// Execute only this range of --file (LINE:COL-LINE:COL, one-based).
        #[arg(long, requires = "file")]
        selection: Option<Selection>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = cli;

    match command {
        Commands::Init { output } => {
            let _guard = init_tracing(log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_init(&output)
        }
        Commands::Validate => {
            let _guard = init_tracing(log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_validate(config.as_deref())
        }
        Commands::Commands => {
            let (_config, _guard) = setup(config.as_deref(), log_level.as_deref())?;
            cmd_commands()
        }
        Commands::Conflicts { action } => {
            let (config, _guard) = setup(config.as_deref(), log_level.as_deref())?;
            let workflow =
                ConflictWorkflow::new(&config, Arc::new(TerminalDiffPresenter), console_host());
            let registry = CommandRegistry::new();
            conflicts::run(&workflow, &registry, action).await
        }
        Commands::Execute {
            file,
            code,
            selection,
        } => {
            let (config, _guard) = setup(config.as_deref(), log_level.as_deref())?;
            execute::run(&config, console_host(), file, code, selection).await
        }
    }
}

fn console_host() -> Host {
    Host::from_shared(Arc::new(ConsoleHost))
}

/// Load the configuration, then install logging at the level it asks for
/// unless `--log-level` overrides it.
fn setup(
    config_path: Option<&Path>,
    log_level: Option<&str>,
) -> Result<(AppConfig, Option<WorkerGuard>)> {
    let config = load_config(config_path)?;
    let level = log_level.unwrap_or(&config.workspace.log_level);
    let guard = init_tracing(level, config.workspace.log_file.as_deref())?;
    Ok((config, guard))
}

// ---------------------------------------------------------------------------
// Logging & config helpers
// ---------------------------------------------------------------------------

/// Install the global subscriber. With a log file, output goes through a
/// non-blocking writer whose guard must live until exit.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .init();
            Ok(None)
        }
    }
}

/// Where the configuration comes from when `--config` is absent.
fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("forcesync").join("config.toml"))
        .filter(|path| path.is_file())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).or_else(default_config_path);
    let config = match path {
        Some(path) => AppConfig::load_and_resolve(&path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => {
            let mut config = AppConfig::default();
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables")?;
            config
                .validate()
                .context("default configuration is invalid")?;
            config
        }
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, AppConfig::default_toml()).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Point [conflict] local_root / remote_root at your project");
    println!("  2. Set [execute] target_org or target_org_env for anonymous execution");
    println!(
        "  3. Validate with: forcesync validate --config {}",
        output.display()
    );
    println!("  4. Scan with: forcesync conflicts detect");

    Ok(())
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .ok_or_else(|| anyhow::anyhow!("no configuration file found; pass --config"))?;

    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(&config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    // Missing variables only warn.
    let _ = config.resolve_env_vars();
    println!("  {}", style::success("Environment variable references processed"));

    match config.validate() {
        Ok(()) => println!("  {}", style::success("All required fields are valid")),
        Err(e) => {
            println!("  {}", style::error(&format!("Validation error: {}", e)));
            anyhow::bail!("configuration validation failed");
        }
    }

    let root_state = |path: &Path| if path.is_dir() { "" } else { " (missing)" };
    println!();
    println!("Configuration summary:");
    println!(
        "  Workspace root: {}{}",
        config.workspace.root.display(),
        root_state(&config.workspace.root)
    );
    println!(
        "  Local root    : {}{}",
        config.local_root().display(),
        root_state(&config.local_root())
    );
    println!(
        "  Remote root   : {}{}",
        config.remote_root().display(),
        root_state(&config.remote_root())
    );
    println!("  Compare       : {}", config.conflict.compare);
    println!(
        "  Sync command  : {}",
        config
            .conflict
            .sync_command
            .as_ref()
            .map(|argv| argv.join(" "))
            .unwrap_or_else(|| "not set".into())
    );
    println!(
        "  Execute       : {} {}",
        config.execute.program,
        config.execute.args.join(" ")
    );
    println!(
        "  Target org    : {}",
        config.execute.target_org.as_deref().unwrap_or("default")
    );
    println!();
    println!("{}", style::success("Configuration is valid."));

    Ok(())
}

fn cmd_commands() -> Result<()> {
    let registry = CommandRegistry::new();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Command", "Description"]);
    for id in registry.ids() {
        let command = registry.lookup(id)?;
        table.add_row(vec![Cell::new(id), Cell::new(command.description())]);
    }
    debug!("listed registered commands");
    println!("{}", table);
    Ok(())
}
