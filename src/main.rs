mod config;
mod process;
mod signals;
mod status;
mod supervisor;

use clap::Parser;
use config::{ConfigError, FileConfig, Overrides, RunConfig};
use signals::ShutdownSignal;
use std::path::PathBuf;
use supervisor::Supervisor;

const DEFAULT_CONFIG_PATH: &str = "devpair.toml";
const STATUS_FILE: &str = "devpair.status";

/// Run the backend API server and the static frontend server together,
/// forwarding shutdown signals to both.
#[derive(Parser, Debug)]
#[command(name = "devpair", version, about)]
pub struct Cli {
    /// Host interface for the backend server
    #[arg(long, value_name = "HOST")]
    backend_host: Option<String>,

    /// Port for the backend server (default: env PORT or 5001)
    #[arg(long, value_name = "PORT")]
    backend_port: Option<u16>,

    /// Port for the static frontend server
    #[arg(long, value_name = "PORT")]
    frontend_port: Option<u16>,

    /// Directory served by the frontend server
    #[arg(long, value_name = "DIR")]
    frontend_dir: Option<PathBuf>,

    /// Skip launching the static frontend server
    #[arg(long)]
    skip_frontend: bool,

    /// Ask the backend server to hot-reload on source changes
    #[arg(long)]
    reload: bool,

    /// Config file path (default: devpair.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (process polling, signal delivery)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress startup banners, only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<RunConfig, ConfigError> {
    let explicit = cli.config.is_some();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let file = FileConfig::load(&path, explicit)?;
    let overrides = Overrides {
        backend_host: cli.backend_host.clone(),
        backend_port: cli.backend_port,
        frontend_port: cli.frontend_port,
        frontend_dir: cli.frontend_dir.clone(),
        skip_frontend: cli.skip_frontend,
        reload: cli.reload,
    };

    Ok(RunConfig::resolve(
        file,
        overrides,
        std::env::var("PORT").ok().as_deref(),
    ))
}

fn print_resolved(config: &RunConfig) {
    println!("devpair v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "backend:  {} {} --host {} --port {}{}",
        config.backend_command,
        config.backend_args.join(" "),
        config.backend_host,
        config.backend_port,
        if config.reload { " --reload" } else { "" }
    );
    if config.skip_frontend {
        println!("frontend: skipped");
    } else {
        println!(
            "frontend: {} {} {} (serving {})",
            config.frontend_command,
            config.frontend_args.join(" "),
            config.frontend_port,
            config.frontend_dir.display()
        );
    }
}

async fn run(cli: Cli) -> i32 {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return 1;
        }
    };

    if cli.dry_run {
        print_resolved(&config);
        return 0;
    }

    let mut shutdown = match ShutdownSignal::install() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            return 1;
        }
    };

    let mut supervisor = Supervisor::new(config, PathBuf::from(STATUS_FILE));
    match supervisor.run(&mut shutdown).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "devpair failed");
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);
    tracing::debug!(?cli, "parsed CLI arguments");

    let code = run(cli).await;
    std::process::exit(code);
}
