use clap::{Parser, Subcommand};
use logscan::cli::browse::BrowseOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logscan")]
#[command(about = "Page backward through server-side log files", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the configured logfiles over HTTP
    Serve,
    /// List the logfiles a server exposes
    Logfiles {
        #[arg(long)]
        server: Option<String>,
    },
    /// Page through a logfile, newest rows first
    Browse {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        logfile: Option<String>,
        /// Only show rows before this time (microseconds since the epoch)
        #[arg(long)]
        until: Option<i64>,
        /// Print this many pages and exit
        #[arg(long)]
        pages: Option<usize>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries rendered rows, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Serve) => {
            logscan::cli::serve::serve(config_path).await?;
        }
        Some(Commands::Logfiles { server }) => {
            logscan::cli::logfiles::list(config_path, server).await?;
        }
        Some(Commands::Browse {
            server,
            logfile,
            until,
            pages,
        }) => {
            let options = BrowseOptions {
                server,
                logfile,
                until,
                pages,
            };
            logscan::cli::browse::browse(config_path, options).await?;
        }
        None => {
            logscan::cli::browse::browse(config_path, BrowseOptions::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logscan::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
