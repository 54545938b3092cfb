use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use transponder::{
    config::{self, ScannerConfig, ServeConfig},
    logging::{self, LogConfig, LogFormat},
    scanner::Scanner,
    server::ServeOrchestrator,
    version,
};

/// Network connectivity tester
#[derive(Parser, Debug)]
#[command(
    name = "transponder",
    version,
    about = "Network connectivity tester",
    long_about = "Transponder is a continuously running multi-protocol network connectivity testing utility for Kubernetes and Istio."
)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Continuously scan servers
    Scanner {
        /// The location of the scanner's config file
        #[arg(short = 'c', long = "config-file", default_value = config::DEFAULT_CONFIG_FILE)]
        config_file: PathBuf,
    },
    /// Serve endpoints for each protocol
    Server {
        /// The port number to serve HTTP on
        #[arg(long, default_value_t = config::DEFAULT_HTTP_PORT)]
        http_port: u16,

        /// The port number to serve HTTPS on
        #[arg(long, default_value_t = config::DEFAULT_HTTPS_PORT)]
        https_port: u16,

        /// The port number to serve gRPC on
        #[arg(long, default_value_t = config::DEFAULT_GRPC_PORT)]
        grpc_port: u16,
    },
    /// Display the version
    Version {
        /// Display additional information about this build
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version { verbose } => {
            println!("{}", version::to_string(verbose));
        }
        Command::Scanner { config_file } => {
            logging::init(&LogConfig {
                format: cli.log_format,
                ..LogConfig::default()
            });
            let config = ScannerConfig::from_file(&config_file)?;
            info!("Using config file from: {}", config_file.display());
            let scanner = Scanner::new(config).context("failed to set up probes")?;
            scanner.run().await;
        }
        Command::Server {
            http_port,
            https_port,
            grpc_port,
        } => {
            logging::init(&LogConfig {
                format: cli.log_format,
                ..LogConfig::default()
            });
            let orchestrator = ServeOrchestrator::new(ServeConfig {
                http_port,
                https_port,
                grpc_port,
            })?;
            orchestrator.run().await?;
        }
    }

    Ok(())
}
