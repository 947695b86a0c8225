//! deployctl CLI
//!
//! Command-line interface for resolving the latest artifact and driving
//! deployments on a device-management server

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use deployctl_client::HttpClient;

mod commands;
mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "deployctl", version, about = "Artifact and deployment helper for device-management servers", long_about = None)]
struct Cli {
    /// Management server URL
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long, global = true)]
    skip_verify: bool,

    /// Bearer token (defaults to DEPLOYCTL_TOKEN, then the token file)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect artifacts
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
    /// Manage deployments
    Deployment {
        #[command(subcommand)]
        command: DeploymentCommands,
    },
    /// Inspect devices
    Device {
        #[command(subcommand)]
        command: DeviceCommands,
    },
    /// Ensure a device has the latest artifact version installed
    Ensure {
        /// Device hostname
        hostname: String,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ArtifactCommands {
    /// Show the artifact with the latest version
    Latest,
}

#[derive(Subcommand, Debug)]
enum DeploymentCommands {
    /// Create a deployment
    Create {
        /// Deployment name
        #[arg(short, long)]
        name: String,

        /// Artifact name
        #[arg(short, long)]
        artifact: String,

        /// Device id
        #[arg(short, long)]
        device: String,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceCommands {
    /// Get a device by hostname
    Get {
        /// Device hostname
        hostname: String,
    },
}

#[derive(Args, Debug)]
struct WaitArgs {
    /// Status checks before giving up (0 = don't wait)
    #[arg(short, long)]
    wait: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    init_logging(&config.log_level, cli.json);
    debug!(?config, "configuration loaded");

    let client = connect(&cli, &config)?;

    match cli.command {
        Commands::Artifact {
            command: ArtifactCommands::Latest,
        } => commands::latest_artifact(&client, &config.deploy.version_key).await,
        Commands::Deployment {
            command:
                DeploymentCommands::Create {
                    name,
                    artifact,
                    device,
                    wait,
                },
        } => {
            let wait = config.wait(wait.wait);
            commands::create_deployment(client, &name, &artifact, &device, wait).await
        }
        Commands::Device {
            command: DeviceCommands::Get { hostname },
        } => commands::get_device(&client, &hostname).await,
        Commands::Ensure { hostname, wait } => {
            commands::ensure(client, &hostname, config.ensure(wait.wait)).await
        }
    }
}

/// Build the API client from flags and configuration
fn connect(cli: &Cli, config: &Config) -> Result<HttpClient> {
    let server = config.server_url(cli.server.as_deref())?;
    let token = config.token(cli.token.as_deref())?;
    let skip_verify = cli.skip_verify || config.server.skip_verify;

    Ok(HttpClient::with_skip_verify(&server, token, skip_verify)?)
}

/// Log to stderr; `RUST_LOG` takes precedence over the configured level
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
