//! pipelinerun operator CLI

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pr_backend::{BackendRegistry, CreatePayload};
use pr_controller::{spawn_log_pump, Lifecycle};
use pr_core::{ClusterId, PlatformConfig, RunId, RunLabels};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prctl")]
#[command(about = "Drive pipeline runs on configured environment backends")]
struct Cli {
    /// Backends file (defaults to ~/.config/pipelinerun/backends.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured environments
    Environments,

    /// Submit a pipeline run
    Create {
        #[arg(short, long)]
        env: String,

        /// JSON create payload
        #[arg(short, long)]
        payload: PathBuf,
    },

    /// Cancel a pipeline run
    Stop {
        #[arg(short, long)]
        env: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Follow the live log of a pipeline run
    Logs {
        #[arg(short, long)]
        env: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print an archived log object
    ArchivedLog {
        #[arg(short, long)]
        env: String,

        /// Object reference recorded on the run
        #[arg(short, long)]
        object: String,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Cluster name
    #[arg(long)]
    cluster: String,

    #[arg(long)]
    cluster_id: ClusterId,

    /// Pipeline run id
    #[arg(long)]
    run: RunId,
}

impl RunArgs {
    fn labels(&self) -> RunLabels {
        RunLabels::new(self.cluster.clone(), self.cluster_id, self.run)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PlatformConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PlatformConfig::load().context("failed to load backends config")?,
    };
    let registry = Arc::new(BackendRegistry::from_config(&config));

    match cli.command {
        Commands::Environments => {
            for (name, backend) in &config.environments {
                println!("{}", name);
                println!("  event listener: {}", backend.event_listener);
                println!("  api server:     {}", backend.api_server);
                println!("  namespace:      {}", backend.namespace);
                println!("  archive:        {}", backend.archive.root.display());
            }
        }

        Commands::Create { env, payload } => {
            let content = std::fs::read_to_string(&payload)
                .with_context(|| format!("failed to read {}", payload.display()))?;
            let payload: CreatePayload = serde_json::from_str(&content)?;
            let event_id = Lifecycle::new(registry).create(&env, &payload).await?;
            println!("event id: {}", event_id);
        }

        Commands::Stop { env, run } => {
            Lifecycle::new(registry)
                .stop(&env, &run.cluster, run.cluster_id, run.run)
                .await?;
            println!("stopped {}", run.labels().object_name());
        }

        Commands::Logs { env, run } => {
            let labels = run.labels();
            let backend = registry.execution(&env).await?;
            let stream = backend.stream_log(&labels).await?;
            info!(run = %labels.object_name(), "Following log");

            let mut log = spawn_log_pump(stream, config.log.channel_capacity);
            let mut stdout = std::io::stdout().lock();
            while let Some(line) = log.recv_line().await {
                writeln!(stdout, "{}", line.render())?;
            }
            if let Some(e) = log.recv_error().await {
                return Err(e.into());
            }
        }

        Commands::ArchivedLog { env, object } => {
            let archive = registry.archive(&env).await?;
            let bytes = archive.read_log(&object).await?;
            std::io::stdout().write_all(&bytes)?;
        }
    }

    Ok(())
}
