//! Audit Runner CLI
//!
//! Runs the HTTP service (`serve`) or a single pipeline execution from the
//! command line (`run`).

use anyhow::Result;
use audit_runner::{
    AppConfig, AuditPipeline, AuditRequest, ChromeLauncher, DriveClient,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audit-runner")]
#[command(about = "Generate SEO audit reports via headless Chrome and share them from Google Drive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (POST /run-audit)
    Serve {
        /// Listen port (overrides the PORT environment variable)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one audit from the command line and print the shareable link
    Run {
        /// Website to audit
        #[arg(short, long)]
        website: String,

        /// Requester name
        #[arg(short, long)]
        name: String,

        /// Requester email
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    let pipeline = Arc::new(AuditPipeline::new(
        Arc::new(ChromeLauncher),
        Arc::new(DriveClient::new(config.credentials.clone())?),
        config.pipeline_config(),
    ));

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            audit_runner::server::serve(pipeline, port).await?;
        }

        Commands::Run {
            website,
            name,
            email,
        } => {
            let request = AuditRequest::new(&website, &name, &email);
            info!("Running audit for: {}", request.website);
            let result = pipeline.run(&request).await?;
            println!("{}", result.shareable_link);
        }
    }

    Ok(())
}
