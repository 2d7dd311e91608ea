use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vision_board_server::app::App;

#[derive(Debug, Parser)]
#[command(name = "vision-board-server")]
#[command(about = "Generate vision board images from personal goals")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Print a signed GET URL for an object already in the bucket.
    Presign {
        key: String,
        /// Lifetime in seconds, at most 604800.
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Relocate every stored image that is not yet in the bucket.
    RelocatePending,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vision_board_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting vision-board-server");
            app.serve().await?;
        }
        Command::Presign { key, ttl_secs } => {
            let url = app.presign(&key, ttl_secs).await?;
            println!("{}", url);
        }
        Command::RelocatePending => {
            let relocated = app.relocate_pending().await?;
            info!("Processed {} pending records", relocated);
        }
    }

    Ok(())
}
