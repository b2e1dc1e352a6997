mod api;
mod cli;
mod db;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "matchpool")]
#[command(about = "A group prediction pool for football competitions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// List groups with their participant and match counts
    Groups,
    /// Show the leaderboard for a group (by id or name)
    Standings {
        #[arg(short, long)]
        group: String,
    },
    /// Preview the provider's current fixture list
    Fixtures,
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting matchpool API server on port {}", port);
            api::serve(port).await?;
        }
        Some(Commands::Groups) => {
            cli::list_groups().await?;
        }
        Some(Commands::Standings { group }) => {
            cli::show_standings(&group).await?;
        }
        Some(Commands::Fixtures) => {
            cli::preview_fixtures().await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            db::init_database().await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting matchpool API server on port 3000");
            api::serve(3000).await?;
        }
    }

    Ok(())
}
