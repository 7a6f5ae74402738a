//! SocialSpark CLI - Database migrations and integration management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ss-cli migrate
//!
//! # Seed or refresh the built-in platform descriptors
//! ss-cli platforms seed
//!
//! # List platform descriptors
//! ss-cli platforms list
//!
//! # Sync one connection now
//! ss-cli sync 0b7c...e1 --types products,orders --limit 50
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `platforms seed|list` - Manage platform descriptors
//! - `sync` - Run a sync for one connection in the foreground

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ss-cli")]
#[command(author, version, about = "SocialSpark integration CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage platform descriptors
    Platforms {
        #[command(subcommand)]
        action: PlatformsAction,
    },
    /// Sync one store connection now
    Sync {
        /// Connection id (UUID)
        connection_id: String,

        /// Comma-separated sync types (products, orders, customers).
        /// Defaults to the connection's configured types.
        #[arg(short, long, value_delimiter = ',')]
        types: Vec<String>,

        /// Page size per entity type
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum PlatformsAction {
    /// Insert or refresh the built-in platform descriptors
    Seed,
    /// Print stored platform descriptors
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Platforms { action } => match action {
            PlatformsAction::Seed => commands::platforms::seed().await?,
            PlatformsAction::List => commands::platforms::list().await?,
        },
        Commands::Sync {
            connection_id,
            types,
            limit,
        } => commands::sync::run(&connection_id, &types, limit).await?,
    }
    Ok(())
}
