//! Lotus Mart CLI - migrations, seed data and smoke tests.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lotus-cli migrate
//!
//! # Load categories and products from YAML
//! lotus-cli seed catalog -f data/catalog.yaml
//!
//! # Create an admin account
//! lotus-cli seed admin -e admin@lotusmart.vn -p 'a-long-password'
//!
//! # Exercise a running API
//! lotus-cli smoke --base-url http://127.0.0.1:4000
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lotus-cli")]
#[command(author, version, about = "Lotus Mart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load seed data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Check the main endpoints of a running API
    Smoke {
        /// API base URL
        #[arg(long, default_value = "http://127.0.0.1:4000")]
        base_url: String,

        /// Account to sign in with for the authenticated checks
        #[arg(short, long, requires = "password")]
        email: Option<String>,

        /// Password for `--email`
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create categories and products from a YAML file
    Catalog {
        /// Path to the catalog file
        #[arg(short, long, default_value = "data/catalog.yaml")]
        file: String,
    },
    /// Create an admin account
    Admin {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long, default_value = "Administrator")]
        name: String,
    },
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
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
            SeedTarget::Admin {
                email,
                password,
                name,
            } => {
                commands::seed::admin(&email, &password, &name).await?;
            }
        },
        Commands::Smoke {
            base_url,
            email,
            password,
        } => {
            let credentials = email.zip(password);
            commands::smoke::run(&base_url, credentials.as_ref()).await?;
        }
    }
    Ok(())
}
