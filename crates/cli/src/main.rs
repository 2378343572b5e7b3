//! eTuckshop CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run the database migrations (application tables and session store)
//! etuck-cli migrate
//!
//! # Create an admin account, or promote and reset an existing one
//! etuck-cli admin create -e admin@example.com -n "Canteen Admin" -p 'a-long-password'
//!
//! # Load categories and products from a YAML file
//! etuck-cli seed catalog -f catalog.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `ETUCKSHOP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "etuck-cli")]
#[command(author, version, about = "eTuckshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password (falls back to `ETUCKSHOP_ADMIN_PASSWORD`)
        #[arg(short, long, env = "ETUCKSHOP_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert categories and products by name
    ///
    /// A running server keeps serving its cached catalog for up to 5 minutes
    /// afterwards; restart it to pick the changes up at once.
    Catalog {
        /// Path to the catalog YAML file
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&file).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_seed_help_warns_about_server_cache() {
        let mut cli = Cli::command();
        let catalog = cli
            .find_subcommand_mut("seed")
            .unwrap()
            .find_subcommand_mut("catalog")
            .unwrap();

        let help = catalog.render_long_help().to_string();

        assert!(help.contains("cached catalog"), "{help}");
    }

    #[test]
    fn test_parses_seed_catalog() {
        let cli =
            Cli::try_parse_from(["etuck-cli", "seed", "catalog", "-f", "catalog.yaml"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Seed {
                target: SeedTarget::Catalog { ref file }
            } if file == "catalog.yaml"
        ));
    }
}
