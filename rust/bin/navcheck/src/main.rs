//! `navcheck`: resolve a role's navigation against the permission backend.
//!
//! Usage:
//!   navcheck [--config <path>] [--token <jwt> | --grants-file <path>] <command>
//!
//! Without `--grants-file` grants are fetched from `api_base` in the config.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// POS back-office navigation checker.
#[derive(Parser, Debug)]
#[command(name = "navcheck", about = "Check role-based menu permissions")]
struct Cli {
    /// Path to the permission config file (TOML).
    #[arg(long = "config", global = true, default_value = "posadmin.toml")]
    config: PathBuf,

    /// Bearer token for the backend.
    #[arg(long = "token", global = true, env = "POSADMIN_TOKEN")]
    token: Option<String>,

    /// Read grants from a JSON file of permission records instead of the backend.
    #[arg(long = "grants-file", global = true)]
    grants_file: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List categories and submenus.
    Taxonomy,

    /// Show the routes a role can reach and where `/admin` redirects.
    Routes {
        #[arg(long)]
        role_id: String,
        /// Hierarchy level; 0 is super-admin.
        #[arg(long)]
        level: Option<i64>,
    },

    /// Check one category or submenu for a role.
    Check {
        #[arg(long)]
        role_id: String,
        #[arg(long)]
        level: Option<i64>,
        /// Category display name, e.g. "Ventas".
        #[arg(long)]
        category: String,
        /// Submenu display name, e.g. "Punto de Venta".
        #[arg(long)]
        submenu: Option<String>,
    },

    /// Replace a role's grants.
    Assign {
        #[arg(long)]
        role_id: String,
        /// `category` or `category:submenu`, e.g. `sales:Punto de Venta`. Repeatable.
        #[arg(long = "grant", required = true)]
        grants: Vec<String>,
        /// Print the records instead of saving them.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::load(
        &cli.config,
        cli.token.as_deref(),
        cli.grants_file.as_deref(),
        cli.output == "json",
    )?;

    match cli.command {
        Commands::Taxonomy => commands::taxonomy(&ctx)?,
        Commands::Routes { role_id, level } => commands::routes(&ctx, &role_id, level).await?,
        Commands::Check {
            role_id,
            level,
            category,
            submenu,
        } => {
            let allowed =
                commands::check(&ctx, &role_id, level, &category, submenu.as_deref()).await?;
            if !allowed {
                std::process::exit(1);
            }
        }
        Commands::Assign {
            role_id,
            grants,
            dry_run,
        } => commands::assign(&ctx, &role_id, &grants, dry_run).await?,
    }

    Ok(())
}
