use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cmd;

#[derive(Parser)]
#[command(name = "refurb")]
#[command(version, about = "Order tracking and impact portal for refurbished laptops")]
pub struct Cli {
    /// Path to portal.toml (defaults to .refurb/portal.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the portal HTTP server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a local front-end dev server)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and run migrations without starting the server
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Manage customer accounts
    Customer {
        #[command(subcommand)]
        command: CustomerCommands,
    },
    /// Manage orders
    Order {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Show the progress stages for an order status
    Progress { status: String },
    /// Show milestone progress for a cumulative impact value
    Milestone {
        value: f64,

        /// Milestone spacing (defaults to [impact] unit_size)
        #[arg(long)]
        unit_size: Option<f64>,

        /// Contribution of one laptop (defaults to [impact] per_unit_contribution)
        #[arg(long)]
        per_unit: Option<f64>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum CustomerCommands {
    /// Create a customer account
    Add {
        email: String,
        #[arg(long)]
        password: String,
        /// Display name (defaults to the part of the email before '@')
        #[arg(long)]
        name: Option<String>,
        /// Grant administrator access
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum OrderCommands {
    /// Record an order for an existing customer
    Add {
        email: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value = "1")]
        quantity: i64,
        #[arg(long, default_value = "placed")]
        status: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default portal.toml file
    Init,
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config_path = refurb_portal::config::config_path(&project_dir, cli.config.as_deref());

    match &cli.command {
        Commands::Serve { port, db_path, dev } => {
            let config = refurb_portal::config::load_layered(&config_path)?;
            cmd::cmd_serve(config, *port, db_path.clone(), *dev).await?;
        }
        Commands::InitDb { db_path } => {
            let config = refurb_portal::config::load_layered(&config_path)?;
            cmd::cmd_init_db(config, db_path.clone())?;
        }
        Commands::Customer { command } => {
            let config = refurb_portal::config::load_layered(&config_path)?;
            cmd::cmd_customer(&config, command.clone())?;
        }
        Commands::Order { command } => {
            let config = refurb_portal::config::load_layered(&config_path)?;
            cmd::cmd_order(&config, command.clone())?;
        }
        Commands::Progress { status } => cmd::cmd_progress(status)?,
        Commands::Milestone {
            value,
            unit_size,
            per_unit,
        } => {
            let config = refurb_portal::config::load_layered(&config_path)?;
            cmd::cmd_milestone(&config, *value, *unit_size, *per_unit)?;
        }
        Commands::Config { command } => cmd::cmd_config(&config_path, command.clone())?,
    }

    Ok(())
}
