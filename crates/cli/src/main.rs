mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlmig::{MigrationConfig, PoolConfig, DEFAULT_MIGRATIONS_DIR, DEFAULT_PATTERN};

#[derive(Parser, Debug)]
#[command(name = "sqlmig")]
#[command(about = "Apply ordered SQL migrations exactly once")]
#[command(version)]
struct Cli {
    /// Database connection URL (postgres://... or sqlite:...)
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Directory holding the migration scripts
    #[arg(long, env = "SQLMIG_DIR", default_value = DEFAULT_MIGRATIONS_DIR, global = true)]
    dir: PathBuf,

    /// Glob selecting migration scripts, relative to --dir
    #[arg(long, env = "SQLMIG_PATTERN", default_value = DEFAULT_PATTERN, global = true)]
    pattern: String,

    /// Maximum database connections
    #[arg(long, env = "SQLMIG_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    max_connections: u32,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, env = "SQLMIG_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run pending migrations
    Migrate,

    /// Show which migrations are applied
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new, empty migration
    New {
        /// Migration name
        name: String,
    },

    /// List migrations in run order without touching the database
    List,
}

impl Cli {
    fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::new(self.dir.clone(), self.pattern.clone())
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig::default().with_max_connections(self.max_connections)
    }

    fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--database-url (or DATABASE_URL) is required"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.json_logs)?;

    let config = cli.migration_config();
    config.validate()?;

    match &cli.command {
        Commands::Migrate => {
            commands::migrate::run(cli.database_url()?, &config, &cli.pool_config()).await?;
        }
        Commands::Status { json } => {
            commands::status::run(cli.database_url()?, &config, &cli.pool_config(), *json).await?;
        }
        Commands::New { name } => {
            let path = commands::new::create(&config.root, name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::List => {
            commands::list::run(&config)?;
        }
    }

    Ok(())
}
