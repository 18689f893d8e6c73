mod logging;

use anyhow::Result;
use api::ApiConfig;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use user::{SessionConfig, UserDatabaseConfig, UserManager};

/// Game list server - authentication and authorization backend
#[derive(Parser, Debug)]
#[command(name = "game-list-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port the HTTP API listens on
    #[arg(short, long, env = "API_PORT", default_value_t = 8080)]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "data/my_game_list.db")]
    database_path: PathBuf,

    /// Directory for rolling log files
    #[arg(long, env = "LOG_DIR", default_value = "data/logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Before the runtime spawns its workers, so the local UTC offset resolves.
    let _guard = logging::init_logging(&cli.log_dir)?;

    let result = build_runtime()?.block_on(run(cli));

    logging::log_shutdown();
    result
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

async fn run(cli: Cli) -> Result<()> {
    info!("=== Game list server starting ===");

    // A missing signing secret is fatal.
    let session_config = SessionConfig::new().map_err(|e| {
        error!("Cannot start without a token signing secret: {}", e);
        e
    })?;

    let user_manager = Arc::new(
        UserManager::new(UserDatabaseConfig::at(&cli.database_path), session_config).await?,
    );

    if !user_manager.verify_integrity().await? {
        error!("User database failed its integrity check");
        anyhow::bail!("user database integrity check failed");
    }

    api::start_server_with_config(user_manager, ApiConfig::new().with_port(cli.port))
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
