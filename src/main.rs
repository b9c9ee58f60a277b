use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use usercache::config::{Config, LogFormat};
use usercache::database::Database;
use usercache::handlers::{AppState, routes};
use usercache::middleware::LoggerMiddleware;
use usercache::store::UserRepo;
use usercache::Server;

#[derive(Parser, Debug)]
#[command(name = "usercache")]
#[command(about = "User records over SQLite with a read-through cache")]
#[command(version)]
struct Args {
    /// Path to a YAML config file (default: ./usercache.yaml if present)
    #[arg(short, long, env = "USERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "USERCACHE_LISTEN_ADDR")]
    listen: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "USERCACHE_DATABASE")]
    database: Option<PathBuf>,

    /// Default log filter (RUST_LOG wins when set)
    #[arg(long, env = "USERCACHE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Args {
    fn apply(self, config: Config) -> Config {
        Config {
            listen_addr: self.listen.unwrap_or(config.listen_addr),
            database_path: self.database.unwrap_or(config.database_path),
            log_level: self.log_level.unwrap_or(config.log_level),
            log_format: self.log_format.unwrap_or(config.log_format),
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let config = args.apply(config);

    init_tracing(&config);

    let db = Database::open(&config.database_path).with_context(|| {
        format!("opening database {}", config.database_path.display())
    })?;
    let repo = Arc::new(UserRepo::new(Arc::new(db)));

    let mut router = routes(AppState::new(repo));
    router.layer(LoggerMiddleware);

    let server = Server::bind(&config.listen_addr).await?;
    server.serve(router, shutdown_signal()).await?;

    info!("server stopped");
    Ok(())
}
