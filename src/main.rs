use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribe::auth::accounts;
use scribe::config::{Cli, Command, Config};
use scribe::db;
use scribe::routes;
use scribe::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::open(&config.db_path())?;

    if let Some(Command::Promote { nickname }) = &cli.command {
        let conn = pool.get()?;
        let user = accounts::promote(&conn, nickname)
            .map_err(|e| anyhow::anyhow!("Cannot promote {nickname}: {e}"))?;
        println!("{} is now an {}", user.nickname, user.role);
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        db: pool,
        config,
    };
    let app = routes::app(state);

    tracing::info!("Scribe listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
