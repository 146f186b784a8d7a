// src/main.rs

use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vigil::config::CONFIG;
use vigil::server::create_router;
use vigil::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "vigil", about = "Self-repair and operational-health service")]
struct Cli {
    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    CONFIG.validate()?;

    info!("Starting vigil self-repair service");
    info!("Data dir: {}", CONFIG.data_dir);
    info!("Scan dir: {}", CONFIG.scan_dir);
    info!("Probe model: {}", CONFIG.gemini_model);
    if CONFIG.admin_access_key.is_empty() {
        info!("ADMIN_ACCESS_KEY not set - endpoints are unauthenticated");
    }

    let app_state = Arc::new(AppState::from_config(&CONFIG));
    let app = create_router(app_state);

    let host = cli.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = cli.port.unwrap_or(CONFIG.port);
    let bind_address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Server listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
