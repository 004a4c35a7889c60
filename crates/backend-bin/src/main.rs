use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use soundclash_backend_lib::{config::Settings, ws_router, AppState};

#[derive(Parser)]
#[command(name = "soundclash", about = "Live song-contest session server")]
struct Args {
    /// Path to the TOML settings file
    #[arg(long, default_value = "config/default.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let settings = Settings::load_from(&args.config).unwrap_or_else(|e| {
        tracing::warn!(path = %args.config, error = %e, "falling back to default settings");
        Settings::default()
    });

    let bind_addr = settings.bind_addr;
    let state = Arc::new(AppState::new(settings)?);
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
