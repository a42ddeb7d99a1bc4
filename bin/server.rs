// BoG Exposures - Web Server
// Upload, preview and download over HTTP

use anyhow::{Context, Result};
use bog_exposures::server::{router, AppState};
use bog_exposures::Settings;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match std::env::var("BOG_CONFIG") {
        Ok(path) => Settings::from_file(&path)
            .with_context(|| format!("Failed to load settings from {}", path))?,
        Err(_) => Settings::default(),
    };

    let state = AppState::new(settings).context("Invalid category configuration")?;
    let app = router(state);

    let addr = std::env::var("BOG_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   UI:  http://{}/", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
