// OmniCard View - Web Server
// Serves the card catalog over the JSON API

use anyhow::{Context, Result};
use clap::Parser;
use omnicard::api::{router, AppState};
use omnicard::{init_logging, load_translator, AppConfig, CatalogStore, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Parser)]
#[command(name = "omnicard-server")]
#[command(about = "Serve the card catalog over a JSON API", long_about = None)]
struct Args {
    /// Config file (JSON); missing file means defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Cleaned catalog CSV, overrides the config file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("info");

    println!("🌐 OmniCard View - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = AppConfig::load(&args.config)?;
    if let Some(catalog) = args.catalog {
        config.catalog_path = catalog;
    }
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }

    let catalog = CatalogStore::load_csv(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {:?}", config.catalog_path))?;
    println!("✓ Catalog loaded: {} cards", catalog.len());

    let translator = load_translator(&config)?;

    let state = AppState {
        catalog: Arc::new(catalog),
        translator: Arc::new(translator),
        summary_length: config.summary_length,
    };

    let app = router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "server listening");
    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/cards", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
