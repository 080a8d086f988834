// Cashback Ranker - Web Server
// REST API with Axum over a read-only card catalog

use anyhow::{Context, Result};
use cashback_ranker::api::{router, AppState};
use cashback_ranker::{init_logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info");

    println!("🌐 Cashback Ranker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::load(&AppConfig::default_path())?;
    let catalog = config.load_catalog()?;
    println!(
        "✓ Catalog loaded: {} cards, {} rules",
        catalog.card_count(),
        catalog.rule_count()
    );

    let state = AppState::new(catalog, config.ranker());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: POST /api/recommend");
    println!("        GET  /api/cards");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
