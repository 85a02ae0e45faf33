use seer::config::Config;
use seer::services::MarketHub;
use seer::sources::{BinanceClient, BinanceTradeFeed};
use seer::AppState;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Seer server on {}:{}", config.host, config.port);

    let source = Arc::new(BinanceClient::new(
        config.binance_api_url.clone(),
        config.binance_api_key.clone(),
    ));
    let feed = Arc::new(BinanceTradeFeed::new(config.feed.clone()));
    let hub = MarketHub::new((*config).clone(), source, feed);

    for symbol in &config.watch_symbols {
        match hub.watch(symbol).await {
            Ok(_) => info!("Watching {}", symbol),
            Err(e) => error!("Failed to watch {}: {}", symbol, e),
        }
    }

    let state = AppState {
        config: config.clone(),
        hub: hub.clone(),
    };
    let app = seer::app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Seer server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    hub.shutdown().await;
    Ok(())
}
