use std::sync::Arc;

use storefront_cart::cart::state::spawn_eviction;
use storefront_cart::cart::storage::{
    FileStorage, KeyValueStorage, MemoryStorage, WriteBehindStorage,
};
use storefront_cart::cart::AppState;
use storefront_cart::checkout::{
    gateway::StorefrontClient,
    settings::{self, CheckoutConfig, CheckoutSettings},
};
use storefront_cart::config::load_app_config;
use storefront_cart::router::create_app_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let (storage, writer): (Arc<dyn KeyValueStorage>, _) = match &config.cart_storage_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "persisting carts to disk");
            let files = Arc::new(FileStorage::open(dir.clone())?);
            let writer = Arc::new(WriteBehindStorage::spawn(files)?);
            (Arc::clone(&writer) as Arc<dyn KeyValueStorage>, Some(writer))
        }
        None => {
            tracing::warn!("CART_STORAGE_DIR not set; carts are kept in memory only");
            (Arc::new(MemoryStorage::new()) as Arc<dyn KeyValueStorage>, None)
        }
    };

    let storefront = StorefrontClient::new(
        &config.storefront_api_url,
        config.storefront_site.clone(),
        config.http_timeout_secs,
    )?;

    // Checkout starts on the built-in defaults until the first fetch lands.
    let checkout_settings = CheckoutSettings::new(CheckoutConfig {
        payment_public_key: config.payment_public_key.clone(),
        ..CheckoutConfig::default()
    });
    let _refresh = settings::spawn_refresh(
        storefront.clone(),
        checkout_settings.clone(),
        config.settings_refresh,
    );

    let state = Arc::new(AppState::new(storage, checkout_settings, storefront));
    let _eviction = spawn_eviction(Arc::clone(&state), config.cart_idle);
    let app = create_app_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(writer) = writer {
        writer.flush().await?;
        tracing::info!("pending cart writes flushed");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal, starting graceful shutdown");
}
