use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use doctrack::{config::AppConfig, db, routes, state::AppState, storage::LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        main_folder = %config.main_folder.display(),
        watched_folder = %config.watched_folder.display(),
        usage_type = config.usage_type.as_str(),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let storage = Arc::new(LocalStorage::new(config.main_folder.clone()));
    let addr = format!("{}:{}", config.server_host, config.server_port);

    let state = AppState::new(pool, config, storage);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
