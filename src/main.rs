use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quota_governor::{
    calculators::build_registry, config::Config, create_app, handlers::AppState,
    services::redis::RedisService, storage::create_store,
};

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quota_governor=info,tower_http=info".into());

    if config.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);
    tracing::info!(
        backend = %config.store_backend,
        port = config.port,
        handlers = ?config.handlers,
        "Loaded configuration"
    );

    let store = create_store(&config)
        .await
        .context("Failed to open quota store")?;

    let redis = match &config.redis_url {
        Some(url) => Some(
            RedisService::new(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => None,
    };

    let registry = build_registry(&config, redis.as_ref())?;
    tracing::info!(calculators = ?registry.codenames(), "Usage calculators registered");

    let mut state = AppState::new(store, registry, config.clone())?;
    if let Some(redis) = redis {
        state = state.with_redis(redis);
    }

    let report = state.sync.sync(&config.handlers).await?;
    tracing::info!(
        created = report.created.len(),
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        "Quota definitions synced"
    );

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Quota governor listening");

    axum::serve(listener, app).await?;

    Ok(())
}
