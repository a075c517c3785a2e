use std::sync::Arc;
use std::time::Duration;

use modera_core::bus::KafkaBusProducer;
use modera_core::cache::RedisCache;
use modera_core::scorer::LogisticScorer;
use modera_core::store::PostgresTaskStore;
use modera_core::{AppState, CONFIG};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the shared [`AppState`] and serves the HTTP API until the
/// process is asked to shut down.
pub(crate) async fn serve() -> anyhow::Result<()> {
    let state = build_state().await?;

    let bind_addr = std::net::SocketAddr::from((CONFIG.server.bind_ip, CONFIG.server.listen_port));
    tracing::info!(%bind_addr, "starting moderation API");

    let router = modera_core::api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub(crate) async fn build_state() -> anyhow::Result<AppState> {
    let store = PostgresTaskStore::connect(&CONFIG.database).await?;
    let cache = RedisCache::connect(&CONFIG.cache).await?;
    let bus = KafkaBusProducer::new(&CONFIG.bus)?;
    let scorer = LogisticScorer::load_or_train(&CONFIG.scorer).await?;

    let cache = Arc::new(cache);
    Ok(AppState::new(
        Arc::new(store),
        cache.clone(),
        cache,
        Arc::new(bus),
        Arc::new(scorer),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
