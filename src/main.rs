use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wallet_radar::app::build_app;
use wallet_radar::config::RadarConfig;
use wallet_radar::metrics::Metrics;
use wallet_radar::provider::HttpWalletProvider;
use wallet_radar::scheduler::{spawn_scheduler_loop, AdaptiveScheduler};
use wallet_radar::store::JsonFileStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RadarConfig::from_lookup(|key| std::env::var(key).ok());
    let bind = std::env::var("RADAR_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let addr: SocketAddr = bind
        .parse()
        .unwrap_or_else(|_| "0.0.0.0:8080".parse().expect("default bind addr"));

    let provider = Arc::new(HttpWalletProvider::new(&config.provider));
    let store = Arc::new(JsonFileStore::new(config.store_path.clone()));
    let metrics = Arc::new(Metrics::new());
    let scheduler = AdaptiveScheduler::new(
        config,
        provider.clone(),
        provider,
        store,
        metrics.clone(),
    );
    let _scheduler_handle = spawn_scheduler_loop(scheduler.clone());

    let app = build_app(scheduler, metrics);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener");
    tracing::info!(addr = %addr, "wallet-radar management api listening");
    axum::serve(listener, app).await.expect("server error");
}
