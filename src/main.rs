// src/main.rs
use env_logger::Builder;
use log::{error, info};
use std::sync::Arc;
use stock_dashboard::api::{self, DashboardRegistry};
use stock_dashboard::config::{AppConfig, StoreKind};
use stock_dashboard::db::{DocumentStore, ScyllaStore};
use stock_dashboard::memory::MemoryStore;
use stock_dashboard::purchase::LoggingSheet;
use stock_dashboard::screens::{ChannelRouter, Route};
use tokio::sync::mpsc;
use tokio::task;

async fn navigation_worker(mut rx: mpsc::UnboundedReceiver<Route>) {
    while let Some(route) = rx.recv().await {
        info!("Navigation requested: {:?} {:?}", route.screen, route.params);
    }
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .init();

    let store: Arc<dyn DocumentStore> = match config.store {
        StoreKind::Memory => {
            info!("Using in-memory document store.");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Scylla => {
            match ScyllaStore::connect(&config.scylla_node, config.asset_poll).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to initialize database: {}", e);
                    return;
                }
            }
        }
    };

    let (router, routes_rx) = ChannelRouter::new();
    task::spawn(navigation_worker(routes_rx));

    let registry = DashboardRegistry::new(store, Arc::new(router), Arc::new(LoggingSheet));
    let api = api::routes(registry, Arc::new(config.jwt_secret.clone()));

    info!(
        "Server running on http://{}:{}",
        config.bind, config.port
    );
    warp::serve(api).run((config.bind, config.port)).await;
}
