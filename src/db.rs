// src/db.rs
use crate::error::StoreError;
use crate::models::{NewAsset, SavedStock, Stock};
use crate::subscription::AssetFeed;
use async_trait::async_trait;
use log::{debug, error, info};
use scylla::{query::Query, Session, SessionBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use uuid::Uuid;

/// The remote document store the dashboard reads from and writes to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of notifications whose receivers include `receiver_id`.
    async fn count_notifications(&self, receiver_id: &str) -> Result<i64, StoreError>;

    /// Opens a live feed of the user's assets. The first delivery is the
    /// current set; every later one replaces it.
    async fn subscribe_assets(&self, user_id: &str) -> Result<AssetFeed, StoreError>;

    /// Appends an asset document and returns its id.
    async fn add_asset(&self, user_id: &str, asset: NewAsset) -> Result<String, StoreError>;
}

const KEYSPACE: &str = "stock_dashboard";

pub struct ScyllaStore {
    session: Arc<Session>,
    poll_interval: Duration,
}

impl ScyllaStore {
    pub async fn connect(node: &str, poll_interval: Duration) -> Result<Self, StoreError> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        init_schema(&session).await?;
        info!("Successfully connected to ScyllaDB at {}.", node);
        Ok(ScyllaStore {
            session: Arc::new(session),
            poll_interval,
        })
    }
}

async fn init_schema(session: &Session) -> Result<(), StoreError> {
    let statements = [
        format!("CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = {{'class': 'SimpleStrategy', 'replication_factor': 1}}", KEYSPACE),
        format!("CREATE TABLE IF NOT EXISTS {}.notifications (id TEXT PRIMARY KEY, receiver_ids LIST<TEXT>)", KEYSPACE),
        format!("CREATE INDEX IF NOT EXISTS ON {}.notifications (receiver_ids)", KEYSPACE),
        format!("CREATE TABLE IF NOT EXISTS {}.assets (user_id TEXT, doc_id TEXT, stock TEXT, amount DOUBLE, PRIMARY KEY (user_id, doc_id))", KEYSPACE),
    ];
    for statement in statements.iter() {
        session
            .query(statement.as_str(), &[])
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
    }
    Ok(())
}

async fn load_assets(session: &Session, user_id: &str) -> Result<Vec<SavedStock>, StoreError> {
    let query = Query::new(format!(
        "SELECT doc_id, stock, amount FROM {}.assets WHERE user_id = ?",
        KEYSPACE
    ));
    let result = session
        .query(query, (user_id,))
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

    let mut assets = Vec::new();
    for row in result.rows.unwrap_or_default() {
        let doc_id = row.columns[0].as_ref().and_then(|v| v.as_text());
        let stock_json = row.columns[1].as_ref().and_then(|v| v.as_text());
        let amount = row.columns[2].as_ref().and_then(|v| v.as_double());
        match (doc_id, stock_json, amount) {
            (Some(doc_id), Some(stock_json), Some(amount)) => {
                let stock: Stock = serde_json::from_str(stock_json)?;
                assets.push(SavedStock {
                    stock,
                    amount,
                    doc_id: doc_id.to_string(),
                });
            }
            _ => {
                error!(
                    "Missing data in asset row for {}: doc_id = {:?}, amount = {:?}",
                    user_id, doc_id, amount
                );
            }
        }
    }
    Ok(assets)
}

#[async_trait]
impl DocumentStore for ScyllaStore {
    async fn count_notifications(&self, receiver_id: &str) -> Result<i64, StoreError> {
        let query = Query::new(format!(
            "SELECT COUNT(*) FROM {}.notifications WHERE receiver_ids CONTAINS ?",
            KEYSPACE
        ));
        let result = self
            .session
            .query(query, (receiver_id,))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let count = result
            .rows
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|row| row.columns[0].as_ref().and_then(|v| v.as_bigint()))
            .unwrap_or(0);
        Ok(count)
    }

    async fn subscribe_assets(&self, user_id: &str) -> Result<AssetFeed, StoreError> {
        let initial = load_assets(&self.session, user_id).await?;
        let (tx, feed) = AssetFeed::channel();
        let _ = tx.send(Ok(initial.clone()));

        let session = self.session.clone();
        let user_id = user_id.to_string();
        let mut ticker = time::interval(self.poll_interval);
        tokio::spawn(async move {
            let mut last = initial;
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    debug!("Asset feed for {} dropped; stopping poll.", user_id);
                    break;
                }
                match load_assets(&session, &user_id).await {
                    Ok(assets) if assets != last => {
                        last = assets.clone();
                        if tx.send(Ok(assets)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if tx.send(Err(e)).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(feed)
    }

    async fn add_asset(&self, user_id: &str, asset: NewAsset) -> Result<String, StoreError> {
        let doc_id = Uuid::new_v4().to_string();
        let stock_json = serde_json::to_string(&asset.stock)?;
        let query = Query::new(format!(
            "INSERT INTO {}.assets (user_id, doc_id, stock, amount) VALUES (?, ?, ?, ?)",
            KEYSPACE
        ));
        self.session
            .query(
                query,
                (user_id.to_string(), doc_id.clone(), stock_json, asset.amount),
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        info!("Stored asset {} ({}) for {}", doc_id, asset.stock.symbol, user_id);
        Ok(doc_id)
    }
}
