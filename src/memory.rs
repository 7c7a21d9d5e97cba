// src/memory.rs
use crate::db::DocumentStore;
use crate::error::StoreError;
use crate::models::{NewAsset, SavedStock};
use crate::subscription::{AssetFeed, AssetSnapshot};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

#[derive(Default)]
struct Collections {
    notifications: Vec<Vec<String>>,
    assets: HashMap<String, Vec<SavedStock>>,
    listeners: HashMap<String, Vec<UnboundedSender<AssetSnapshot>>>,
    fail_writes: bool,
    fail_counts: bool,
}

impl Collections {
    fn publish(&mut self, user_id: &str) {
        let snapshot = self.assets.get(user_id).cloned().unwrap_or_default();
        if let Some(listeners) = self.listeners.get_mut(user_id) {
            listeners.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }
}

/// In-process document store with live asset push.
///
/// Cloning shares the same collections. Failure switches let callers
/// exercise the degraded paths of anything built on top.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_notification(&self, receiver_ids: Vec<String>) {
        self.lock().notifications.push(receiver_ids);
    }

    pub fn assets(&self, user_id: &str) -> Vec<SavedStock> {
        self.lock().assets.get(user_id).cloned().unwrap_or_default()
    }

    /// Live listeners for a user's assets.
    pub fn listener_count(&self, user_id: &str) -> usize {
        self.lock()
            .listeners
            .get(user_id)
            .map(|listeners| listeners.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn fail_counts(&self, fail: bool) {
        self.lock().fail_counts = fail;
    }

    /// Delivers a failed snapshot to every listener of `user_id`.
    pub fn push_error(&self, user_id: &str, error: StoreError) {
        let mut collections = self.lock();
        if let Some(listeners) = collections.listeners.get_mut(user_id) {
            listeners.retain(|tx| tx.send(Err(error.clone())).is_ok());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count_notifications(&self, receiver_id: &str) -> Result<i64, StoreError> {
        let collections = self.lock();
        if collections.fail_counts {
            return Err(StoreError::Unavailable("count query refused".into()));
        }
        let count = collections
            .notifications
            .iter()
            .filter(|receivers| receivers.iter().any(|r| r == receiver_id))
            .count();
        Ok(count as i64)
    }

    async fn subscribe_assets(&self, user_id: &str) -> Result<AssetFeed, StoreError> {
        let (tx, feed) = AssetFeed::channel();
        let mut collections = self.lock();
        let snapshot = collections.assets.get(user_id).cloned().unwrap_or_default();
        let _ = tx.send(Ok(snapshot));
        let listeners = collections.listeners.entry(user_id.to_string()).or_default();
        listeners.retain(|tx| !tx.is_closed());
        listeners.push(tx);
        debug!("{} asset listener(s) for {}", listeners.len(), user_id);
        Ok(feed)
    }

    async fn add_asset(&self, user_id: &str, asset: NewAsset) -> Result<String, StoreError> {
        let mut collections = self.lock();
        if collections.fail_writes {
            return Err(StoreError::Unavailable("write refused".into()));
        }
        let doc_id = Uuid::new_v4().to_string();
        collections
            .assets
            .entry(user_id.to_string())
            .or_default()
            .push(SavedStock::from_new(doc_id.clone(), asset));
        collections.publish(user_id);
        info!("Stored asset {} for {}", doc_id, user_id);
        Ok(doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::recommendations;

    fn new_asset(amount: f64) -> NewAsset {
        NewAsset {
            stock: recommendations(None).remove(0),
            amount,
        }
    }

    #[tokio::test]
    async fn counts_only_notifications_addressed_to_the_receiver() {
        let store = MemoryStore::new();
        assert_eq!(store.count_notifications("u1").await, Ok(0));
        store.add_notification(vec!["u1".into(), "u2".into()]);
        store.add_notification(vec!["u2".into()]);
        store.add_notification(vec!["u1".into()]);
        assert_eq!(store.count_notifications("u1").await, Ok(2));
        assert_eq!(store.count_notifications("u3").await, Ok(0));
    }

    #[tokio::test]
    async fn subscription_delivers_current_set_then_every_change() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe_assets("u1").await.unwrap();
        assert_eq!(feed.next().await, Some(Ok(vec![])));

        let doc_id = store.add_asset("u1", new_asset(10.0)).await.unwrap();
        let delivered = feed.next().await.unwrap().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].doc_id, doc_id);
        assert_eq!(delivered[0].amount, 10.0);
    }

    #[tokio::test]
    async fn writes_for_other_users_are_not_delivered() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe_assets("u1").await.unwrap();
        feed.next().await;
        store.add_asset("u2", new_asset(1.0)).await.unwrap();
        store.push_error("u1", StoreError::Query("boom".into()));
        assert_eq!(
            feed.next().await,
            Some(Err(StoreError::Query("boom".into())))
        );
    }

    #[tokio::test]
    async fn dropped_feeds_stop_counting_as_listeners() {
        let store = MemoryStore::new();
        let feed = store.subscribe_assets("u1").await.unwrap();
        assert_eq!(store.listener_count("u1"), 1);
        drop(feed);
        assert_eq!(store.listener_count("u1"), 0);
    }

    #[tokio::test]
    async fn refused_write_leaves_collection_untouched() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.add_asset("u1", new_asset(5.0)).await.is_err());
        assert!(store.assets("u1").is_empty());
    }
}
