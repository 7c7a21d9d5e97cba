// src/subscription.rs
use crate::error::StoreError;
use crate::models::SavedStock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type AssetSnapshot = Result<Vec<SavedStock>, StoreError>;

/// Live stream of a user's full asset set. Dropping the feed stops the producer.
pub struct AssetFeed {
    rx: mpsc::UnboundedReceiver<AssetSnapshot>,
}

impl AssetFeed {
    pub fn channel() -> (mpsc::UnboundedSender<AssetSnapshot>, AssetFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, AssetFeed { rx })
    }

    pub async fn next(&mut self) -> Option<AssetSnapshot> {
        self.rx.recv().await
    }
}

/// Owned handle on an active asset subscription.
///
/// Exactly one of these exists per mounted identity. `cancel` releases the
/// listener; dropping the handle does the same.
pub struct SubscriptionHandle {
    user_id: String,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(user_id: String, generation: u64, task: JoinHandle<()>) -> Self {
        SubscriptionHandle {
            user_id,
            generation,
            task: Some(task),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            log::debug!(
                "Releasing asset subscription for {} (generation {})",
                self.user_id,
                self.generation
            );
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
