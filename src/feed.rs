//! Per-user live feed of newly stored records.
//!
//! Each `user_id` with at least one subscriber has a broadcast channel.
//! Publishing never waits on subscribers: a subscriber that falls more than the
//! channel capacity behind skips the oldest messages.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::models::ProcessedAgentRecord;

/// Registry of per-user broadcast channels
#[derive(Debug, Clone)]
pub struct FeedHub {
    channels: Arc<RwLock<HashMap<i32, broadcast::Sender<ProcessedAgentRecord>>>>,
    capacity: usize,
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to records stored for `user_id`, creating the channel on first use.
    pub async fn subscribe(&self, user_id: i32) -> broadcast::Receiver<ProcessedAgentRecord> {
        {
            let channels = self.channels.read().await;
            if let Some(tx) = channels.get(&user_id) {
                return tx.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        // Another task may have created it while the write lock was pending
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Delivers `record` to every current subscriber of its user.
    ///
    /// Returns how many subscribers received it. Records without a `user_id`
    /// have no audience and are skipped.
    pub async fn publish(&self, record: &ProcessedAgentRecord) -> usize {
        let Some(user_id) = record.user_id else {
            return 0;
        };

        let sent = {
            let channels = self.channels.read().await;
            match channels.get(&user_id) {
                Some(tx) => tx.send(record.clone()).ok(),
                None => return 0,
            }
        };

        match sent {
            Some(receivers) => {
                counter!("feed_messages_published_total").increment(1);
                debug!(user_id, record_id = record.id, receivers, "Published record to feed");
                receivers
            }
            None => {
                self.prune(user_id).await;
                0
            }
        }
    }

    /// Drops the channel for `user_id` if nobody is listening anymore.
    pub async fn prune(&self, user_id: i32) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&user_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(&user_id);
            debug!(user_id, "Removed idle feed channel");
        }
    }

    /// Number of live subscribers for `user_id`.
    pub async fn subscriber_count(&self, user_id: i32) -> usize {
        self.channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}
