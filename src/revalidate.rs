//! Stale-view signalling.
//!
//! Mutating actions name the logical view paths whose cached renderings are
//! now stale. Signals are fire-and-forget: sending never blocks and never
//! fails the action, and a missing listener is not an error.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

pub trait Revalidator: Send + Sync {
    fn revalidate_path(&self, path: &str);
}

/// Broadcasts stale paths and keeps a per-path generation counter so readers
/// can tell whether a cached view predates the latest write.
#[derive(Clone, Debug)]
pub struct ViewInvalidator {
    sender: broadcast::Sender<String>,
    generations: Arc<RwLock<HashMap<String, u64>>>,
}

impl Default for ViewInvalidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewInvalidator {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            generations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Number of invalidations recorded for `path`, zero if never touched.
    #[must_use]
    pub fn generation(&self, path: &str) -> u64 {
        self.generations
            .read()
            .map_or(0, |map| map.get(path).copied().unwrap_or(0))
    }
}

impl Revalidator for ViewInvalidator {
    fn revalidate_path(&self, path: &str) {
        match self.generations.write() {
            Ok(mut map) => *map.entry(path.to_string()).or_insert(0) += 1,
            Err(_) => warn!("view generation map poisoned, skipping counter for {path}"),
        }
        // `send` only fails when nobody is subscribed.
        if self.sender.send(path.to_string()).is_err() {
            debug!("no listeners for revalidation of {path}");
        }
    }
}

/// Drain invalidation signals in the background and log them.
pub fn spawn_listener(invalidator: &ViewInvalidator) -> tokio::task::JoinHandle<()> {
    let mut receiver = invalidator.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(path) => debug!(path = %path, "view revalidated"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("revalidation listener lagged, skipped {skipped} signals");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
