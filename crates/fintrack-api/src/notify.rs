//! In-process notification fan-out
//!
//! One channel per connected client, keyed by user id. Publishing walks
//! the user's subscribers and drops the ones whose receiving end is
//! gone, so the registry shrinks back as clients disconnect. This is
//! process-local: running more than one instance needs an external
//! broker instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use fintrack_store::Notification;

const SUBSCRIBER_BUFFER: usize = 16;

/// Registry of live notification subscribers
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Notification>>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber for a user; one user may hold several
    /// (one per open tab)
    pub fn subscribe(&self, user_id: &str) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.inner
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Push a notification to every live subscriber of the user
    pub fn publish(&self, user_id: &str, notification: &Notification) {
        let mut subscribers = self.inner.lock().unwrap();
        if let Some(senders) = subscribers.get_mut(user_id) {
            senders.retain(|tx| match tx.try_send(notification.clone()) {
                Ok(()) => true,
                // a slow reader keeps its slot; it just misses this one
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
            if senders.is_empty() {
                subscribers.remove(user_id);
            }
        }
    }

    /// Live subscriber count for a user
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

// ==================== Tests ====================
