use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::PriceAlert;

/// Presents a price alert to the user. Delivery problems are handled inside
/// the implementation; callers never see them.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &PriceAlert);
}

/// What the browser receives, either live over SSE or later as a toast.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(flatten)]
    pub alert: PriceAlert,
    pub message: String,
    pub sound: String,
}

/// Per-user fan-out of price alerts.
///
/// Live subscribers (the `/events` stream) get a system notification. When a
/// user has none, the alert is queued as an in-app toast instead.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    channels: Mutex<HashMap<String, broadcast::Sender<Notification>>>,
    toasts: Mutex<HashMap<String, VecDeque<Notification>>>,
    toast_capacity: usize,
    sound: String,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NotificationHub {
    pub fn new(toast_capacity: usize, sound: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: Mutex::new(HashMap::new()),
                toasts: Mutex::new(HashMap::new()),
                toast_capacity: toast_capacity.max(1),
                sound: sound.into(),
            }),
        }
    }

    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<Notification> {
        let mut channels = lock(&self.inner.channels);
        // Closed tabs leave senders with no receivers behind.
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(32).0)
            .subscribe()
    }

    /// Returns and clears the user's pending toasts, oldest first.
    pub fn drain_toasts(&self, user_id: &str) -> Vec<Notification> {
        let mut toasts = lock(&self.inner.toasts);
        toasts
            .remove(user_id)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drops the user's channel and queued toasts (sign-out).
    pub fn forget(&self, user_id: &str) {
        lock(&self.inner.channels).remove(user_id);
        lock(&self.inner.toasts).remove(user_id);
    }

    fn push_toast(&self, notification: Notification) {
        let mut toasts = lock(&self.inner.toasts);
        let queue = toasts.entry(notification.alert.user_id.clone()).or_default();
        if queue.len() >= self.inner.toast_capacity {
            queue.pop_front();
        }
        queue.push_back(notification);
    }

    fn send_live(&self, notification: Notification) -> Result<(), Notification> {
        let mut channels = lock(&self.inner.channels);
        let user_id = notification.alert.user_id.clone();

        let Some(tx) = channels.get(&user_id) else {
            return Err(notification);
        };

        match tx.send(notification) {
            Ok(_) => Ok(()),
            Err(e) => {
                channels.remove(&user_id);
                Err(e.0)
            }
        }
    }

    #[cfg(test)]
    fn live_channels(&self) -> usize {
        lock(&self.inner.channels).len()
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, alert: &PriceAlert) {
        let notification = Notification {
            message: alert.message(),
            sound: self.inner.sound.clone(),
            alert: alert.clone(),
        };

        if let Err(undelivered) = self.send_live(notification) {
            tracing::debug!(
                "no live subscriber for user {}, queueing toast for {}",
                undelivered.alert.user_id,
                undelivered.alert.asset_id
            );
            self.push_toast(undelivered);
        }
    }
}
