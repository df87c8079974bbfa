use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use super::alert_monitor::{self, AlertMonitor, MonitorDeps, MonitorHandle};

/// One alert monitor per signed-in user.
///
/// Sign-in starts a monitor with an empty snapshot, sign-out stops it and
/// drops the snapshot. Nothing here is persisted.
#[derive(Clone)]
pub struct MonitorRegistry {
    deps: MonitorDeps,
    sessions: Arc<Mutex<HashMap<String, MonitorHandle>>>,
}

impl MonitorRegistry {
    pub fn new(deps: MonitorDeps) -> Self {
        Self {
            deps,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns false when the user already had a running monitor.
    pub async fn start_session(&self, user_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(user_id) {
            if !existing.is_finished() {
                return false;
            }
        }

        let monitor = Arc::new(AlertMonitor::new(user_id, self.deps.clone()));
        sessions.insert(user_id.to_string(), alert_monitor::spawn(monitor));
        true
    }

    /// Returns false when there was no monitor to stop.
    pub async fn end_session(&self, user_id: &str) -> bool {
        let handle = self.sessions.lock().await.remove(user_id);

        match handle {
            Some(h) => {
                h.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_active(&self, user_id: &str) -> bool {
        self.sessions
            .lock()
            .await
            .get(user_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub async fn shutdown_all(&self) {
        let handles: Vec<MonitorHandle> = self.sessions.lock().await.drain().map(|(_, h)| h).collect();
        let count = handles.len();

        for h in handles {
            h.stop().await;
        }

        tracing::info!("stopped {} alert monitor(s)", count);
    }
}
