use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::services::notify::Notifier;

const EVENT_BUFFER: usize = 256;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Box<dyn Notifier>,
    pub events_tx: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, notifier: Box<dyn Notifier>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            notifier,
            events_tx,
        }
    }

    /// Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Backend(anyhow::anyhow!("database lock poisoned")))
    }

    pub fn publish(&self, event: BookingEvent) {
        // No subscribers is fine; dashboards may simply not be open.
        let _ = self.events_tx.send(event);
    }
}
