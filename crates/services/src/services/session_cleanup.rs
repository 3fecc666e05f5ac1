//! Background sweep of expired login sessions.

use std::time::Duration;

use chrono::Utc;
use db::{DBService, models::session::Session};
use tokio::time::interval;
use tracing::{debug, error, info};

pub struct SessionCleanupService {
    db: DBService,
    poll_interval: Duration,
}

impl SessionCleanupService {
    pub fn new(db: DBService, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }

    /// Spawn the cleanup loop on the runtime.
    pub fn spawn(db: DBService, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let service = Self::new(db, poll_interval);
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Starting session cleanup service"
        );

        let mut interval = interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Error deleting expired sessions");
            }
        }
    }

    /// Deletes every session whose expiry has passed and returns how many went.
    pub async fn run_once(&self) -> Result<u64, sqlx::Error> {
        let removed = Session::delete_expired(&self.db.pool, Utc::now()).await?;
        if removed > 0 {
            info!(removed = removed, "Expired sessions deleted");
        } else {
            debug!("Session cleanup: nothing to delete");
        }
        Ok(removed)
    }
}
