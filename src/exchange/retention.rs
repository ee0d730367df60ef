//! Background retention sweep for expired files.
//!
//! The read path already evicts expired records lazily, so this task is a
//! storage-reclamation measure: expired-but-unread rows would otherwise
//! accumulate forever.

use chrono::Utc;

use crate::db::DbPool;
use crate::exchange::store;

/// Spawn a background task that periodically purges expired files.
///
/// Runs `delete_expired` every `interval_secs` seconds. Logs the number of
/// purged records each cycle.
pub fn spawn_retention_sweep(db: DbPool, interval_secs: u64) {
    let interval = std::time::Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let db_clone = db.clone();
            match tokio::task::spawn_blocking(move || store::delete_expired(&db_clone, Utc::now()))
                .await
            {
                Ok(Ok(count)) => {
                    if count > 0 {
                        tracing::info!("Retention sweep: purged {} expired files", count);
                    } else {
                        tracing::debug!("Retention sweep: no expired files");
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!("Retention sweep error: {}", e);
                }
                Err(e) => {
                    tracing::error!("Retention sweep task join error: {}", e);
                }
            }
        }
    });
}
