use crate::db::DbPool;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Days a file stays retrievable after upload
    pub retention_days: u32,
    /// Maximum decoded upload size in megabytes
    pub max_upload_size_mb: u32,
}
