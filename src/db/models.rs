/// Database row types. These correspond 1:1 to the SQLite schema
/// defined in migrations.rs.

/// Metadata for one uploaded encrypted blob. The blob itself lives in the
/// same row but is fetched separately so listing never pages it in.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub access_key_hash: String,
    pub uploaded_at: String,
    pub expires_at: String,
    pub size: i64,
    pub download_count: i64,
    /// -1 means unlimited
    pub max_downloads: i64,
}
