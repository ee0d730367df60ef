//! FileRecord storage (SQLite) and capability-scoped queries.
//!
//! Every read and write filters by `access_key_hash` at the SQL layer, not
//! just in the handlers, so a missing filter in one handler cannot leak
//! records across capabilities. All functions are synchronous and expected
//! to run inside `tokio::task::spawn_blocking`.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use crate::db::models::FileRecord;
use crate::db::DbPool;

/// Store-layer failure taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Primary key collision on insert (client-generated ids should make
    /// this astronomically unlikely, but it must be guarded)
    DuplicateId,
    /// Any other SQLite or lock failure
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateId => write!(f, "duplicate file id"),
            StoreError::Backend(detail) => write!(f, "store backend error: {}", detail),
        }
    }
}

/// Format a timestamp as fixed-width RFC 3339 (millisecond precision, Z
/// suffix) so stored values compare correctly as strings in SQL.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("DB lock error: {}", e))
}

fn sql_err(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(format!("SQLite error: {}", e))
}

const METADATA_COLUMNS: &str = "file_id, file_name, mime_type, access_key_hash, \
     uploaded_at, expires_at, size, download_count, max_downloads";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: row.get(0)?,
        file_name: row.get(1)?,
        mime_type: row.get(2)?,
        access_key_hash: row.get(3)?,
        uploaded_at: row.get(4)?,
        expires_at: row.get(5)?,
        size: row.get(6)?,
        download_count: row.get(7)?,
        max_downloads: row.get(8)?,
    })
}

/// Insert a new FileRecord together with its opaque blob.
///
/// Fails with `DuplicateId` if `file_id` already exists.
pub fn insert(db: &DbPool, record: &FileRecord, blob: &[u8]) -> Result<(), StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    conn.execute(
        "INSERT INTO files (file_id, file_name, mime_type, access_key_hash,
             uploaded_at, expires_at, size, download_count, max_downloads, encrypted_blob)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.file_id,
            record.file_name,
            record.mime_type,
            record.access_key_hash,
            record.uploaded_at,
            record.expires_at,
            record.size,
            record.download_count,
            record.max_downloads,
            blob,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateId
        }
        other => sql_err(other),
    })?;
    Ok(())
}

/// Look up a record by id, scoped to the capability hash.
///
/// Wrong id and wrong hash are indistinguishable: both return `None`, so a
/// caller holding the wrong capability cannot probe for existence.
pub fn find_by_id_and_key(
    db: &DbPool,
    file_id: &str,
    access_key_hash: &str,
) -> Result<Option<FileRecord>, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM files WHERE file_id = ?1 AND access_key_hash = ?2",
            METADATA_COLUMNS
        ),
        params![file_id, access_key_hash],
        row_to_record,
    );
    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(sql_err(e)),
    }
}

/// Fetch the stored blob bytes, scoped to the capability hash.
pub fn fetch_blob(
    db: &DbPool,
    file_id: &str,
    access_key_hash: &str,
) -> Result<Option<Vec<u8>>, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let result = conn.query_row(
        "SELECT encrypted_blob FROM files WHERE file_id = ?1 AND access_key_hash = ?2",
        params![file_id, access_key_hash],
        |row| row.get::<_, Vec<u8>>(0),
    );
    match result {
        Ok(blob) => Ok(Some(blob)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(sql_err(e)),
    }
}

/// List all non-expired records for a capability hash, newest first.
pub fn list_by_key(
    db: &DbPool,
    access_key_hash: &str,
    now: DateTime<Utc>,
) -> Result<Vec<FileRecord>, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM files
             WHERE access_key_hash = ?1 AND expires_at > ?2
             ORDER BY uploaded_at DESC",
            METADATA_COLUMNS
        ))
        .map_err(sql_err)?;

    let records = stmt
        .query_map(params![access_key_hash, timestamp(now)], row_to_record)
        .map_err(sql_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_err)?;

    Ok(records)
}

/// Outcome of a counted download attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DownloadGate {
    /// Counter incremented; the download may proceed
    Counted,
    /// Record exists but its download cap is exhausted
    LimitReached,
    /// No record matches id + capability
    Missing,
}

/// Atomically increment the download counter, honoring `max_downloads`.
///
/// The cap check and the increment are one SQL read-modify-write, so
/// concurrent downloads can never lose updates or overshoot the cap.
/// Scoped to the capability hash as well. When no row is updated, the
/// follow-up existence probe runs under the same connection lock, so the
/// distinction between a capped record and a vanished one is not racy.
pub fn increment_download_count(
    db: &DbPool,
    file_id: &str,
    access_key_hash: &str,
) -> Result<DownloadGate, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let updated = conn
        .execute(
            "UPDATE files SET download_count = download_count + 1
             WHERE file_id = ?1 AND access_key_hash = ?2
               AND (max_downloads < 0 OR download_count < max_downloads)",
            params![file_id, access_key_hash],
        )
        .map_err(sql_err)?;
    if updated > 0 {
        return Ok(DownloadGate::Counted);
    }

    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM files WHERE file_id = ?1 AND access_key_hash = ?2",
            params![file_id, access_key_hash],
            |row| row.get(0),
        )
        .map_err(sql_err)?;

    Ok(if exists > 0 {
        DownloadGate::LimitReached
    } else {
        DownloadGate::Missing
    })
}

/// Delete a record unconditionally. The caller is responsible for having
/// verified the capability match first (lazy eviction deletes without one).
pub fn delete(db: &DbPool, file_id: &str) -> Result<bool, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let deleted = conn
        .execute("DELETE FROM files WHERE file_id = ?1", params![file_id])
        .map_err(sql_err)?;
    Ok(deleted > 0)
}

/// Delete all records past their expiry. Returns the number purged.
/// Used by the periodic retention sweep.
pub fn delete_expired(db: &DbPool, now: DateTime<Utc>) -> Result<usize, StoreError> {
    let conn = db.lock().map_err(lock_err)?;
    let purged = conn
        .execute(
            "DELETE FROM files WHERE expires_at <= ?1",
            params![timestamp(now)],
        )
        .map_err(sql_err)?;
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use chrono::Duration;

    fn record(file_id: &str, key: &str, uploaded: DateTime<Utc>, expires: DateTime<Utc>) -> FileRecord {
        FileRecord {
            file_id: file_id.to_string(),
            file_name: "a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            access_key_hash: key.to_string(),
            uploaded_at: timestamp(uploaded),
            expires_at: timestamp(expires),
            size: 4,
            download_count: 0,
            max_downloads: -1,
        }
    }

    #[test]
    fn test_insert_and_find_scoped_by_key() {
        let db = init_test_db();
        let now = Utc::now();
        insert(&db, &record("f1", "H1", now, now + Duration::days(7)), b"blob").unwrap();

        let found = find_by_id_and_key(&db, "f1", "H1").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().size, 4);

        // Wrong key is indistinguishable from absence
        assert!(find_by_id_and_key(&db, "f1", "H2").unwrap().is_none());
        assert!(find_by_id_and_key(&db, "nope", "H1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = init_test_db();
        let now = Utc::now();
        let rec = record("f1", "H1", now, now + Duration::days(7));
        insert(&db, &rec, b"blob").unwrap();

        let err = insert(&db, &rec, b"blob").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId));
    }

    #[test]
    fn test_list_newest_first_and_filters_expired() {
        let db = init_test_db();
        let now = Utc::now();
        let later = now + Duration::days(7);

        insert(&db, &record("old", "H1", now - Duration::hours(2), later), b"a").unwrap();
        insert(&db, &record("new", "H1", now - Duration::hours(1), later), b"b").unwrap();
        insert(&db, &record("gone", "H1", now - Duration::days(8), now - Duration::days(1)), b"c").unwrap();
        insert(&db, &record("other", "H2", now, later), b"d").unwrap();

        let listed = list_by_key(&db, "H1", now).unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_increment_is_scoped() {
        let db = init_test_db();
        let now = Utc::now();
        insert(&db, &record("f1", "H1", now, now + Duration::days(7)), b"x").unwrap();

        assert_eq!(
            increment_download_count(&db, "f1", "H1").unwrap(),
            DownloadGate::Counted
        );
        assert_eq!(
            increment_download_count(&db, "f1", "H2").unwrap(),
            DownloadGate::Missing
        );

        let rec = find_by_id_and_key(&db, "f1", "H1").unwrap().unwrap();
        assert_eq!(rec.download_count, 1);
    }

    #[test]
    fn test_download_cap_gates_in_the_same_statement() {
        let db = init_test_db();
        let now = Utc::now();
        let mut rec = record("f1", "H1", now, now + Duration::days(7));
        rec.max_downloads = 1;
        insert(&db, &rec, b"x").unwrap();

        assert_eq!(
            increment_download_count(&db, "f1", "H1").unwrap(),
            DownloadGate::Counted
        );
        assert_eq!(
            increment_download_count(&db, "f1", "H1").unwrap(),
            DownloadGate::LimitReached
        );

        let rec = find_by_id_and_key(&db, "f1", "H1").unwrap().unwrap();
        assert_eq!(rec.download_count, 1, "a refused download must not count");
    }

    #[test]
    fn test_download_cap_holds_under_contention() {
        let db = init_test_db();
        let now = Utc::now();
        let mut rec = record("f1", "H1", now, now + Duration::days(7));
        rec.max_downloads = 1;
        insert(&db, &rec, b"x").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || increment_download_count(&db, "f1", "H1").unwrap())
            })
            .collect();
        let outcomes: Vec<DownloadGate> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let counted = outcomes.iter().filter(|o| **o == DownloadGate::Counted).count();
        assert_eq!(counted, 1, "exactly one download may pass a cap of 1");
        assert!(outcomes
            .iter()
            .all(|o| *o == DownloadGate::Counted || *o == DownloadGate::LimitReached));

        let rec = find_by_id_and_key(&db, "f1", "H1").unwrap().unwrap();
        assert_eq!(rec.download_count, 1);
    }

    #[test]
    fn test_fetch_blob_is_byte_identical() {
        let db = init_test_db();
        let now = Utc::now();
        let blob = [0u8, 159, 146, 150, 255, 1];
        insert(&db, &record("f1", "H1", now, now + Duration::days(7)), &blob).unwrap();

        let fetched = fetch_blob(&db, "f1", "H1").unwrap().unwrap();
        assert_eq!(fetched, blob);
        assert!(fetch_blob(&db, "f1", "H2").unwrap().is_none());
    }

    #[test]
    fn test_delete_expired_purges_only_past_expiry() {
        let db = init_test_db();
        let now = Utc::now();

        insert(&db, &record("live", "H1", now, now + Duration::days(1)), b"a").unwrap();
        insert(&db, &record("dead1", "H1", now - Duration::days(8), now - Duration::days(1)), b"b").unwrap();
        insert(&db, &record("dead2", "H2", now - Duration::days(9), now - Duration::days(2)), b"c").unwrap();

        let purged = delete_expired(&db, now).unwrap();
        assert_eq!(purged, 2);
        assert!(find_by_id_and_key(&db, "live", "H1").unwrap().is_some());
        assert!(find_by_id_and_key(&db, "dead1", "H1").unwrap().is_none());
    }

    #[test]
    fn test_delete_then_find_returns_none() {
        let db = init_test_db();
        let now = Utc::now();
        insert(&db, &record("f1", "H1", now, now + Duration::days(7)), b"x").unwrap();

        assert!(delete(&db, "f1").unwrap());
        assert!(!delete(&db, "f1").unwrap());
        assert!(find_by_id_and_key(&db, "f1", "H1").unwrap().is_none());
    }
}
