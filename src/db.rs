use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Open the tracking database at `path`, creating it if needed.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open tracking database at {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Page segments table: one row per (page, segment) ever published.
    // Rows are never deleted here; cleanup is an administrative task.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS page_segments (
            page_name TEXT NOT NULL,
            segment_name TEXT NOT NULL,
            segment_hash TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (page_name, segment_name)
        )",
        [],
    )?;

    Ok(())
}

/// Fingerprint recorded at last successful publish, if any.
pub fn get_segment_hash(
    conn: &Connection,
    page_name: &str,
    segment_name: &str,
) -> Result<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT segment_hash FROM page_segments
             WHERE page_name = ?1 AND segment_name = ?2",
            params![page_name, segment_name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(hash)
}

/// Insert or refresh the fingerprint for a (page, segment) pair.
pub fn upsert_segment_hash(
    conn: &Connection,
    page_name: &str,
    segment_name: &str,
    segment_hash: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO page_segments (page_name, segment_name, segment_hash, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (page_name, segment_name)
         DO UPDATE SET segment_hash = excluded.segment_hash,
                       updated_at = excluded.updated_at",
        params![page_name, segment_name, segment_hash, Utc::now().to_rfc3339()],
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
