// document_versions table access: append-only pre-mutation snapshots.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use folio_common::types::{VersionSnapshot, VersionSummary};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::documents::{length_from_row, length_to_sql, timestamp_from_row, DocumentRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Created,
    /// A snapshot for this `(document_id, version)` was already recorded.
    AlreadyExists,
}

/// Access to the `document_versions` table.
pub struct VersionStore;

impl VersionStore {
    /// Record `document` as it is right now, keyed by its current version.
    ///
    /// A primary-key collision means the same snapshot was already taken and
    /// is reported as [`SnapshotOutcome::AlreadyExists`], not an error.
    pub fn snapshot(
        conn: &Connection,
        document: &DocumentRecord,
        created_by: &str,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SnapshotOutcome> {
        let inserted = conn.execute(
            "INSERT INTO document_versions \
             (document_id, version, content, content_hash, content_length, \
              created_by, request_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                document.id,
                document.version,
                document.content,
                document.content_hash,
                length_to_sql(document.content_length),
                created_by,
                request_id,
                now.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(SnapshotOutcome::Created),
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation
                    && error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Ok(SnapshotOutcome::AlreadyExists)
            }
            Err(error) => Err(error).with_context(|| {
                format!("failed to snapshot document `{}` v{}", document.id, document.version)
            }),
        }
    }

    pub fn get(
        conn: &Connection,
        document_id: &str,
        version: i64,
    ) -> Result<Option<VersionSnapshot>> {
        conn.query_row(
            "SELECT document_id, version, content, content_hash, content_length, \
                    created_by, request_id, created_at \
             FROM document_versions \
             WHERE document_id = ?1 AND version = ?2",
            params![document_id, version],
            row_to_snapshot,
        )
        .optional()
        .with_context(|| format!("failed to read snapshot `{document_id}` v{version}"))
    }

    /// Newest first, at most `limit` entries.
    pub fn list_by_document(
        conn: &Connection,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<VersionSummary>> {
        let mut stmt = conn
            .prepare(
                "SELECT version, content_hash, content_length, created_by, created_at \
                 FROM document_versions \
                 WHERE document_id = ?1 \
                 ORDER BY version DESC \
                 LIMIT ?2",
            )
            .context("failed to prepare document history query")?;

        let rows = stmt
            .query_map(params![document_id, length_to_sql(limit)], |row| {
                Ok(VersionSummary {
                    version: row.get(0)?,
                    content_hash: row.get(1)?,
                    content_length: length_from_row(row, 2)?,
                    created_by: row.get(3)?,
                    created_at: timestamp_from_row(row, 4)?,
                })
            })
            .context("failed to query document history")?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to collect document history rows")
    }
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionSnapshot> {
    Ok(VersionSnapshot {
        document_id: row.get(0)?,
        version: row.get(1)?,
        content: row.get(2)?,
        content_hash: row.get(3)?,
        content_length: length_from_row(row, 4)?,
        created_by: row.get(5)?,
        request_id: row.get(6)?,
        created_at: timestamp_from_row(row, 7)?,
    })
}
