// documents table access: create, read, compare-and-swap update.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use folio_common::hash::{fingerprint, ContentHash};
use folio_common::patch::char_len;
use folio_common::types::DocumentView;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Version assigned to a newly created document.
pub const INITIAL_VERSION: i64 = 1;

/// A row in the `documents` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    pub content_hash: ContentHash,
    pub content_length: usize,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn view(&self) -> DocumentView {
        DocumentView {
            id: self.id.clone(),
            content: self.content.clone(),
            content_hash: self.content_hash.clone(),
            content_length: self.content_length,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// New content for a compare-and-swap write, with its derived fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpdate {
    pub content: String,
    pub content_hash: ContentHash,
    pub content_length: usize,
}

impl ContentUpdate {
    pub fn new(content: String) -> Self {
        let content_hash = fingerprint(&content);
        let content_length = char_len(&content);
        Self { content, content_hash, content_length }
    }
}

/// Access to the `documents` table.
pub struct DocumentStore;

impl DocumentStore {
    /// Create a document with a fresh id at version 1.
    pub fn create(conn: &Connection, content: &str, now: DateTime<Utc>) -> Result<DocumentRecord> {
        let update = ContentUpdate::new(content.to_string());
        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            content: update.content,
            content_hash: update.content_hash,
            content_length: update.content_length,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        };
        Self::insert(conn, &record)?;
        Ok(record)
    }

    pub fn insert(conn: &Connection, record: &DocumentRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO documents \
             (id, content, content_hash, content_length, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.content,
                record.content_hash,
                length_to_sql(record.content_length),
                record.version,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("failed to insert document `{}`", record.id))?;
        Ok(())
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Option<DocumentRecord>> {
        conn.query_row(
            "SELECT id, content, content_hash, content_length, version, created_at, updated_at \
             FROM documents \
             WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .with_context(|| format!("failed to read document `{id}`"))
    }

    pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
        conn.query_row("SELECT EXISTS (SELECT 1 FROM documents WHERE id = ?1)", params![id], |row| {
            row.get(0)
        })
        .with_context(|| format!("failed to check document `{id}`"))
    }

    /// Write `update` only if the row still has `expected_hash` at
    /// `expected_version`, bumping the version by one.
    ///
    /// Returns the new version, or `None` when the row changed underneath
    /// the caller (or no longer exists).
    pub fn compare_and_swap(
        conn: &Connection,
        id: &str,
        expected_hash: &str,
        expected_version: i64,
        update: &ContentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let next_version = expected_version + 1;
        let changed = conn
            .execute(
                "UPDATE documents \
                 SET content = ?1, content_hash = ?2, content_length = ?3, \
                     version = ?4, updated_at = ?5 \
                 WHERE id = ?6 AND content_hash = ?7 AND version = ?8",
                params![
                    update.content,
                    update.content_hash,
                    length_to_sql(update.content_length),
                    next_version,
                    now.to_rfc3339(),
                    id,
                    expected_hash,
                    expected_version,
                ],
            )
            .with_context(|| format!("failed to update document `{id}`"))?;
        Ok((changed == 1).then_some(next_version))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

pub(crate) fn length_to_sql(length: usize) -> i64 {
    i64::try_from(length).unwrap_or(i64::MAX)
}

pub(crate) fn length_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let raw: i64 = row.get(idx)?;
    usize::try_from(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

pub(crate) fn timestamp_from_row(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        content_hash: row.get(2)?,
        content_length: length_from_row(row, 3)?,
        version: row.get(4)?,
        created_at: timestamp_from_row(row, 5)?,
        updated_at: timestamp_from_row(row, 6)?,
    })
}
