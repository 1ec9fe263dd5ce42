use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE documents (
    id              TEXT PRIMARY KEY,
    content         TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    content_length  INTEGER NOT NULL,
    version         INTEGER NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
"#;

const MIGRATION_V2_SQL: &str = r#"
CREATE TABLE document_versions (
    document_id     TEXT NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
    version         INTEGER NOT NULL,
    content         TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    content_length  INTEGER NOT NULL,
    created_by      TEXT NOT NULL,
    request_id      TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (document_id, version)
);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];

#[derive(Debug)]
pub struct MetaDb {
    conn: Connection,
}

impl MetaDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with a custom wait for locks held by other connections.
    pub fn open_with_busy_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database parent directory `{}`", parent.display())
            })?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("failed to open database at `{}`", path.display()))?;

        conn.busy_timeout(busy_timeout).context("failed to set sqlite busy timeout")?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            ",
        )
        .context("failed to configure sqlite pragmas")?;

        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access, needed to open transactions.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn schema_version(&self) -> Result<i64> {
        current_schema_version(&self.conn)
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let mut current_version = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql).with_context(|| format!("failed to apply migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
        current_version = *version;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rusqlite::Connection;

    use super::test_support::{cleanup_sqlite_files, unique_temp_db_path};
    use super::{MetaDb, MIGRATION_V1_SQL};

    const EXPECTED_TABLES: &[&str] = &["schema_migrations", "documents", "document_versions"];

    #[test]
    fn open_creates_schema_and_records_latest_migration() {
        let db_path = unique_temp_db_path("meta-db-schema");
        let db = MetaDb::open(&db_path).expect("db should open");

        for table in EXPECTED_TABLES {
            let exists: i64 = db
                .connection()
                .query_row(
                    "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .expect("table existence query should succeed");

            assert_eq!(exists, 1, "expected `{table}` table to exist");
        }

        assert_eq!(db.schema_version().expect("schema version should be readable"), 2);

        drop(db);
        cleanup_sqlite_files(&db_path);
    }

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = tempfile::TempDir::new().expect("temp dir should be created");
        let db_path = dir.path().join("a").join("b").join("folio.db");

        let db = MetaDb::open(&db_path).expect("db should open in a fresh directory");
        assert_eq!(db.schema_version().expect("schema version should be readable"), 2);
        assert!(db_path.exists());
    }

    #[test]
    fn opening_twice_is_idempotent_for_all_migrations() {
        let db_path = unique_temp_db_path("meta-db-idempotent");
        {
            let first = MetaDb::open(&db_path).expect("first open should succeed");
            assert_eq!(first.schema_version().expect("schema version should be readable"), 2);
        }

        let second = MetaDb::open(&db_path).expect("second open should succeed");
        let migration_rows: i64 = second
            .connection()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("schema migration count query should succeed");
        assert_eq!(migration_rows, 2);

        drop(second);
        cleanup_sqlite_files(&db_path);
    }

    #[test]
    fn existing_v1_schema_is_migrated_to_v2() {
        let db_path = unique_temp_db_path("meta-db-upgrade-v1-v2");
        seed_v1_schema(&db_path);

        let db = MetaDb::open(&db_path).expect("db should upgrade from v1 to v2");
        assert_eq!(db.schema_version().expect("schema version should be readable"), 2);

        let versions_table_exists: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(1) FROM sqlite_master \
                 WHERE type = 'table' AND name = 'document_versions'",
                [],
                |row| row.get(0),
            )
            .expect("versions table existence query should succeed");
        assert_eq!(versions_table_exists, 1);

        let kept: String = db
            .connection()
            .query_row("SELECT content FROM documents WHERE id = 'seeded'", [], |row| row.get(0))
            .expect("v1 rows should survive the upgrade");
        assert_eq!(kept, "kept");

        drop(db);
        cleanup_sqlite_files(&db_path);
    }

    fn seed_v1_schema(path: &PathBuf) {
        let conn = Connection::open(path).expect("v1 seed db should open");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL
            );
            ",
        )
        .expect("schema_migrations should be created");
        conn.execute_batch(MIGRATION_V1_SQL).expect("v1 schema should be applied");
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .expect("v1 migration row should be inserted");
        conn.execute(
            "INSERT INTO documents VALUES ('seeded', 'kept', 'h', 4, 1, 'now', 'now')",
            [],
        )
        .expect("v1 document should be inserted");
    }
}
