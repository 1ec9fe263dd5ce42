// Persistence: SQLite database with document rows and version snapshots.

pub mod documents;
pub mod meta_db;
pub mod versions;
