//! SQLite-backed storage for profiles, chats and indexed documents
pub mod schema;
pub mod migration;
pub mod profile_store;
pub mod chat_store;
pub mod document_store;

pub use schema::*;
pub use migration::MigrationManager;
pub use profile_store::ProfileStore;
pub use chat_store::ChatStore;
pub use document_store::DocumentStore;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct Database {
    pub profiles: ProfileStore,
    pub chats: ChatStore,
    pub documents: DocumentStore,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    pub fn new(db_path: &Path, embedding_dimensions: usize, embedding_model: &str) -> anyhow::Result<Self> {
        info!("Opening database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                conn.busy_timeout(Duration::from_secs(5))?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
            });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            let journal_mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            info!("SQLite journal mode: {}", journal_mode);
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        info!("Database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool), embedding_dimensions, embedding_model))
    }

    /// Single-connection in-memory database; every pooled handle would
    /// otherwise see its own empty database.
    pub fn new_in_memory_with(embedding_dimensions: usize, embedding_model: &str) -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self::from_pool(Arc::new(pool), embedding_dimensions, embedding_model))
    }

    #[cfg(test)]
    pub fn new_in_memory() -> anyhow::Result<Self> {
        Self::new_in_memory_with(4, "text-embedding-3-small")
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>, embedding_dimensions: usize, embedding_model: &str) -> Self {
        Self {
            profiles: ProfileStore::new(Arc::clone(&pool)),
            chats: ChatStore::new(Arc::clone(&pool)),
            documents: DocumentStore::new(Arc::clone(&pool), embedding_dimensions, embedding_model),
            pool,
        }
    }

    /// Existence of each required table, in `REQUIRED_TABLES` order.
    pub fn verify_schema(&self) -> anyhow::Result<Vec<(&'static str, bool)>> {
        let conn = self.pool.get()?;
        REQUIRED_TABLES
            .iter()
            .map(|table| -> anyhow::Result<(&'static str, bool)> {
                Ok((*table, migration::table_exists(&conn, table)?))
            })
            .collect()
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("localdesk.db");

        {
            let db = Database::new(&path, 4, "test-model").unwrap();
            db.chats.save_exchange("u1", "hello", "hej").unwrap();
        }

        let db = Database::new(&path, 4, "test-model").unwrap();
        assert_eq!(db.chats.list_chats("u1").unwrap().len(), 1);
        assert_eq!(db.get_stats().unwrap().total_messages, 2);
    }

    #[test]
    fn test_verify_schema_reports_all_tables() {
        let db = Database::new_in_memory().unwrap();
        let report = db.verify_schema().unwrap();

        assert_eq!(report.len(), REQUIRED_TABLES.len());
        assert!(report.iter().all(|(_, exists)| *exists));
    }
}
