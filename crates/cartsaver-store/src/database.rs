use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::schema;

/// Namespace shared by every tab: durable cooldown markers.
pub const LOCAL_NAMESPACE: &str = "local";

/// Thread-safe SQLite connection wrapper.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Sync).
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::init(conn, path.to_owned())
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

        let version: Option<u32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;

        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [schema::SCHEMA_VERSION],
            )
            .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
        }

        info!(path = %path.display(), "storage database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key/value view scoped to one namespace.
    pub fn namespace(&self, namespace: impl Into<String>) -> SqliteKv {
        SqliteKv {
            db: self.clone(),
            namespace: namespace.into(),
        }
    }

    /// The durable, cross-tab namespace.
    pub fn local(&self) -> SqliteKv {
        self.namespace(LOCAL_NAMESPACE)
    }

    /// Per-tab session namespace.
    pub fn session_scope(&self, tab_id: &str) -> SqliteKv {
        self.namespace(format!("session:{tab_id}"))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}

/// [`KeyValueStore`] over one namespace of the `kv` table.
#[derive(Clone)]
pub struct SqliteKv {
    db: Database,
    namespace: String,
}

impl SqliteKv {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                    rusqlite::params![self.namespace, key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO kv (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value,
                                                           updated_at = excluded.updated_at",
                rusqlite::params![self.namespace, key, value, now],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                rusqlite::params![self.namespace, key],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
    }

    #[test]
    fn schema_version_set_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/storage.db");
        let db = Database::open(&path).unwrap();
        drop(db);
        let db = Database::open(&path).unwrap();
        let rows: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn namespaces_are_isolated() {
        let db = Database::in_memory().unwrap();
        let tab_a = db.session_scope("tab-a");
        let tab_b = db.session_scope("tab-b");
        tab_a.set("cartsaver_session", "A").unwrap();
        assert_eq!(tab_a.get("cartsaver_session").unwrap().as_deref(), Some("A"));
        assert_eq!(tab_b.get("cartsaver_session").unwrap(), None);
        assert_eq!(db.local().get("cartsaver_session").unwrap(), None);
    }

    #[test]
    fn set_overwrites_and_remove_deletes() {
        let db = Database::in_memory().unwrap();
        let local = db.local();
        local.set("k", "1").unwrap();
        local.set("k", "2").unwrap();
        assert_eq!(local.get("k").unwrap().as_deref(), Some("2"));
        local.remove("k").unwrap();
        assert_eq!(local.get("k").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.db");
        {
            let db = Database::open(&path).unwrap();
            db.local().set("cartsaver_last_n1", "1700000000000").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(
            db.local().get("cartsaver_last_n1").unwrap().as_deref(),
            Some("1700000000000")
        );
    }
}
