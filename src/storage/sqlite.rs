//! SQLite-backed key-value store. Calls are short synchronous statements
//! behind a mutex-guarded connection.

use super::KvStore;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| EngineError::Persistence(format!("open {}: {e}", path.display())))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                k TEXT PRIMARY KEY,
                v TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| EngineError::Persistence(format!("schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("store lock");
        conn.query_row("SELECT v FROM kv WHERE k = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .map_err(|e| EngineError::Persistence(format!("get {key}: {e}")))
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock");
        conn.execute(
            "INSERT OR REPLACE INTO kv (k, v, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Self::now_ms()],
        )
        .map_err(|e| EngineError::Persistence(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock");
        conn.execute("DELETE FROM kv WHERE k = ?1", params![key])
            .map_err(|e| EngineError::Persistence(format!("delete {key}: {e}")))?;
        Ok(())
    }
}
