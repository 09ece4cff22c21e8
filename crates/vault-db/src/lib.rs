pub mod clock;
pub mod ids;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod repository;
pub mod store;

pub use memory::MemoryStore;
pub use repository::{RepositoryError, ScriptRepository};
pub use store::{ScriptStore, UserStore};

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// SQLite-backed store. A single connection serialized behind a mutex;
/// callers run on the blocking pool.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;
        seed_clock(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;
        seed_clock(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Moves the process clock past the newest timestamp already stored.
fn seed_clock(conn: &Connection) -> Result<()> {
    let newest: Option<String> = conn.query_row(
        "SELECT MAX(ts) FROM (
             SELECT MAX(created_at) AS ts FROM scripts
             UNION ALL SELECT MAX(updated_at) FROM scripts
             UNION ALL SELECT MAX(created_at) FROM users
         )",
        [],
        |row| row.get(0),
    )?;

    if let Some(ts) = newest.as_deref().and_then(clock::parse_timestamp) {
        clock::advance_past(ts);
    }
    Ok(())
}
