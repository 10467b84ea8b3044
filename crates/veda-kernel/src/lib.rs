use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(any(test, feature = "test_support"))]
pub mod memory;
mod store;

pub use store::{
    tail, ArchiveOutcome, ArchiveRow, ArchiveSummary, MessageRow, MessageStore, NewMessage,
    StoreError, TruncateOutcome,
};

/// SQLite-backed message ledger.
#[derive(Clone, Debug)]
pub struct Kernel {
    db_path: PathBuf,
    busy_ms: u64,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

const MESSAGE_COLUMNS: &str = "id,timestamp,wallet_address,query,response";

impl Kernel {
    /// Accepts a plain path or a `sqlite:`/`sqlite://` URL.
    pub fn open_url(url: &str) -> Result<Self, StoreError> {
        Self::open(&Self::path_from_url(url))
    }

    pub fn path_from_url(url: &str) -> PathBuf {
        let trimmed = url.trim();
        let raw = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        PathBuf::from(raw)
    }

    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("create {}: {}", parent.display(), e))
            })?;
        }
        // Busy timeout (default 5000ms; override with VEDA_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("VEDA_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let kernel = Self {
            db_path: db_path.to_path_buf(),
            busy_ms,
        };
        let conn = kernel.conn()?;
        // Pragmas tuned for async server usage
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_schema(&conn)?;
        info!(path = %kernel.db_path.display(), "message store ready");
        Ok(kernel)
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            -- Live ledger: append-only, cleared only by archive/reset
            CREATE TABLE IF NOT EXISTS messages (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
              wallet_address TEXT NOT NULL,
              query TEXT NOT NULL,
              response TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_time ON messages(timestamp);

            -- Cold storage: one JSON blob per reset
            CREATE TABLE IF NOT EXISTS chat_archives (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              archive_name TEXT NOT NULL UNIQUE,
              archive_date TEXT NOT NULL,
              message_count INTEGER NOT NULL,
              messages TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_millis(self.busy_ms))?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn read_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            wallet_address: row.get(2)?,
            query: row.get(3)?,
            response: row.get(4)?,
        })
    }

    fn read_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchiveSummary> {
        let count: i64 = row.get(3)?;
        Ok(ArchiveSummary {
            id: row.get(0)?,
            archive_name: row.get(1)?,
            archive_date: row.get(2)?,
            message_count: usize::try_from(count).unwrap_or_default(),
        })
    }

    fn select_recent(conn: &Connection, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError> {
        let mut out = Vec::new();
        match limit {
            Some(n) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM (
                       SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY timestamp DESC, id DESC LIMIT ?
                     ) ORDER BY timestamp ASC, id ASC"
                ))?;
                let limit = i64::try_from(n).unwrap_or(i64::MAX);
                for row in stmt.query_map(params![limit], Self::read_message)? {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY timestamp ASC, id ASC"
                ))?;
                for row in stmt.query_map([], Self::read_message)? {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    fn insert_archive(conn: &Connection, name: &str, rows: &[MessageRow]) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(rows).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO chat_archives(archive_name,archive_date,message_count,messages) VALUES (?,?,?,?)",
            params![name, now, rows.len() as i64, payload],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::NameTaken(name.to_string())
            }
            other => other.into(),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn append_message(&self, message: &NewMessage) -> Result<MessageRow, StoreError> {
        let conn = self.conn()?;
        let row = conn.query_row(
            &format!(
                "INSERT INTO messages(wallet_address,query,response) VALUES (?,?,?) RETURNING {MESSAGE_COLUMNS}"
            ),
            params![message.wallet_address(), message.query(), message.response()],
            Self::read_message,
        )?;
        debug!(id = row.id, wallet = %row.wallet_address, "message appended");
        Ok(row)
    }

    pub fn recent_messages(&self, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError> {
        let conn = self.conn()?;
        Self::select_recent(&conn, limit)
    }

    pub fn put_archive(&self, name: &str, rows: &[MessageRow]) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        Self::insert_archive(&conn, name, rows)
    }

    pub fn clear_messages(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM messages", [])?)
    }

    pub fn clear_messages_through(&self, max_id: i64) -> Result<TruncateOutcome, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("DELETE FROM messages WHERE id <= ? RETURNING id")?;
        let mut out = TruncateOutcome::default();
        for id in stmt.query_map(params![max_id], |row| row.get::<_, i64>(0))? {
            let id = id?;
            out.removed += 1;
            out.through_id = Some(out.through_id.map_or(id, |cur: i64| cur.max(id)));
        }
        Ok(out)
    }

    pub fn archives(&self, limit: usize) -> Result<Vec<ArchiveSummary>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id,archive_name,archive_date,message_count FROM chat_archives ORDER BY id DESC LIMIT ?",
        )?;
        let mut out = Vec::new();
        for row in stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::read_summary)? {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn archive(&self, name: &str) -> Result<Option<ArchiveRow>, StoreError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id,archive_name,archive_date,message_count,messages FROM chat_archives WHERE archive_name=? LIMIT 1",
                params![name],
                |row| Ok((Self::read_summary(row)?, row.get::<_, String>(4)?)),
            )
            .optional()?;
        let Some((summary, payload)) = found else {
            return Ok(None);
        };
        let messages: Vec<MessageRow> =
            serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(ArchiveRow { summary, messages }))
    }

    /// Read, archive and delete inside one immediate transaction so no append
    /// can land between the snapshot and the delete.
    pub fn archive_and_reset_tx(&self, name: &str) -> Result<ArchiveOutcome, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = Self::select_recent(&tx, None)?;
        let Some(through_id) = rows.iter().map(|r| r.id).max() else {
            return Ok(ArchiveOutcome::default());
        };
        Self::insert_archive(&tx, name, &rows)?;
        tx.execute("DELETE FROM messages WHERE id <= ?", params![through_id])?;
        tx.commit()?;
        info!(archive = name, messages = rows.len(), through_id, "ledger archived and reset");
        Ok(ArchiveOutcome {
            archive_name: Some(name.to_string()),
            message_count: rows.len(),
            through_id: Some(through_id),
        })
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------
    // These helpers offload rusqlite work from async executors.

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Kernel) -> Result<T, StoreError> + Send + 'static,
    {
        let k = self.clone();
        tokio::task::spawn_blocking(move || f(&k))
            .await
            .map_err(|e| StoreError::Unavailable(format!("join error: {}", e)))?
    }
}

#[async_trait]
impl MessageStore for Kernel {
    async fn append(&self, message: NewMessage) -> Result<MessageRow, StoreError> {
        self.blocking(move |k| k.append_message(&message)).await
    }

    async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError> {
        self.blocking(move |k| k.recent_messages(limit)).await
    }

    async fn write_archive(&self, name: &str, rows: &[MessageRow]) -> Result<i64, StoreError> {
        let name = name.to_string();
        let rows = rows.to_vec();
        self.blocking(move |k| k.put_archive(&name, &rows)).await
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        self.blocking(|k| k.clear_messages().map(|_| ())).await
    }

    async fn truncate_through(&self, max_id: i64) -> Result<TruncateOutcome, StoreError> {
        self.blocking(move |k| k.clear_messages_through(max_id)).await
    }

    async fn list_archives(&self, limit: usize) -> Result<Vec<ArchiveSummary>, StoreError> {
        self.blocking(move |k| k.archives(limit)).await
    }

    async fn get_archive(&self, name: &str) -> Result<Option<ArchiveRow>, StoreError> {
        let name = name.to_string();
        self.blocking(move |k| k.archive(&name)).await
    }

    async fn archive_and_reset(&self, name: &str) -> Result<ArchiveOutcome, StoreError> {
        let name = name.to_string();
        self.blocking(move |k| k.archive_and_reset_tx(&name)).await
    }
}
