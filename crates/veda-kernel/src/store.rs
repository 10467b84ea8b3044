use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One persisted chat exchange. Rows are created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: i64,
    pub timestamp: String,
    pub wallet_address: String,
    pub query: String,
    pub response: String,
}

/// Validated input for [`MessageStore::append`]; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    wallet_address: String,
    query: String,
    response: String,
}

impl NewMessage {
    pub fn new(
        wallet_address: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let msg = Self {
            wallet_address: wallet_address.into(),
            query: query.into(),
            response: response.into(),
        };
        for (field, value) in [
            ("walletAddress", &msg.wallet_address),
            ("query", &msg.query),
            ("response", &msg.response),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Invalid(format!("{field} must not be empty")));
            }
        }
        Ok(msg)
    }

    pub fn wallet_address(&self) -> &str {
        &self.wallet_address
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn response(&self) -> &str {
        &self.response
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub id: i64,
    pub archive_name: String,
    pub archive_date: String,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRow {
    #[serde(flatten)]
    pub summary: ArchiveSummary,
    pub messages: Vec<MessageRow>,
}

/// Result of a completed archive/reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    /// `None` when the store was empty and nothing was archived.
    pub archive_name: Option<String>,
    pub message_count: usize,
    /// Highest message id removed from the live store.
    pub through_id: Option<i64>,
}

/// What a `truncate_through` call actually removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncateOutcome {
    pub removed: usize,
    /// Highest id deleted; `None` when nothing matched.
    pub through_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("invalid message: {0}")]
    Invalid(String),
    #[error("archive {archive_name} written ({message_count} messages) but truncate through id {through_id} failed: {reason}")]
    PartialArchive {
        archive_name: String,
        message_count: usize,
        through_id: i64,
        reason: String,
    },
    #[error("corrupt archive payload: {0}")]
    Corrupt(String),
    #[error("archive name {0} already exists")]
    NameTaken(String),
    #[error("rows through id {through_id} are not covered by any archive")]
    NotArchived {
        through_id: i64,
        archived_through: Option<i64>,
    },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "storage_unavailable",
            StoreError::Invalid(_) => "invalid_message",
            StoreError::PartialArchive { .. } => "archive_partial_failure",
            StoreError::Corrupt(_) => "archive_corrupt",
            StoreError::NameTaken(_) => "archive_name_taken",
            StoreError::NotArchived { .. } => "truncate_not_archived",
        }
    }
}

/// Durable, append-only message log plus its cold archive.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: NewMessage) -> Result<MessageRow, StoreError>;

    /// At most `limit` newest rows, oldest first. `None` returns everything.
    async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError>;

    async fn list_all(&self) -> Result<Vec<MessageRow>, StoreError> {
        self.list_recent(None).await
    }

    async fn write_archive(&self, name: &str, rows: &[MessageRow]) -> Result<i64, StoreError>;

    async fn truncate_all(&self) -> Result<(), StoreError>;

    /// Remove rows with `id <= max_id`.
    async fn truncate_through(&self, max_id: i64) -> Result<TruncateOutcome, StoreError>;

    async fn list_archives(&self, limit: usize) -> Result<Vec<ArchiveSummary>, StoreError>;

    async fn get_archive(&self, name: &str) -> Result<Option<ArchiveRow>, StoreError>;

    /// Snapshot every live row into a named archive, then clear what was archived.
    ///
    /// The truncate only runs after the archive write succeeded, and only removes
    /// rows covered by the snapshot. Stores with transactions override this with
    /// an atomic version.
    async fn archive_and_reset(&self, name: &str) -> Result<ArchiveOutcome, StoreError> {
        let rows = self.list_all().await?;
        let Some(through_id) = rows.iter().map(|r| r.id).max() else {
            return Ok(ArchiveOutcome::default());
        };
        self.write_archive(name, &rows).await?;
        if let Err(err) = self.truncate_through(through_id).await {
            return Err(StoreError::PartialArchive {
                archive_name: name.to_string(),
                message_count: rows.len(),
                through_id,
                reason: err.to_string(),
            });
        }
        Ok(ArchiveOutcome {
            archive_name: Some(name.to_string()),
            message_count: rows.len(),
            through_id: Some(through_id),
        })
    }
}

/// Keep the newest `limit` rows of an ascending slice.
pub fn tail(rows: &[MessageRow], limit: Option<usize>) -> Vec<MessageRow> {
    match limit {
        Some(n) => rows[rows.len().saturating_sub(n)..].to_vec(),
        None => rows.to_vec(),
    }
}
