use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, info, warn};
use veda_kernel::{
    ArchiveOutcome, ArchiveRow, ArchiveSummary, MessageRow, MessageStore, NewMessage, StoreError,
    TruncateOutcome,
};

use crate::cache::MessageCache;

/// Durable store plus its read cache. Routes go through here, never the store directly.
pub(crate) struct Ledger {
    store: Arc<dyn MessageStore>,
    cache: MessageCache,
}

pub(crate) fn archive_name(now: DateTime<Utc>) -> String {
    let iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("archive_{}", iso.replace([':', '.'], "-"))
}

impl Ledger {
    pub fn new(store: Arc<dyn MessageStore>, cache_capacity: usize) -> Self {
        let cache = MessageCache::new(store.clone(), cache_capacity);
        Self { store, cache }
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.cache.initialize().await
    }

    pub async fn append(&self, message: NewMessage) -> Result<MessageRow, StoreError> {
        let row = self.store.append(message).await?;
        self.cache.record(row.clone()).await;
        Ok(row)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<MessageRow>, StoreError> {
        self.cache.get_recent(limit).await
    }

    pub async fn archive_and_reset(&self) -> Result<ArchiveOutcome, StoreError> {
        let name = archive_name(Utc::now());
        match self.store.archive_and_reset(&name).await {
            Ok(outcome) => {
                if let Some(through_id) = outcome.through_id {
                    self.cache.reset_through(through_id).await;
                }
                info!(
                    archive = outcome.archive_name.as_deref().unwrap_or("-"),
                    count = outcome.message_count,
                    "chat archived"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(archive = %name, code = err.code(), "archive failed: {}", err);
                Err(err)
            }
        }
    }

    /// Finish a reset whose archive landed but whose truncate did not.
    ///
    /// Only rows the newest archive already holds may go; the cache floor
    /// moves to the highest id the store actually removed.
    pub async fn truncate_through(&self, through_id: i64) -> Result<TruncateOutcome, StoreError> {
        let archived_through = self.archived_through().await?;
        if archived_through.is_none_or(|max| through_id > max) {
            warn!(through_id, ?archived_through, "truncate beyond archived rows refused");
            return Err(StoreError::NotArchived {
                through_id,
                archived_through,
            });
        }
        let out = self.store.truncate_through(through_id).await?;
        if let Some(removed_through) = out.through_id {
            self.cache.reset_through(removed_through).await;
        }
        info!(through_id, removed = out.removed, "live messages truncated");
        Ok(out)
    }

    /// Highest message id held by the newest archive.
    async fn archived_through(&self) -> Result<Option<i64>, StoreError> {
        let Some(newest) = self.store.list_archives(1).await?.into_iter().next() else {
            return Ok(None);
        };
        let archive = self.store.get_archive(&newest.archive_name).await?;
        Ok(archive.and_then(|a| a.messages.iter().map(|r| r.id).max()))
    }

    pub async fn archives(&self, limit: usize) -> Result<Vec<ArchiveSummary>, StoreError> {
        self.store.list_archives(limit).await
    }

    pub async fn archive(&self, name: &str) -> Result<Option<ArchiveRow>, StoreError> {
        self.store.get_archive(name).await
    }
}
