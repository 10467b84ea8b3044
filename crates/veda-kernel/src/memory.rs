//! In-memory [`MessageStore`] with switchable faults, for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::SecondsFormat;

use crate::store::{
    tail, ArchiveRow, ArchiveSummary, MessageRow, MessageStore, NewMessage, StoreError,
    TruncateOutcome,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<MessageRow>,
    archives: Vec<ArchiveRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    pub fail_reads: AtomicBool,
    pub fail_appends: AtomicBool,
    pub fail_archive_writes: AtomicBool,
    pub fail_truncates: AtomicBool,
}

fn down(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable(format!("{op}: injected failure")))
    } else {
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        for flag in [
            &self.fail_reads,
            &self.fail_appends,
            &self.fail_archive_writes,
            &self.fail_truncates,
        ] {
            flag.store(down, Ordering::SeqCst);
        }
    }

    /// Direct view of the live rows, bypassing fault injection.
    pub fn snapshot(&self) -> Vec<MessageRow> {
        self.inner.lock().expect("memory store poisoned").rows.clone()
    }

    pub fn archive_count(&self) -> usize {
        self.inner.lock().expect("memory store poisoned").archives.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: NewMessage) -> Result<MessageRow, StoreError> {
        down(&self.fail_appends, "append")?;
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.next_id += 1;
        let row = MessageRow {
            id: inner.next_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            wallet_address: message.wallet_address().to_string(),
            query: message.query().to_string(),
            response: message.response().to_string(),
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<MessageRow>, StoreError> {
        down(&self.fail_reads, "list_recent")?;
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(tail(&inner.rows, limit))
    }

    async fn write_archive(&self, name: &str, rows: &[MessageRow]) -> Result<i64, StoreError> {
        down(&self.fail_archive_writes, "write_archive")?;
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if inner.archives.iter().any(|a| a.summary.archive_name == name) {
            return Err(StoreError::NameTaken(name.to_string()));
        }
        let id = inner.archives.len() as i64 + 1;
        inner.archives.push(ArchiveRow {
            summary: ArchiveSummary {
                id,
                archive_name: name.to_string(),
                archive_date: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                message_count: rows.len(),
            },
            messages: rows.to_vec(),
        });
        Ok(id)
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        down(&self.fail_truncates, "truncate_all")?;
        self.inner.lock().expect("memory store poisoned").rows.clear();
        Ok(())
    }

    async fn truncate_through(&self, max_id: i64) -> Result<TruncateOutcome, StoreError> {
        down(&self.fail_truncates, "truncate_through")?;
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let removed: Vec<i64> = inner
            .rows
            .iter()
            .filter(|r| r.id <= max_id)
            .map(|r| r.id)
            .collect();
        inner.rows.retain(|r| r.id > max_id);
        Ok(TruncateOutcome {
            removed: removed.len(),
            through_id: removed.into_iter().max(),
        })
    }

    async fn list_archives(&self, limit: usize) -> Result<Vec<ArchiveSummary>, StoreError> {
        down(&self.fail_reads, "list_archives")?;
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .archives
            .iter()
            .rev()
            .take(limit)
            .map(|a| a.summary.clone())
            .collect())
    }

    async fn get_archive(&self, name: &str) -> Result<Option<ArchiveRow>, StoreError> {
        down(&self.fail_reads, "get_archive")?;
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .archives
            .iter()
            .find(|a| a.summary.archive_name == name)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..n {
            store
                .append(NewMessage::new("W1", format!("q{i}"), "a").unwrap())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn stepwise_archive_reports_partial_failure() {
        let store = seeded(3).await;
        store.fail_truncates.store(true, Ordering::SeqCst);
        let err = store.archive_and_reset("archive_x").await.unwrap_err();
        match err {
            StoreError::PartialArchive {
                archive_name,
                message_count,
                through_id,
                ..
            } => {
                assert_eq!(archive_name, "archive_x");
                assert_eq!(message_count, 3);
                assert_eq!(through_id, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.archive_count(), 1);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn failed_archive_write_never_truncates() {
        let store = seeded(4).await;
        store.fail_archive_writes.store(true, Ordering::SeqCst);
        let err = store.archive_and_reset("archive_y").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.archive_count(), 0);
        assert_eq!(store.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn stepwise_archive_clears_what_it_archived() {
        let store = seeded(5).await;
        let outcome = store.archive_and_reset("archive_z").await.unwrap();
        assert_eq!(outcome.message_count, 5);
        assert_eq!(outcome.archive_name.as_deref(), Some("archive_z"));
        assert!(store.snapshot().is_empty());
        let archived = store.get_archive("archive_z").await.unwrap().unwrap();
        assert_eq!(archived.messages.len(), 5);
    }

    #[tokio::test]
    async fn reused_archive_name_is_rejected_before_truncate() {
        let store = seeded(2).await;
        store.archive_and_reset("archive_dup").await.unwrap();
        store
            .append(NewMessage::new("W1", "again", "a").unwrap())
            .await
            .unwrap();
        let err = store.archive_and_reset("archive_dup").await.unwrap_err();
        assert!(matches!(err, StoreError::NameTaken(_)));
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.archive_count(), 1);
    }
}
