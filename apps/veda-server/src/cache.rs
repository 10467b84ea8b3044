use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use veda_kernel::{MessageRow, MessageStore, StoreError};

#[derive(Default)]
struct CacheState {
    loaded: bool,
    rows: VecDeque<MessageRow>,
    /// Highest id removed by an archive; older rows are never mirrored again.
    floor: i64,
}

/// Bounded in-memory mirror of the newest durable messages.
///
/// The mirror only ever holds rows the store has acknowledged. It is loaded
/// lazily; the lock is held across the load so concurrent readers wait on a
/// single round-trip, and a failed load leaves the cache unloaded for the next
/// caller to retry.
pub(crate) struct MessageCache {
    store: Arc<dyn MessageStore>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl MessageCache {
    pub fn new(store: Arc<dyn MessageStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.load(&mut state).await
    }

    async fn load(&self, state: &mut CacheState) -> Result<(), StoreError> {
        if state.loaded {
            return Ok(());
        }
        let rows = self.store.list_recent(Some(self.capacity)).await?;
        let floor = state.floor;
        state.rows = rows.into_iter().filter(|r| r.id > floor).collect();
        state.loaded = true;
        debug!(rows = state.rows.len(), capacity = self.capacity, "message cache loaded");
        Ok(())
    }

    /// Newest `limit` rows, oldest first.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<MessageRow>, StoreError> {
        if limit > self.capacity {
            return self.store.list_recent(Some(limit)).await;
        }
        let mut state = self.state.lock().await;
        self.load(&mut state).await?;
        let skip = state.rows.len().saturating_sub(limit);
        Ok(state.rows.iter().skip(skip).cloned().collect())
    }

    /// Mirror a row the store has just acknowledged.
    pub async fn record(&self, row: MessageRow) {
        let mut state = self.state.lock().await;
        // an unloaded cache picks the row up from the store on first read
        if !state.loaded || row.id <= state.floor {
            return;
        }
        match state.rows.binary_search_by_key(&row.id, |r| r.id) {
            Ok(_) => {}
            Err(pos) => state.rows.insert(pos, row),
        }
        while state.rows.len() > self.capacity {
            state.rows.pop_front();
        }
    }

    /// Forget everything up to `through_id` after the store removed it.
    pub async fn reset_through(&self, through_id: i64) {
        let mut state = self.state.lock().await;
        state.floor = state.floor.max(through_id);
        state.rows.clear();
        state.loaded = false;
    }
}
