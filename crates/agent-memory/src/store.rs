//! Memory store trait and the in-process implementation

use crate::{Category, MemoryEntry, MemoryError, MemoryFilter, Result, StockNote};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Durable shared memory consulted and updated by workflow stages
///
/// Implementations must be safe under concurrent runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Entries of `category` matching `filter`, most recently updated first
    async fn read(&self, category: Category, filter: &MemoryFilter) -> Result<Vec<MemoryEntry>>;

    /// Persist an entry and return its id
    ///
    /// Writing content that already exists in the same category refreshes the
    /// existing entry's `updated_at` and returns its id.
    async fn write(&self, entry: MemoryEntry) -> Result<u64>;

    /// Append a per-stock note and return its id
    async fn record_stock_context(&self, note: StockNote) -> Result<u64>;

    /// Latest notes for `code`, newest first
    async fn stock_history(&self, code: &str, limit: usize) -> Result<Vec<StockNote>>;
}

/// Plain data behind every store implementation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct MemoryBook {
    next_id: u64,
    entries: Vec<MemoryEntry>,
    #[serde(default)]
    stock_context: Vec<StockNote>,
}

impl MemoryBook {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn read(&self, category: Category, filter: &MemoryFilter) -> Vec<MemoryEntry> {
        let mut found: Vec<MemoryEntry> = self
            .entries
            .iter()
            .filter(|e| e.category == category && filter.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        found
    }

    pub(crate) fn write(&mut self, mut entry: MemoryEntry) -> Result<u64> {
        let content = entry.content.trim();
        if content.is_empty() {
            return Err(MemoryError::EmptyContent);
        }
        entry.content = content.to_string();

        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.category == entry.category && e.content == entry.content)
        {
            existing.updated_at = Utc::now();
            if let Some(id) = existing.id {
                return Ok(id);
            }
        }

        let id = self.allocate_id();
        entry.id = Some(id);
        self.entries.push(entry);
        Ok(id)
    }

    pub(crate) fn record_stock_context(&mut self, mut note: StockNote) -> Result<u64> {
        if note.content.trim().is_empty() {
            return Err(MemoryError::EmptyContent);
        }
        let id = self.allocate_id();
        note.id = Some(id);
        self.stock_context.push(note);
        Ok(id)
    }

    pub(crate) fn stock_history(&self, code: &str, limit: usize) -> Vec<StockNote> {
        self.stock_context
            .iter()
            .rev()
            .filter(|n| n.stock_code == code)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Process-local store, used by tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    book: RwLock<MemoryBook>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn read(&self, category: Category, filter: &MemoryFilter) -> Result<Vec<MemoryEntry>> {
        Ok(self.book.read().await.read(category, filter))
    }

    async fn write(&self, entry: MemoryEntry) -> Result<u64> {
        self.book.write().await.write(entry)
    }

    async fn record_stock_context(&self, note: StockNote) -> Result<u64> {
        self.book.write().await.record_stock_context(note)
    }

    async fn stock_history(&self, code: &str, limit: usize) -> Result<Vec<StockNote>> {
        Ok(self.book.read().await.stock_history(code, limit))
    }
}
