//! JSON-file backed memory store

use crate::store::MemoryBook;
use crate::{Category, MemoryEntry, MemoryFilter, MemoryStore, Result, StockNote};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Memory store persisted as a single pretty-printed JSON document
///
/// Every mutation rewrites the file through a temporary sibling and a
/// rename, so a crash never leaves a half-written document behind. The
/// mutex serialises writers from concurrent runs within one process.
#[derive(Debug)]
pub struct JsonFileMemoryStore {
    path: PathBuf,
    book: Mutex<MemoryBook>,
}

impl JsonFileMemoryStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let book = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => MemoryBook::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryBook::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "memory store opened");
        Ok(Self {
            path,
            book: Mutex::new(book),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, book: &MemoryBook) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(book)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for JsonFileMemoryStore {
    async fn read(&self, category: Category, filter: &MemoryFilter) -> Result<Vec<MemoryEntry>> {
        Ok(self.book.lock().await.read(category, filter))
    }

    #[instrument(skip(self, entry), fields(category = %entry.category))]
    async fn write(&self, entry: MemoryEntry) -> Result<u64> {
        let mut book = self.book.lock().await;
        let mut staged = book.clone();
        let id = staged.write(entry)?;
        self.persist(&staged).await?;
        *book = staged;
        Ok(id)
    }

    #[instrument(skip(self, note), fields(stock = %note.stock_code))]
    async fn record_stock_context(&self, note: StockNote) -> Result<u64> {
        let mut book = self.book.lock().await;
        let mut staged = book.clone();
        let id = staged.record_stock_context(note)?;
        self.persist(&staged).await?;
        *book = staged;
        Ok(id)
    }

    async fn stock_history(&self, code: &str, limit: usize) -> Result<Vec<StockNote>> {
        Ok(self.book.lock().await.stock_history(code, limit))
    }
}
