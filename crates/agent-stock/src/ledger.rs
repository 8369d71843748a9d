//! Trade ledger collaborator
//!
//! Both ledgers reject a trade that repeats an order recorded within the
//! duplicate window, so a retried or double-sent `save_trade` records once.

use crate::error::{Result, StockError};
use crate::trade::Trade;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

/// Append-only store of trades
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeLedger: Send + Sync {
    /// Record a trade and return its id
    async fn record(&self, trade: Trade) -> Result<u64>;

    /// Trades in recording order, optionally for one stock
    async fn list(&self, stock_code: Option<String>) -> Result<Vec<Trade>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct LedgerBook {
    trades: Vec<Trade>,
}

impl LedgerBook {
    fn next_id(&self) -> u64 {
        self.trades.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1
    }

    fn append(&mut self, mut trade: Trade, window: Duration) -> Result<u64> {
        if trade.stock_code.len() != 6 || !trade.stock_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(StockError::InvalidCode(trade.stock_code));
        }
        if trade.price <= 0.0 || trade.quantity == 0 {
            return Err(StockError::Ledger("price and quantity must be positive".to_string()));
        }

        let now = Utc::now();
        if !window.is_zero() {
            let window = chrono::Duration::from_std(window)
                .map_err(|e| StockError::Config(e.to_string()))?;
            if let Some(previous) = self
                .trades
                .iter()
                .rev()
                .find(|t| t.same_order(&trade) && now - t.recorded_at < window)
            {
                return Err(StockError::DuplicateTrade(format!(
                    "{} {} {} @ {} x{} already recorded as #{}",
                    previous.date,
                    previous.direction,
                    previous.stock_code,
                    previous.price,
                    previous.quantity,
                    previous.id.unwrap_or_default()
                )));
            }
        }

        let id = self.next_id();
        trade.id = Some(id);
        trade.recorded_at = now;
        self.trades.push(trade);
        Ok(id)
    }

    fn list(&self, stock_code: Option<&str>) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| stock_code.is_none_or(|code| t.stock_code == code))
            .cloned()
            .collect()
    }
}

/// Ledger kept in process memory
#[derive(Debug)]
pub struct InMemoryTradeLedger {
    book: RwLock<LedgerBook>,
    window: Duration,
}

impl InMemoryTradeLedger {
    pub fn new(duplicate_window: Duration) -> Self {
        Self {
            book: RwLock::new(LedgerBook::default()),
            window: duplicate_window,
        }
    }
}

#[async_trait]
impl TradeLedger for InMemoryTradeLedger {
    async fn record(&self, trade: Trade) -> Result<u64> {
        self.book.write().await.append(trade, self.window)
    }

    async fn list(&self, stock_code: Option<String>) -> Result<Vec<Trade>> {
        Ok(self.book.read().await.list(stock_code.as_deref()))
    }
}

/// Ledger persisted as a JSON array, e.g. `data/trades.json`
///
/// Writes go through a temporary sibling and a rename. The mutex serialises
/// writers from concurrent runs.
#[derive(Debug)]
pub struct JsonFileTradeLedger {
    path: PathBuf,
    book: Mutex<LedgerBook>,
    window: Duration,
}

impl JsonFileTradeLedger {
    /// Open the ledger at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>, duplicate_window: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let book = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => LedgerBook::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerBook::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), trades = book.trades.len(), "trade ledger opened");
        Ok(Self {
            path,
            book: Mutex::new(book),
            window: duplicate_window,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, book: &LedgerBook) -> Result<()> {
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
impl TradeLedger for JsonFileTradeLedger {
    #[instrument(skip(self, trade), fields(stock = %trade.stock_code, direction = %trade.direction))]
    async fn record(&self, trade: Trade) -> Result<u64> {
        let mut book = self.book.lock().await;
        let mut staged = book.clone();
        let id = staged.append(trade, self.window)?;
        self.persist(&staged).await?;
        *book = staged;
        Ok(id)
    }

    async fn list(&self, stock_code: Option<String>) -> Result<Vec<Trade>> {
        Ok(self.book.lock().await.list(stock_code.as_deref()))
    }
}
