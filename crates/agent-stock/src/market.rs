//! Market data collaborator
//!
//! The tools reach market data only through [`MarketData`]. The bundled
//! implementation serves a JSON snapshot; live data sources plug in behind
//! the same trait.

use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Real-time quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub stock_code: String,
    pub name: String,
    pub price: f64,
    /// Percent change against the previous close
    pub change_pct: f64,
    #[serde(default)]
    pub volume: f64,
}

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    /// Turnover in yuan
    #[serde(default)]
    pub amount: f64,
}

/// Reference data for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub stock_code: String,
    pub name: String,
    #[serde(default)]
    pub industry: String,
    /// Total market value in yuan
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
}

/// Net fund flow into one sector for the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorFlow {
    pub sector: String,
    /// Net inflow in yuan; negative for outflow
    pub net_inflow: f64,
    pub change_pct: f64,
}

/// Source of quotes, bars, reference data and sector flows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, code: &str) -> Result<Quote>;

    /// Most recent `days` bars, oldest first
    async fn kline(&self, code: &str, days: usize) -> Result<Vec<KlineBar>>;

    async fn info(&self, code: &str) -> Result<StockInfo>;

    async fn sector_flow(&self) -> Result<Vec<SectorFlow>>;
}

/// Everything [`SnapshotMarketData`] serves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub quotes: BTreeMap<String, Quote>,
    #[serde(default)]
    pub klines: BTreeMap<String, Vec<KlineBar>>,
    #[serde(default)]
    pub info: BTreeMap<String, StockInfo>,
    #[serde(default)]
    pub sectors: Vec<SectorFlow>,
}

/// Market data served from a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotMarketData {
    snapshot: MarketSnapshot,
}

impl SnapshotMarketData {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot document such as `data/market.json`
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let snapshot: MarketSnapshot = serde_json::from_str(&text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            stocks = snapshot.info.len(),
            sectors = snapshot.sectors.len(),
            "market snapshot loaded"
        );
        Ok(Self { snapshot })
    }

    pub fn snapshot(&self) -> &MarketSnapshot {
        &self.snapshot
    }
}

fn unavailable(code: &str, reason: &str) -> StockError {
    StockError::DataUnavailable {
        code: code.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl MarketData for SnapshotMarketData {
    async fn quote(&self, code: &str) -> Result<Quote> {
        if let Some(quote) = self.snapshot.quotes.get(code) {
            return Ok(quote.clone());
        }
        // Derive from the last two bars when no quote was captured
        let bars = self
            .snapshot
            .klines
            .get(code)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| unavailable(code, "no quote"))?;
        let last = &bars[bars.len() - 1];
        let change_pct = match bars.len() {
            n if n >= 2 && bars[n - 2].close > 0.0 => (last.close / bars[n - 2].close - 1.0) * 100.0,
            _ => 0.0,
        };
        let name = self
            .snapshot
            .info
            .get(code)
            .map(|i| i.name.clone())
            .unwrap_or_default();
        Ok(Quote {
            stock_code: code.to_string(),
            name,
            price: last.close,
            change_pct,
            volume: last.volume,
        })
    }

    async fn kline(&self, code: &str, days: usize) -> Result<Vec<KlineBar>> {
        let bars = self
            .snapshot
            .klines
            .get(code)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| unavailable(code, "no daily bars"))?;
        Ok(bars[bars.len().saturating_sub(days)..].to_vec())
    }

    async fn info(&self, code: &str) -> Result<StockInfo> {
        self.snapshot
            .info
            .get(code)
            .cloned()
            .ok_or_else(|| unavailable(code, "unknown stock"))
    }

    async fn sector_flow(&self) -> Result<Vec<SectorFlow>> {
        if self.snapshot.sectors.is_empty() {
            return Err(unavailable("market", "no sector flow"));
        }
        Ok(self.snapshot.sectors.clone())
    }
}

/// Breadth and leaders of one session's sector flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Largest net inflows, biggest first
    pub top_inflow: Vec<SectorFlow>,
    /// Largest net outflows, biggest first
    pub top_outflow: Vec<SectorFlow>,
    /// Sectors with a positive change
    pub advancing: usize,
    pub declining: usize,
    pub total_net_inflow: f64,
}

impl MarketOverview {
    pub fn from_flows(flows: &[SectorFlow], top: usize) -> Self {
        let mut sorted = flows.to_vec();
        sorted.sort_by(|a, b| b.net_inflow.total_cmp(&a.net_inflow));

        let top_inflow = sorted.iter().filter(|f| f.net_inflow > 0.0).take(top).cloned().collect();
        let top_outflow = sorted
            .iter()
            .rev()
            .filter(|f| f.net_inflow < 0.0)
            .take(top)
            .cloned()
            .collect();

        Self {
            top_inflow,
            top_outflow,
            advancing: flows.iter().filter(|f| f.change_pct > 0.0).count(),
            declining: flows.iter().filter(|f| f.change_pct < 0.0).count(),
            total_net_inflow: flows.iter().map(|f| f.net_inflow).sum(),
        }
    }
}
