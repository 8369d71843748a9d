//! Shared fixtures for node and engine tests

use agent_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason, TokenUsage,
};
use agent_memory::{
    Category, InMemoryMemoryStore, MemoryEntry, MemoryFilter, MemoryStore, StockNote,
};
use agent_runtime::{AgentRuntime, RetryPolicy, RuntimeConfig};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::ledger::InMemoryTradeLedger;
use crate::market::{KlineBar, MarketData, MarketSnapshot, Quote, SectorFlow, SnapshotMarketData, StockInfo};
use crate::tools::catalogue;

pub(crate) const COMMENTARY_REPLY: &str = "均线多头排列，短线注意量能配合。";
pub(crate) const CHAT_REPLY: &str = "你好！我可以帮你分析股票。";

/// Bars with the given closes on consecutive days from 2026-01-05
pub(crate) fn bars_from_closes(closes: &[f64]) -> Vec<KlineBar> {
    let mut date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    closes
        .iter()
        .map(|&close| {
            let bar = KlineBar {
                date,
                open: close - 0.2,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 10_000.0,
                amount: close * 10_000.0,
            };
            date = date.succ_opt().unwrap();
            bar
        })
        .collect()
}

fn info(code: &str, name: &str, industry: &str, pe: f64, cap: f64) -> StockInfo {
    StockInfo {
        stock_code: code.into(),
        name: name.into(),
        industry: industry.into(),
        market_cap: Some(cap),
        pe_ratio: Some(pe),
    }
}

fn sector(name: &str, net_inflow: f64, change_pct: f64) -> SectorFlow {
    SectorFlow {
        sector: name.into(),
        net_inflow,
        change_pct,
    }
}

/// Two stocks with 60+ bars each and five sectors of mixed flow
pub(crate) fn fixture_snapshot() -> MarketSnapshot {
    let moutai: Vec<f64> = (0..60)
        .map(|i| 1600.0 + f64::from(i) * 1.5 + if i % 3 == 0 { 4.0 } else { 0.0 })
        .collect();
    let pingan: Vec<f64> = (0..64).map(|i| 11.0 + f64::from(i % 7) * 0.1).collect();

    let mut snapshot = MarketSnapshot::default();
    snapshot.klines.insert("600519".into(), bars_from_closes(&moutai));
    snapshot.klines.insert("000001".into(), bars_from_closes(&pingan));
    snapshot.quotes.insert(
        "600519".into(),
        Quote {
            stock_code: "600519".into(),
            name: "贵州茅台".into(),
            price: moutai[59],
            change_pct: 0.4,
            volume: 10_000.0,
        },
    );
    snapshot
        .info
        .insert("600519".into(), info("600519", "贵州茅台", "白酒", 28.5, 2.1e12));
    snapshot
        .info
        .insert("000001".into(), info("000001", "平安银行", "银行", 5.2, 2.2e11));
    snapshot.sectors = vec![
        sector("半导体", 3.2e9, 2.1),
        sector("白酒", 1.1e9, 0.8),
        sector("银行", -4.0e8, -0.3),
        sector("医药", 6.0e8, 0.5),
        sector("房地产", -1.5e9, -1.7),
    ];
    snapshot
}

#[derive(Default)]
struct ProviderState {
    label: Option<String>,
    failing: bool,
}

/// Answers by the kind of system prompt it receives
#[derive(Default)]
pub(crate) struct FakeProvider {
    state: Mutex<ProviderState>,
    calls: AtomicU32,
}

impl FakeProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply with `label` to classification prompts
    pub(crate) fn classify_as(self: Arc<Self>, label: &str) -> Arc<Self> {
        self.state.lock().unwrap().label = Some(label.to_string());
        self
    }

    /// Fail every request
    pub(crate) fn failing(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().failing = true;
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (label, failing) = {
            let state = self.state.lock().unwrap();
            (state.label.clone(), state.failing)
        };
        if failing {
            return Err(LLMError::RequestFailed("provider down".into()));
        }

        let system = request.system.unwrap_or_default();
        let text = if system.contains("意图识别") {
            label.unwrap_or_else(|| "chat".to_string())
        } else if system.contains("技术分析师") {
            COMMENTARY_REPLY.to_string()
        } else {
            CHAT_REPLY.to_string()
        };
        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Snapshot market with switchable faults
pub(crate) struct FixtureMarket {
    inner: SnapshotMarketData,
    fail_info: bool,
    fail_sectors: bool,
    kline_delay: Option<Duration>,
}

impl FixtureMarket {
    pub(crate) fn new() -> Self {
        Self {
            inner: SnapshotMarketData::new(fixture_snapshot()),
            fail_info: false,
            fail_sectors: false,
            kline_delay: None,
        }
    }

    pub(crate) fn fail_info(mut self) -> Self {
        self.fail_info = true;
        self
    }

    pub(crate) fn fail_sectors(mut self) -> Self {
        self.fail_sectors = true;
        self
    }

    /// Stall daily bars past the tool time budget
    pub(crate) fn slow_kline(mut self, delay: Duration) -> Self {
        self.kline_delay = Some(delay);
        self
    }
}

#[async_trait]
impl MarketData for FixtureMarket {
    async fn quote(&self, code: &str) -> Result<Quote> {
        self.inner.quote(code).await
    }

    async fn kline(&self, code: &str, days: usize) -> Result<Vec<KlineBar>> {
        if let Some(delay) = self.kline_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.kline(code, days).await
    }

    async fn info(&self, code: &str) -> Result<StockInfo> {
        if self.fail_info {
            return Err(StockError::Upstream("connection reset".into()));
        }
        self.inner.info(code).await
    }

    async fn sector_flow(&self) -> Result<Vec<SectorFlow>> {
        if self.fail_sectors {
            return Err(StockError::Upstream("connection reset".into()));
        }
        self.inner.sector_flow().await
    }
}

/// Memory store whose every call hangs
pub(crate) struct StalledMemory;

#[async_trait]
impl MemoryStore for StalledMemory {
    async fn read(&self, _category: Category, _filter: &MemoryFilter) -> agent_memory::Result<Vec<MemoryEntry>> {
        std::future::pending().await
    }

    async fn write(&self, _entry: MemoryEntry) -> agent_memory::Result<u64> {
        std::future::pending().await
    }

    async fn record_stock_context(&self, _note: StockNote) -> agent_memory::Result<u64> {
        std::future::pending().await
    }

    async fn stock_history(&self, _code: &str, _limit: usize) -> agent_memory::Result<Vec<StockNote>> {
        std::future::pending().await
    }
}

/// Runtime budgets small enough for tests
pub(crate) fn fast_config() -> RuntimeConfig {
    RuntimeConfig::builder()
        .llm_timeout(Duration::from_millis(200))
        .tool_timeout(Duration::from_millis(100))
        .memory_timeout(Duration::from_millis(50))
        .tool_retry(RetryPolicy::linear(2, Duration::from_millis(1)))
        .completion_retry(RetryPolicy::linear(1, Duration::from_millis(1)))
        .build()
        .unwrap()
}

/// Runtime with no tools, for nodes that only complete or touch memory
pub(crate) fn runtime_with(provider: Arc<FakeProvider>) -> Arc<AgentRuntime> {
    Arc::new(
        AgentRuntime::builder()
            .provider(provider)
            .config(fast_config())
            .build()
            .unwrap(),
    )
}

/// Runtime with the full stock tool catalogue over `market`
pub(crate) fn stock_runtime(provider: Arc<FakeProvider>, market: FixtureMarket) -> Arc<AgentRuntime> {
    let config = StockConfig::default();
    let ledger = Arc::new(InMemoryTradeLedger::new(config.duplicate_trade_window));
    let registry = catalogue(Arc::new(market), ledger, &config);
    Arc::new(
        AgentRuntime::builder()
            .provider(provider)
            .tool_registry(Arc::new(registry))
            .memory(Arc::new(InMemoryMemoryStore::new()))
            .config(fast_config())
            .build()
            .unwrap(),
    )
}
