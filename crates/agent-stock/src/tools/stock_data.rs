//! Tools for quotes, daily bars and stock reference data

use agent_core::ToolError;
use agent_tools::{Tool, schema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::names;
use crate::cache::{CacheKey, CacheSet};
use crate::error::StockError;
use crate::market::MarketData;

#[derive(Debug, Deserialize)]
struct CodeParams {
    stock_code: String,
}

#[derive(Debug, Deserialize)]
struct KlineParams {
    stock_code: String,
    #[serde(default)]
    days: Option<usize>,
}

fn parse<T: for<'de> Deserialize<'de>>(tool: &str, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::invalid_params(tool, e.to_string()))
}

fn code_schema() -> Value {
    schema::object(json!({ "stock_code": schema::stock_code() }), &["stock_code"])
}

/// Real-time quote
pub struct StockPriceTool {
    market: Arc<dyn MarketData>,
    caches: CacheSet,
}

impl StockPriceTool {
    pub fn new(market: Arc<dyn MarketData>, caches: CacheSet) -> Self {
        Self { market, caches }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let CodeParams { stock_code } = parse(self.name(), params)?;
        let key = CacheKey::new(&stock_code, "quote", "");
        self.caches
            .realtime
            .get_or_fetch(key, || async {
                let quote = self.market.quote(&stock_code).await?;
                Ok::<_, StockError>(serde_json::to_value(quote)?)
            })
            .await
            .map_err(|e| e.into_tool_error(names::GET_STOCK_PRICE))
    }

    fn name(&self) -> &'static str {
        names::GET_STOCK_PRICE
    }

    fn description(&self) -> &'static str {
        "获取股票实时行情：最新价、涨跌幅、成交量"
    }

    fn input_schema(&self) -> Value {
        code_schema()
    }
}

/// Most recent daily bars
pub struct KlineTool {
    market: Arc<dyn MarketData>,
    caches: CacheSet,
    default_days: usize,
}

impl KlineTool {
    pub fn new(market: Arc<dyn MarketData>, caches: CacheSet, default_days: usize) -> Self {
        Self {
            market,
            caches,
            default_days,
        }
    }
}

#[async_trait]
impl Tool for KlineTool {
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: KlineParams = parse(self.name(), params)?;
        let days = params.days.unwrap_or(self.default_days);
        let code = params.stock_code;

        let key = CacheKey::new(&code, "kline", days);
        self.caches
            .reference
            .get_or_fetch(key, || async {
                let bars = self.market.kline(&code, days).await?;
                if bars.is_empty() {
                    return Err(StockError::DataUnavailable {
                        code: code.clone(),
                        reason: "no daily bars".to_string(),
                    });
                }
                Ok::<_, StockError>(json!({
                    "stock_code": code,
                    "days": days,
                    "count": bars.len(),
                    "bars": bars,
                }))
            })
            .await
            .map_err(|e| e.into_tool_error(names::GET_KLINE))
    }

    fn name(&self) -> &'static str {
        names::GET_KLINE
    }

    fn description(&self) -> &'static str {
        "获取股票日K线数据（开高低收、成交量），按日期升序"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "stock_code": schema::stock_code(),
                "days": schema::integer_min("Number of most recent trading days", 1),
            }),
            &["stock_code"],
        )
    }
}

/// Name, industry and valuation of one stock
pub struct StockInfoTool {
    market: Arc<dyn MarketData>,
    caches: CacheSet,
}

impl StockInfoTool {
    pub fn new(market: Arc<dyn MarketData>, caches: CacheSet) -> Self {
        Self { market, caches }
    }
}

#[async_trait]
impl Tool for StockInfoTool {
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let CodeParams { stock_code } = parse(self.name(), params)?;
        let key = CacheKey::new(&stock_code, "info", "");
        self.caches
            .reference
            .get_or_fetch(key, || async {
                let info = self.market.info(&stock_code).await?;
                Ok::<_, StockError>(serde_json::to_value(info)?)
            })
            .await
            .map_err(|e| e.into_tool_error(names::GET_STOCK_INFO))
    }

    fn name(&self) -> &'static str {
        names::GET_STOCK_INFO
    }

    fn description(&self) -> &'static str {
        "获取股票基本信息：名称、所属行业、总市值、市盈率"
    }

    fn input_schema(&self) -> Value {
        code_schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MockMarketData, Quote, SnapshotMarketData};
    use crate::testing::fixture_snapshot;
    use agent_core::ToolErrorKind;
    use std::time::Duration;

    fn caches() -> CacheSet {
        CacheSet::new(Duration::from_secs(60), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_quote_is_cached() {
        let mut market = MockMarketData::new();
        market.expect_quote().times(1).returning(|code| {
            Ok(Quote {
                stock_code: code.to_string(),
                name: "贵州茅台".to_string(),
                price: 1700.0,
                change_pct: 1.2,
                volume: 1e6,
            })
        });
        let tool = StockPriceTool::new(Arc::new(market), caches());

        for _ in 0..2 {
            let out = tool.execute(json!({"stock_code": "600519"})).await.unwrap();
            assert_eq!(out["price"], 1700.0);
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_transient() {
        let mut market = MockMarketData::new();
        market
            .expect_info()
            .returning(|_| Err(StockError::Upstream("connection reset".into())));
        let tool = StockInfoTool::new(Arc::new(market), caches());

        let err = tool.execute(json!({"stock_code": "600519"})).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Transient);
        assert_eq!(err.tool, names::GET_STOCK_INFO);
    }

    #[tokio::test]
    async fn test_kline_defaults_days() {
        let market = Arc::new(SnapshotMarketData::new(fixture_snapshot()));
        let tool = KlineTool::new(market, caches(), 20);

        let out = tool.execute(json!({"stock_code": "600519"})).await.unwrap();
        assert_eq!(out["days"], 20);
        assert_eq!(out["bars"].as_array().unwrap().len(), 20);

        let out = tool.execute(json!({"stock_code": "600519", "days": 5})).await.unwrap();
        assert_eq!(out["count"], 5);
    }

    #[tokio::test]
    async fn test_unknown_stock_fails() {
        let market = Arc::new(SnapshotMarketData::new(fixture_snapshot()));
        let tool = KlineTool::new(market, caches(), 20);
        let err = tool.execute(json!({"stock_code": "999999"})).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Failed);
    }
}
