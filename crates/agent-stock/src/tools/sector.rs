//! Tool for sector fund flows

use agent_core::ToolError;
use agent_tools::{Tool, schema};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::names;
use crate::cache::{CacheKey, CacheSet};
use crate::error::StockError;
use crate::market::MarketData;

/// Net fund flow per sector for the latest session
pub struct SectorFlowTool {
    market: Arc<dyn MarketData>,
    caches: CacheSet,
}

impl SectorFlowTool {
    pub fn new(market: Arc<dyn MarketData>, caches: CacheSet) -> Self {
        Self { market, caches }
    }
}

#[async_trait]
impl Tool for SectorFlowTool {
    async fn execute(&self, _params: Value) -> Result<Value, ToolError> {
        let key = CacheKey::new("market", "sector_flow", "");
        self.caches
            .realtime
            .get_or_fetch(key, || async {
                let mut sectors = self.market.sector_flow().await?;
                sectors.sort_by(|a, b| b.net_inflow.total_cmp(&a.net_inflow));
                Ok::<_, StockError>(json!({
                    "count": sectors.len(),
                    "sectors": sectors,
                }))
            })
            .await
            .map_err(|e| e.into_tool_error(names::GET_SECTOR_FLOW))
    }

    fn name(&self) -> &'static str {
        names::GET_SECTOR_FLOW
    }

    fn description(&self) -> &'static str {
        "获取板块资金流向，按净流入从高到低排列"
    }

    fn input_schema(&self) -> Value {
        schema::object(json!({}), &[])
    }
}
