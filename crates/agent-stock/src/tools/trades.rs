//! Tools for recording and querying trades

use agent_core::ToolError;
use agent_tools::{Tool, schema};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use super::names;
use crate::ledger::TradeLedger;
use crate::market::MarketData;
use crate::trade::{Direction, Trade};

#[derive(Debug, Deserialize)]
struct SaveTradeParams {
    stock_code: String,
    #[serde(default)]
    stock_name: Option<String>,
    direction: Direction,
    price: f64,
    quantity: u32,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GetTradesParams {
    #[serde(default)]
    stock_code: Option<String>,
}

/// Record one trade in the ledger
///
/// Not idempotent: the runtime never retries it, and the ledger rejects a
/// repeat of the same order inside its duplicate window.
pub struct SaveTradeTool {
    ledger: Arc<dyn TradeLedger>,
    market: Arc<dyn MarketData>,
}

impl SaveTradeTool {
    pub fn new(ledger: Arc<dyn TradeLedger>, market: Arc<dyn MarketData>) -> Self {
        Self { ledger, market }
    }
}

#[async_trait]
impl Tool for SaveTradeTool {
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let tool = self.name();
        let params: SaveTradeParams =
            serde_json::from_value(params).map_err(|e| ToolError::invalid_params(tool, e.to_string()))?;

        let date = match params.date.as_deref() {
            Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|e| ToolError::invalid_params(tool, format!("date '{text}': {e}")))?,
            None => chrono::Local::now().date_naive(),
        };

        // The name is cosmetic; a lookup failure must not block recording
        let name = match params.stock_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => match self.market.info(&params.stock_code).await {
                Ok(info) => info.name,
                Err(e) => {
                    debug!(error = %e, "stock name lookup failed");
                    String::new()
                }
            },
        };

        let trade = Trade::new(
            params.stock_code,
            params.direction,
            params.price,
            params.quantity,
            date,
        )
        .with_name(name)
        .with_reason(params.reason.unwrap_or_default())
        .with_notes(params.notes.unwrap_or_default());

        let message = format!(
            "已保存交易记录: {} {} @ {}",
            trade.direction, trade.stock_code, trade.price
        );
        let id = self
            .ledger
            .record(trade.clone())
            .await
            .map_err(|e| e.into_tool_error(tool))?;
        info!(id, stock = %trade.stock_code, direction = %trade.direction, "trade recorded");

        Ok(json!({
            "id": id,
            "trade": Trade { id: Some(id), ..trade },
            "message": message,
        }))
    }

    fn name(&self) -> &'static str {
        names::SAVE_TRADE
    }

    fn description(&self) -> &'static str {
        "保存一条交易记录（买入或卖出）；相同委托在短时间内重复提交会被拒绝"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "stock_code": schema::stock_code(),
                "stock_name": schema::string("Display name; looked up when omitted"),
                "direction": schema::string_enum("Trade side", &["buy", "sell"]),
                "price": schema::positive_number("Fill price in yuan"),
                "quantity": schema::integer_min("Number of shares", 1),
                "date": schema::string("Trading day as YYYY-MM-DD; today when omitted"),
                "reason": schema::string("Why the trade was made"),
                "notes": schema::string("Free-form notes"),
            }),
            &["stock_code", "direction", "price", "quantity"],
        )
    }

    fn idempotent(&self) -> bool {
        false
    }
}

/// List recorded trades, optionally for one stock
pub struct GetTradesTool {
    ledger: Arc<dyn TradeLedger>,
}

impl GetTradesTool {
    pub fn new(ledger: Arc<dyn TradeLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for GetTradesTool {
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let tool = self.name();
        let params: GetTradesParams =
            serde_json::from_value(params).map_err(|e| ToolError::invalid_params(tool, e.to_string()))?;

        let trades = self
            .ledger
            .list(params.stock_code.clone())
            .await
            .map_err(|e| e.into_tool_error(tool))?;

        Ok(json!({
            "stock_code": params.stock_code,
            "count": trades.len(),
            "trades": trades,
        }))
    }

    fn name(&self) -> &'static str {
        names::GET_TRADES
    }

    fn description(&self) -> &'static str {
        "查询交易记录，可按股票代码过滤"
    }

    fn input_schema(&self) -> Value {
        schema::object(json!({ "stock_code": schema::stock_code() }), &[])
    }
}
