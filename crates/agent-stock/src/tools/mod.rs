//! The fixed tool catalogue
//!
//! Workflow stages reach market data and the trade ledger only through these
//! tools, called by name via the runtime.

pub mod sector;
pub mod stock_data;
pub mod trades;

pub use sector::SectorFlowTool;
pub use stock_data::{KlineTool, StockInfoTool, StockPriceTool};
pub use trades::{GetTradesTool, SaveTradeTool};

use agent_tools::ToolRegistry;
use std::sync::Arc;

use crate::cache::CacheSet;
use crate::config::StockConfig;
use crate::ledger::TradeLedger;
use crate::market::MarketData;

/// Registered tool names
pub mod names {
    pub const GET_STOCK_PRICE: &str = "get_stock_price";
    pub const GET_KLINE: &str = "get_kline";
    pub const GET_STOCK_INFO: &str = "get_stock_info";
    pub const GET_SECTOR_FLOW: &str = "get_sector_flow";
    pub const SAVE_TRADE: &str = "save_trade";
    pub const GET_TRADES: &str = "get_trades";
}

/// Human-readable label of the data a tool provides, used in caveats
pub fn data_label(tool: &str) -> &str {
    match tool {
        names::GET_STOCK_PRICE => "实时行情",
        names::GET_KLINE => "K线数据",
        names::GET_STOCK_INFO => "股票基本信息",
        names::GET_SECTOR_FLOW => "板块资金流数据",
        names::SAVE_TRADE => "交易保存",
        names::GET_TRADES => "交易记录",
        other => other,
    }
}

/// Build the registry holding all six tools
///
/// Market tools share one pair of caches, so a quote fetched by one run is
/// reused by concurrent runs until its TTL expires.
pub fn catalogue(
    market: Arc<dyn MarketData>,
    ledger: Arc<dyn TradeLedger>,
    config: &StockConfig,
) -> ToolRegistry {
    let caches = CacheSet::new(config.cache_ttl_realtime, config.cache_ttl_reference);

    ToolRegistry::new()
        .with_tool(Arc::new(StockPriceTool::new(market.clone(), caches.clone())))
        .with_tool(Arc::new(KlineTool::new(
            market.clone(),
            caches.clone(),
            config.kline_days,
        )))
        .with_tool(Arc::new(StockInfoTool::new(market.clone(), caches.clone())))
        .with_tool(Arc::new(SectorFlowTool::new(market.clone(), caches)))
        .with_tool(Arc::new(SaveTradeTool::new(ledger.clone(), market)))
        .with_tool(Arc::new(GetTradesTool::new(ledger)))
}
