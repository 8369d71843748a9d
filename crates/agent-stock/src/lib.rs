//! A-share analysis assistant built on the agent workflow
//!
//! A request passes through six stages: the classifier decides the intent
//! (keyword rules first, LLM label as fallback), the planner turns it into
//! tool calls, the data fetcher runs them, the analyzer derives indicators
//! and statistics, the reporter assembles a structured [`Report`] and the
//! responder renders the reply. Failures along the way degrade the report
//! instead of aborting the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_stock::{SnapshotMarketData, StockAgent};
//! use std::sync::Arc;
//!
//! # async fn example(provider: Arc<dyn agent_llm::LLMProvider>) -> anyhow::Result<()> {
//! let market = SnapshotMarketData::from_json_file("data/market.json").await?;
//! let agent = StockAgent::builder()
//!     .provider(provider)
//!     .market(Arc::new(market))
//!     .build()?;
//!
//! let out = agent.run("分析一下600519", &[]).await;
//! println!("{}", out.final_message);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod ledger;
pub mod market;
pub mod nodes;
pub mod prompts;
pub mod report;
pub mod router;
pub mod tools;
pub mod trade;

#[cfg(test)]
mod testing;

pub use config::StockConfig;
pub use engine::{RunOutput, StockAgent, StockAgentBuilder};
pub use error::{Result, StockError};
pub use ledger::{InMemoryTradeLedger, JsonFileTradeLedger, TradeLedger};
pub use market::{MarketData, SnapshotMarketData};
pub use report::{Report, SectionKind};
pub use router::Intent;
pub use trade::{Direction, Trade, TradeStats};
