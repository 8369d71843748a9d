//! Trade records, FIFO statistics and natural-language trade drafts

use crate::error::StockError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:股|shares?)").expect("valid quantity pattern"));
static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:价格|价|均价|成交价|@|price)\s*[:：]?\s*(\d+(?:\.\d+)?)|(\d+(?:\.\d+)?)\s*元")
        .expect("valid price pattern")
});
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid date pattern"));

/// Side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::Buy => "买入",
            Self::Sell => "卖出",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" | "买" | "买入" => Ok(Self::Buy),
            "sell" | "s" | "卖" | "卖出" => Ok(Self::Sell),
            other => Err(StockError::Other(format!("unknown trade direction '{other}'"))),
        }
    }
}

/// One recorded buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Assigned by the ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub stock_code: String,
    #[serde(default)]
    pub stock_name: String,
    pub direction: Direction,
    pub price: f64,
    pub quantity: u32,
    /// Trading day
    pub date: NaiveDate,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
    /// When the ledger accepted the record
    pub recorded_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        stock_code: impl Into<String>,
        direction: Direction,
        price: f64,
        quantity: u32,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            stock_code: stock_code.into(),
            stock_name: String::new(),
            direction,
            price,
            quantity,
            date,
            reason: String::new(),
            notes: String::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.stock_name = name.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Same order: code, side, price, quantity and trading day all match
    pub fn same_order(&self, other: &Trade) -> bool {
        self.stock_code == other.stock_code
            && self.direction == other.direction
            && (self.price - other.price).abs() < 1e-6
            && self.quantity == other.quantity
            && self.date == other.date
    }

    pub fn amount(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Win/loss statistics over closed trades
///
/// Buys open lots per stock; each sell closes the oldest open lots first.
/// A sell with nothing open is counted in `unmatched_sells` and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Number of closing sells
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Gross profit over gross loss; zero when nothing was lost
    pub profit_ratio: f64,
    pub realized_pnl: f64,
    /// Shares still held per stock
    pub open_positions: BTreeMap<String, u32>,
    pub unmatched_sells: usize,
}

impl TradeStats {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut ordered: Vec<&Trade> = trades.iter().collect();
        ordered.sort_by_key(|t| (t.date, t.recorded_at));

        let mut lots: BTreeMap<&str, VecDeque<(f64, u32)>> = BTreeMap::new();
        let mut stats = Self::default();
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;

        for trade in ordered {
            let open = lots.entry(trade.stock_code.as_str()).or_default();
            match trade.direction {
                Direction::Buy => open.push_back((trade.price, trade.quantity)),
                Direction::Sell => {
                    if open.is_empty() {
                        stats.unmatched_sells += 1;
                        continue;
                    }
                    let mut remaining = trade.quantity;
                    let mut pnl = 0.0;
                    while remaining > 0 {
                        let Some((cost, held)) = open.front_mut() else {
                            break;
                        };
                        let matched = remaining.min(*held);
                        pnl += (trade.price - *cost) * f64::from(matched);
                        *held -= matched;
                        remaining -= matched;
                        if *held == 0 {
                            open.pop_front();
                        }
                    }

                    stats.total += 1;
                    stats.realized_pnl += pnl;
                    if pnl > 0.0 {
                        stats.wins += 1;
                        gross_profit += pnl;
                    } else {
                        stats.losses += 1;
                        gross_loss += pnl.abs();
                    }
                }
            }
        }

        stats.win_rate = if stats.total > 0 {
            stats.wins as f64 / stats.total as f64
        } else {
            0.0
        };
        stats.profit_ratio = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };
        stats.open_positions = lots
            .into_iter()
            .map(|(code, open)| (code.to_string(), open.iter().map(|(_, q)| q).sum::<u32>()))
            .filter(|(_, held)| *held > 0)
            .collect();
        stats
    }
}

/// A trade parsed from free text, possibly missing fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDraft {
    pub direction: Option<Direction>,
    pub stock_code: Option<String>,
    pub quantity: Option<u32>,
    pub price: Option<f64>,
    pub date: NaiveDate,
}

impl TradeDraft {
    /// Parse text such as `买入 600519 100股 价格1700`
    ///
    /// Without an explicit `YYYY-MM-DD` the trade is dated `today`.
    pub fn parse(text: &str, today: NaiveDate) -> Self {
        let lower = text.to_lowercase();
        let direction = if ["买入", "买了", "bought", "buy"].iter().any(|k| lower.contains(k)) {
            Some(Direction::Buy)
        } else if ["卖出", "卖了", "sold", "sell"].iter().any(|k| lower.contains(k)) {
            Some(Direction::Sell)
        } else {
            None
        };

        let quantity = QUANTITY
            .captures(&lower)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|q: &u32| *q > 0);

        let price = PRICE
            .captures(&lower)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|p: &f64| *p > 0.0);

        let date = DATE
            .captures(&lower)
            .and_then(|c| c.get(1))
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
            .unwrap_or(today);

        Self {
            direction,
            stock_code: crate::router::extract_code(&lower),
            quantity,
            price,
            date,
        }
    }

    /// Names of the fields the text did not provide
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.direction.is_none() {
            missing.push("direction");
        }
        if self.stock_code.is_none() {
            missing.push("stock_code");
        }
        if self.quantity.is_none() {
            missing.push("quantity");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        missing
    }

    /// `save_trade` parameters, once every field is present
    pub fn to_params(&self) -> Option<Value> {
        Some(json!({
            "stock_code": self.stock_code.as_ref()?,
            "direction": self.direction?.as_str(),
            "price": self.price?,
            "quantity": self.quantity?,
            "date": self.date.to_string(),
        }))
    }
}

/// Chinese name of a draft field, for clarification prompts
pub fn field_label(field: &str) -> &str {
    match field {
        "direction" => "买卖方向",
        "stock_code" => "股票代码",
        "quantity" => "数量（股）",
        "price" => "成交价格",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn trade(code: &str, direction: Direction, price: f64, qty: u32, d: u32) -> Trade {
        Trade::new(code, direction, price, qty, day(d))
    }

    #[test]
    fn test_fifo_pairs_oldest_lot_first() {
        let trades = vec![
            trade("600519", Direction::Buy, 100.0, 100, 1),
            trade("600519", Direction::Buy, 120.0, 100, 2),
            trade("600519", Direction::Sell, 110.0, 100, 3),
            trade("600519", Direction::Sell, 115.0, 100, 4),
        ];
        let stats = TradeStats::from_trades(&trades);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 0.5).abs() < 1e-9);
        // +1000 against -500
        assert!((stats.profit_ratio - 2.0).abs() < 1e-9);
        assert!((stats.realized_pnl - 500.0).abs() < 1e-9);
        assert!(stats.open_positions.is_empty());
    }

    #[test]
    fn test_partial_lots_and_open_positions() {
        let trades = vec![
            trade("000001", Direction::Buy, 10.0, 300, 1),
            trade("000001", Direction::Sell, 12.0, 100, 2),
            trade("600000", Direction::Sell, 8.0, 100, 2),
        ];
        let stats = TradeStats::from_trades(&trades);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.unmatched_sells, 1);
        assert_eq!(stats.open_positions.get("000001"), Some(&200));
        assert!((stats.profit_ratio).abs() < 1e-9);
    }

    #[test]
    fn test_empty_ledger_stats() {
        let stats = TradeStats::from_trades(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.win_rate.abs() < 1e-9);
    }

    #[test]
    fn test_parse_full_command() {
        let draft = TradeDraft::parse("买入 600519 100股 价格1700", day(5));
        assert_eq!(draft.direction, Some(Direction::Buy));
        assert_eq!(draft.stock_code.as_deref(), Some("600519"));
        assert_eq!(draft.quantity, Some(100));
        assert_eq!(draft.price, Some(1700.0));
        assert_eq!(draft.date, day(5));
        assert!(draft.missing().is_empty());

        let params = draft.to_params().unwrap();
        assert_eq!(params["direction"], "buy");
        assert_eq!(params["date"], "2026-03-05");
    }

    #[test]
    fn test_parse_other_phrasings() {
        let draft = TradeDraft::parse("2026-03-02 卖了000001 500股，成交价12.35", day(5));
        assert_eq!(draft.direction, Some(Direction::Sell));
        assert_eq!(draft.price, Some(12.35));
        assert_eq!(draft.date, day(2));

        let draft = TradeDraft::parse("今天买了 300 股 600036，12.5元", day(5));
        assert_eq!(draft.quantity, Some(300));
        assert_eq!(draft.price, Some(12.5));
    }

    #[test]
    fn test_parse_reports_missing_fields() {
        let draft = TradeDraft::parse("买入600519", day(5));
        assert_eq!(draft.missing(), vec!["quantity", "price"]);
        assert!(draft.to_params().is_none());
    }

    #[test]
    fn test_same_order() {
        let a = trade("600519", Direction::Buy, 1700.0, 100, 1);
        let mut b = a.clone().with_notes("again");
        assert!(a.same_order(&b));
        b.quantity = 200;
        assert!(!a.same_order(&b));
    }
}
