//! Technical indicators and signal checks over daily bars

use crate::error::{Result, StockError};
use crate::market::KlineBar;
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const SHARP_MOVE_PCT: f64 = 5.0;

/// Direction of the price trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::Bullish => "多头",
            Self::Bearish => "空头",
            Self::Sideways => "震荡",
        }
    }
}

/// A threshold crossed on the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Overbought,
    Oversold,
    AboveUpperBand,
    BelowLowerBand,
    SharpRise,
    SharpFall,
}

impl Signal {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Overbought => "RSI 高于 70，短线超买",
            Self::Oversold => "RSI 低于 30，短线超卖",
            Self::AboveUpperBand => "收盘价突破布林上轨",
            Self::BelowLowerBand => "收盘价跌破布林下轨",
            Self::SharpRise => "单日涨幅超过 5%",
            Self::SharpFall => "单日跌幅超过 5%",
        }
    }

    /// Signals that belong in the risk section
    pub fn is_risk(&self) -> bool {
        !matches!(self, Self::Oversold)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
}

/// MACD with the A-share convention `bar = 2 * (dif - dea)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub dif: f64,
    pub dea: f64,
    pub bar: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kdj {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

/// Everything the analyzer derives from a bar series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub bars: usize,
    pub last_date: chrono::NaiveDate,
    pub last_close: f64,
    /// Percent change of the last close against the one before
    pub change_pct: f64,
    pub ma: MovingAverages,
    pub macd: Option<Macd>,
    pub rsi: Option<f64>,
    pub boll: Option<Bands>,
    pub kdj: Option<Kdj>,
    pub trend: Trend,
    pub signals: Vec<Signal>,
    pub suggestion: String,
}

impl TechnicalSummary {
    /// Compute indicators over `bars` (oldest first)
    ///
    /// Indicators whose window is longer than the series are left empty.
    pub fn compute(bars: &[KlineBar]) -> Result<Self> {
        let last = bars.last().ok_or_else(|| StockError::DataUnavailable {
            code: String::new(),
            reason: "no bars to analyze".to_string(),
        })?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let change_pct = match closes.len() {
            n if n >= 2 && closes[n - 2] > 0.0 => (closes[n - 1] / closes[n - 2] - 1.0) * 100.0,
            _ => 0.0,
        };

        let ma = MovingAverages {
            ma5: sma(&closes, 5)?,
            ma10: sma(&closes, 10)?,
            ma20: sma(&closes, 20)?,
            ma60: sma(&closes, 60)?,
        };
        let macd = macd(&closes)?;
        let rsi = rsi(&closes, 14)?;
        let boll = bollinger(&closes, 20)?;
        let kdj = kdj(bars, 14);

        let trend = classify_trend(last.close, &ma);
        let signals = detect_signals(last.close, change_pct, rsi, boll);

        Ok(Self {
            bars: bars.len(),
            last_date: last.date,
            last_close: last.close,
            change_pct,
            ma,
            macd,
            rsi,
            boll,
            kdj,
            trend,
            signals,
            suggestion: suggestion(change_pct).to_string(),
        })
    }
}

fn indicator_err(e: impl std::fmt::Display) -> StockError {
    StockError::Indicator(e.to_string())
}

/// Feed every close through `indicator` and keep the final output
fn last_output<I: Next<f64>>(indicator: &mut I, closes: &[f64]) -> Option<I::Output> {
    let mut out = None;
    for &close in closes {
        out = Some(indicator.next(close));
    }
    out
}

fn sma(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() < period {
        return Ok(None);
    }
    let mut sma = SimpleMovingAverage::new(period).map_err(indicator_err)?;
    Ok(last_output(&mut sma, closes))
}

fn macd(closes: &[f64]) -> Result<Option<Macd>> {
    if closes.len() < 26 {
        return Ok(None);
    }
    let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(indicator_err)?;
    Ok(last_output(&mut macd, closes).map(|out| Macd {
        dif: out.macd,
        dea: out.signal,
        bar: 2.0 * out.histogram,
    }))
}

fn rsi(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() <= period {
        return Ok(None);
    }
    let mut rsi = RelativeStrengthIndex::new(period).map_err(indicator_err)?;
    Ok(last_output(&mut rsi, closes))
}

fn bollinger(closes: &[f64], period: usize) -> Result<Option<Bands>> {
    if closes.len() < period {
        return Ok(None);
    }
    let mut bb = BollingerBands::new(period, 2.0).map_err(indicator_err)?;
    Ok(last_output(&mut bb, closes).map(|out| Bands {
        upper: out.upper,
        middle: out.average,
        lower: out.lower,
    }))
}

/// KDJ over an `n`-bar range; K and D smooth with weight 1/3
fn kdj(bars: &[KlineBar], n: usize) -> Option<Kdj> {
    if bars.len() < n {
        return None;
    }
    let mut k: Option<f64> = None;
    let mut d: Option<f64> = None;
    for end in n..=bars.len() {
        let window = &bars[end - n..end];
        let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let close = window[n - 1].close;
        let rsv = if high > low {
            (close - low) / (high - low) * 100.0
        } else {
            50.0
        };
        let next_k = k.map_or(rsv, |prev| prev * 2.0 / 3.0 + rsv / 3.0);
        let next_d = d.map_or(next_k, |prev| prev * 2.0 / 3.0 + next_k / 3.0);
        k = Some(next_k);
        d = Some(next_d);
    }
    let (k, d) = (k?, d?);
    Some(Kdj { k, d, j: 3.0 * k - 2.0 * d })
}

fn classify_trend(close: f64, ma: &MovingAverages) -> Trend {
    let (fast, slow) = match (ma.ma5, ma.ma10, ma.ma20) {
        (Some(fast), _, Some(slow)) => (fast, slow),
        (Some(fast), Some(slow), None) => (fast, slow),
        _ => return Trend::Sideways,
    };
    if close > slow && fast > slow {
        Trend::Bullish
    } else if close < slow && fast < slow {
        Trend::Bearish
    } else {
        Trend::Sideways
    }
}

fn detect_signals(close: f64, change_pct: f64, rsi: Option<f64>, boll: Option<Bands>) -> Vec<Signal> {
    let mut signals = Vec::new();
    match rsi {
        Some(r) if r > RSI_OVERBOUGHT => signals.push(Signal::Overbought),
        Some(r) if r < RSI_OVERSOLD => signals.push(Signal::Oversold),
        _ => {}
    }
    if let Some(bands) = boll {
        if close > bands.upper {
            signals.push(Signal::AboveUpperBand);
        } else if close < bands.lower {
            signals.push(Signal::BelowLowerBand);
        }
    }
    if change_pct > SHARP_MOVE_PCT {
        signals.push(Signal::SharpRise);
    } else if change_pct < -SHARP_MOVE_PCT {
        signals.push(Signal::SharpFall);
    }
    signals
}

/// One-line suggestion from the daily change
pub fn suggestion(change_pct: f64) -> &'static str {
    if change_pct > SHARP_MOVE_PCT {
        "涨幅较大，注意风险"
    } else if change_pct < -SHARP_MOVE_PCT {
        "跌幅较大，关注支撑位"
    } else if change_pct > 0.0 {
        "震荡上行趋势"
    } else {
        "震荡下行趋势"
    }
}
