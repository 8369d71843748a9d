//! Reporter: composes the structured result from the run context

use agent_core::{Context, ContextValue, Error, Result, ToolErrorKind};
use agent_memory::{Category, MemoryEntry, Provenance, StockNote};
use agent_runtime::AgentRuntime;
use agent_workflow::{Node, NodeId, State, Transition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::{entity_of, fetched, intent_of, keys};
use crate::indicators::TechnicalSummary;
use crate::market::MarketOverview;
use crate::report::{Report, SectionKind};
use crate::router::Intent;
use crate::tools::{data_label, names};
use crate::trade::{Trade, TradeStats};

/// Closed trades needed before a review is stored as a pattern
const PATTERN_MIN_TRADES: usize = 5;

const YI: f64 = 1e8;

pub struct ReporterNode {
    runtime: Arc<AgentRuntime>,
}

fn caveats(report: &mut Report, context: &Context) {
    for failure in context.tool_failures() {
        let text = if failure.tool == names::SAVE_TRADE {
            match failure.kind {
                ToolErrorKind::Rejected => format!("交易未保存：{}", failure.message),
                kind => format!("交易未保存（{kind}）：{}", failure.message),
            }
        } else {
            format!(
                "无法获取{}（{}）：{}；分析基于其余数据",
                data_label(&failure.tool),
                failure.kind,
                failure.message
            )
        };
        report.caveat(text);
    }

    for (_, value) in context.with_prefix("analyzer.") {
        if let ContextValue::Finding(finding) = value {
            if !finding.is_complete() {
                for note in &finding.notes {
                    report.caveat(note.clone());
                }
            }
        }
    }
}

fn analysis_report(context: &Context) -> Report {
    let code = entity_of(context).unwrap_or_default().to_string();
    let data = context.finding(keys::SUMMARY).map(|f| f.data.clone()).unwrap_or(Value::Null);
    let name = data["name"].as_str().unwrap_or_default();
    let title = if name.is_empty() {
        format!("{code} 技术分析")
    } else {
        format!("{code} {name} 技术分析")
    };
    let mut report = Report::new(Intent::AnalyzeStock, title).with_stock(&code);

    if let Some(info) = context.payload(&fetched(names::GET_STOCK_INFO)) {
        if let Some(industry) = info["industry"].as_str().filter(|s| !s.is_empty()) {
            report.line(SectionKind::Overview, format!("所属行业：{industry}"));
        }
        if let Some(pe) = info["pe_ratio"].as_f64() {
            report.metric("市盈率", pe);
        }
        if let Some(cap) = info["market_cap"].as_f64() {
            report.metric("总市值（亿）", cap / YI);
        }
    }

    match serde_json::from_value::<TechnicalSummary>(data["technical"].clone()) {
        Ok(summary) => technical_lines(&mut report, &summary),
        Err(_) => {
            report.recommend("数据不足，暂不给出操作建议");
        }
    }

    if let Ok(overview) = serde_json::from_value::<MarketOverview>(data["sector_overview"].clone()) {
        let leaders: Vec<_> = overview.top_inflow.iter().map(|f| f.sector.as_str()).collect();
        if !leaders.is_empty() {
            report.line(SectionKind::Overview, format!("资金净流入居前板块：{}", leaders.join("、")));
        }
    }

    report.commentary = context.text(keys::COMMENTARY).map(str::to_string);
    report
}

fn technical_lines(report: &mut Report, summary: &TechnicalSummary) {
    report
        .line(
            SectionKind::Overview,
            format!(
                "最新收盘 {:.2}（{}），涨跌幅 {:+.2}%",
                summary.last_close, summary.last_date, summary.change_pct
            ),
        )
        .line(SectionKind::Overview, format!("趋势：{}", summary.trend.label_zh()));

    let ma = &summary.ma;
    for (name, value) in [("MA5", ma.ma5), ("MA10", ma.ma10), ("MA20", ma.ma20), ("MA60", ma.ma60)] {
        if let Some(value) = value {
            report.metric(name, value);
        }
    }
    if let Some(rsi) = summary.rsi {
        report.metric("RSI14", rsi);
    }
    if let Some(macd) = summary.macd {
        report
            .metric("MACD.DIF", macd.dif)
            .metric("MACD.DEA", macd.dea)
            .metric("MACD.BAR", macd.bar);
    }
    if let Some(boll) = summary.boll {
        report
            .metric("BOLL.UPPER", boll.upper)
            .metric("BOLL.MID", boll.middle)
            .metric("BOLL.LOWER", boll.lower);
    }
    if let Some(kdj) = summary.kdj {
        report.metric("KDJ.K", kdj.k).metric("KDJ.D", kdj.d).metric("KDJ.J", kdj.j);
    }

    for signal in &summary.signals {
        let kind = if signal.is_risk() {
            SectionKind::Risks
        } else {
            SectionKind::Overview
        };
        report.line(kind, signal.describe());
    }
    report.recommend(summary.suggestion.clone());
}

fn review_lines(report: &mut Report, context: &Context) -> Option<TradeStats> {
    let data = &context.finding(keys::TRADE_REVIEW)?.data;
    let stats: TradeStats = serde_json::from_value(data["stats"].clone()).ok()?;
    let count = data["count"].as_u64().unwrap_or_default();

    report.line(
        SectionKind::Overview,
        format!("共 {count} 条交易记录，已平仓 {} 笔", stats.total),
    );
    if !stats.open_positions.is_empty() {
        let held: Vec<_> = stats
            .open_positions
            .iter()
            .map(|(code, qty)| format!("{code} {qty}股"))
            .collect();
        report.line(SectionKind::Overview, format!("持仓：{}", held.join("，")));
    }
    if let Ok(recent) = serde_json::from_value::<Vec<Trade>>(data["recent"].clone()) {
        for trade in recent {
            report.line(
                SectionKind::Overview,
                format!(
                    "{} {} {} {}股 @ {:.2}",
                    trade.date,
                    trade.direction.label_zh(),
                    trade.stock_code,
                    trade.quantity,
                    trade.price
                ),
            );
        }
    }

    if stats.total > 0 {
        report
            .metric("胜率(%)", stats.win_rate * 100.0)
            .metric("盈亏比", stats.profit_ratio)
            .metric("已实现盈亏", stats.realized_pnl);
    }
    if stats.unmatched_sells > 0 {
        report.line(
            SectionKind::Risks,
            format!("有 {} 笔卖出没有对应的买入，未计入统计", stats.unmatched_sells),
        );
    }
    if stats.total > 0 && stats.win_rate < 0.5 {
        report.line(SectionKind::Risks, "胜率低于50%，注意止损纪律");
    }
    Some(stats)
}

fn review_advice(stats: &TradeStats) -> &'static str {
    if stats.total == 0 {
        "暂无已平仓交易，继续记录交易以便复盘"
    } else if stats.win_rate >= 0.5 && stats.profit_ratio >= 1.0 {
        "交易表现良好，保持纪律"
    } else {
        "建议控制仓位，严格执行止损"
    }
}

fn review_report(context: &Context) -> (Report, Option<TradeStats>) {
    let mut report = match entity_of(context) {
        Some(code) => Report::new(Intent::ReviewHistory, format!("{code} 交易复盘")).with_stock(code),
        None => Report::new(Intent::ReviewHistory, "交易复盘"),
    };
    let stats = review_lines(&mut report, context);
    if let Some(stats) = &stats {
        report.recommend(review_advice(stats));
    }
    (report, stats)
}

fn market_report(context: &Context) -> Report {
    let mut report = Report::new(Intent::MarketScan, "市场热点");
    let Some(overview) = context
        .finding(keys::MARKET_OVERVIEW)
        .and_then(|f| serde_json::from_value::<MarketOverview>(f.data.clone()).ok())
    else {
        return report;
    };

    report
        .line(
            SectionKind::Overview,
            format!("上涨板块 {} 个，下跌板块 {} 个", overview.advancing, overview.declining),
        )
        .line(
            SectionKind::Overview,
            format!("板块资金合计净流入 {:.2} 亿", overview.total_net_inflow / YI),
        );
    for flow in &overview.top_inflow {
        report.metric(format!("净流入·{}（亿）", flow.sector), flow.net_inflow / YI);
    }
    for flow in &overview.top_outflow {
        report.line(
            SectionKind::Risks,
            format!("{} 资金净流出 {:.2} 亿", flow.sector, -flow.net_inflow / YI),
        );
    }
    match overview.top_inflow.first() {
        Some(leader) if overview.total_net_inflow > 0.0 => {
            report.recommend(format!("资金整体净流入，可关注{}方向", leader.sector));
        }
        _ => {
            report.recommend("资金整体净流出，注意控制仓位");
        }
    }
    report
}

fn trade_report(context: &Context) -> (Report, Option<TradeStats>) {
    let code = entity_of(context).unwrap_or_default();
    let mut report = Report::new(Intent::RecordTrade, format!("{code} 交易记录")).with_stock(code);

    let saved = context.payload(&fetched(names::SAVE_TRADE));
    match saved.and_then(|p| p["message"].as_str()) {
        Some(message) => {
            report.line(SectionKind::Overview, message);
            report.recommend("已记录，可以说“复盘一下我的交易”查看统计");
        }
        None => {
            report.line(SectionKind::Overview, "本次交易未保存");
        }
    }
    let stats = review_lines(&mut report, context);
    (report, stats)
}

impl ReporterNode {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Store what this run taught us; failures become issues
    async fn remember(&self, state: &mut State, report: &Report, stats: Option<&TradeStats>) {
        let mut failures: Vec<Error> = Vec::new();

        if report.intent == Intent::AnalyzeStock && !report.degraded {
            if let (Some(code), Some(advice)) = (&report.stock_code, &report.recommendation) {
                let summary = report.section(SectionKind::Overview).join("；");
                let note = StockNote::new(code, "analysis", format!("{summary}；建议：{advice}"));
                if let Err(e) = self.runtime.record_stock_context(note).await {
                    failures.push(e);
                }

                let source = if report.commentary.is_some() {
                    Provenance::LlmAnalysis
                } else {
                    Provenance::System
                };
                let case = MemoryEntry::new(Category::Cases, format!("{}：{summary}；{advice}", report.title), source)
                    .for_stock(code);
                if let Err(e) = self.runtime.remember(case).await {
                    failures.push(e);
                }
            }
        }

        if let Some(stats) = stats.filter(|s| s.total >= PATTERN_MIN_TRADES) {
            let pattern = MemoryEntry::new(
                Category::Patterns,
                format!(
                    "交易复盘：已平仓 {} 笔，胜率 {:.0}%，盈亏比 {:.2}",
                    stats.total,
                    stats.win_rate * 100.0,
                    stats.profit_ratio
                ),
                Provenance::System,
            );
            if let Err(e) = self.runtime.remember(pattern).await {
                failures.push(e);
            }
        }

        for e in failures {
            warn!(error = %e, "memory write failed");
            state.record_issue(NodeId::Reporter, e);
        }
    }
}

#[async_trait]
impl Node for ReporterNode {
    fn id(&self) -> NodeId {
        NodeId::Reporter
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        let intent = intent_of(state)
            .ok_or_else(|| Error::ProcessingFailed("no intent to report on".to_string()))?;

        let context = state.context();
        let (mut report, stats) = match intent {
            Intent::AnalyzeStock => (analysis_report(context), None),
            Intent::ReviewHistory => review_report(context),
            Intent::MarketScan => (market_report(context), None),
            Intent::RecordTrade => trade_report(context),
            Intent::Chat => return Err(Error::ProcessingFailed("nothing to report for chat".to_string())),
        };
        caveats(&mut report, context);

        self.remember(state, &report, stats.as_ref()).await;
        if !state.issues().is_empty() {
            report.degraded = true;
        }

        let value = serde_json::to_value(&report).map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        state.set_result(value)?;
        state
            .context_mut()
            .insert(keys::REPORT, ContextValue::Text(report.title.clone()))?;

        info!(
            %intent,
            sections = report.section_order().len(),
            caveats = report.caveats.len(),
            degraded = report.degraded,
            "report ready"
        );
        Ok(Transition::Continue)
    }
}
