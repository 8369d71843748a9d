//! Structured run result
//!
//! Sections live in a map keyed by [`SectionKind`], so the rendered order is
//! fixed by the kind and not by the order nodes produced the lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::router::Intent;

/// Report sections in render order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Overview,
    Metrics,
    Risks,
    Recommendation,
}

impl SectionKind {
    pub const ALL: [Self; 4] = [Self::Overview, Self::Metrics, Self::Risks, Self::Recommendation];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overview => "概览",
            Self::Metrics => "关键指标",
            Self::Risks => "风险提示",
            Self::Recommendation => "操作建议",
        }
    }
}

/// The reporter's output, stored as the run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub intent: Intent,
    #[serde(default)]
    pub stock_code: Option<String>,
    pub title: String,
    sections: BTreeMap<SectionKind, Vec<String>>,
    /// Named figures rendered in the metrics section, sorted by name
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendation: Option<String>,
    /// What could not be done and what the report is based on instead
    #[serde(default)]
    pub caveats: Vec<String>,
    /// True when any data was missing or a step failed
    #[serde(default)]
    pub degraded: bool,
    /// LLM commentary, when one was produced
    #[serde(default)]
    pub commentary: Option<String>,
}

impl Report {
    pub fn new(intent: Intent, title: impl Into<String>) -> Self {
        Self {
            intent,
            stock_code: None,
            title: title.into(),
            sections: BTreeMap::new(),
            metrics: BTreeMap::new(),
            recommendation: None,
            caveats: Vec::new(),
            degraded: false,
            commentary: None,
        }
    }

    pub fn with_stock(mut self, code: impl Into<String>) -> Self {
        self.stock_code = Some(code.into());
        self
    }

    /// Append a line to a section
    pub fn line(&mut self, kind: SectionKind, text: impl Into<String>) -> &mut Self {
        self.sections.entry(kind).or_default().push(text.into());
        self
    }

    pub fn metric(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn recommend(&mut self, text: impl Into<String>) -> &mut Self {
        self.recommendation = Some(text.into());
        self
    }

    /// Record a caveat; the report becomes degraded
    pub fn caveat(&mut self, text: impl Into<String>) -> &mut Self {
        self.caveats.push(text.into());
        self.degraded = true;
        self
    }

    /// Lines of one section, excluding metrics, caveats and recommendation
    pub fn section(&self, kind: SectionKind) -> &[String] {
        self.sections.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Kinds that will be rendered, in order
    pub fn section_order(&self) -> Vec<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|kind| !self.rendered_lines(*kind).is_empty())
            .collect()
    }

    fn rendered_lines(&self, kind: SectionKind) -> Vec<String> {
        let mut lines = self.section(kind).to_vec();
        match kind {
            SectionKind::Metrics => {
                lines.extend(self.metrics.iter().map(|(name, value)| format!("{name}: {value:.2}")));
            }
            SectionKind::Risks => {
                lines.extend(self.caveats.iter().map(|c| format!("⚠️ {c}")));
            }
            SectionKind::Recommendation => {
                lines.extend(self.recommendation.iter().cloned());
            }
            SectionKind::Overview => {}
        }
        lines
    }

    /// Render as Markdown; identical reports render identically
    pub fn render_markdown(&self) -> String {
        let mut out = format!("## {}\n", self.title);
        for kind in self.section_order() {
            let _ = write!(out, "\n### {}\n", kind.title());
            for line in self.rendered_lines(kind) {
                let _ = writeln!(out, "- {line}");
            }
        }
        if let Some(commentary) = &self.commentary {
            let _ = write!(out, "\n### 点评\n{}\n", commentary.trim());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(reverse: bool) -> Report {
        let mut report = Report::new(Intent::AnalyzeStock, "600519 技术分析").with_stock("600519");
        let mut steps: Vec<Box<dyn Fn(&mut Report)>> = vec![
            Box::new(|r| {
                r.recommend("震荡上行趋势");
            }),
            Box::new(|r| {
                r.line(SectionKind::Risks, "RSI 高于 70，短线超买");
            }),
            Box::new(|r| {
                r.metric("RSI14", 72.5).metric("MA5", 1701.25);
            }),
            Box::new(|r| {
                r.line(SectionKind::Overview, "趋势：多头");
            }),
        ];
        if reverse {
            steps.reverse();
        }
        for step in steps {
            step(&mut report);
        }
        report
    }

    #[test]
    fn test_section_order_independent_of_insertion() {
        let a = sample(false);
        let b = sample(true);
        assert_eq!(a.section_order(), SectionKind::ALL.to_vec());
        assert_eq!(a.render_markdown(), b.render_markdown());

        let md = a.render_markdown();
        let positions: Vec<_> = SectionKind::ALL
            .iter()
            .map(|k| md.find(&format!("### {}", k.title())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(md.find("MA5: 1701.25").unwrap() < md.find("RSI14: 72.50").unwrap());
    }

    #[test]
    fn test_caveats_mark_degraded() {
        let mut report = Report::new(Intent::MarketScan, "市场热点");
        assert!(!report.degraded);
        report.caveat("无法获取板块资金流数据");
        assert!(report.degraded);
        assert_eq!(report.section_order(), vec![SectionKind::Risks]);
        assert!(report.render_markdown().contains("⚠️ 无法获取板块资金流数据"));
    }

    #[test]
    fn test_serde_keeps_sections() {
        let report = sample(false);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["sections"]["overview"][0], "趋势：多头");
        let back: Report = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }
}
