//! Intent router for user requests
//!
//! Rule-based: keyword tables decide the intent, a six-digit pattern pulls out
//! the stock code. Requests no rule recognises are left unclassified so the
//! classifier node can fall back to the LLM.

use agent_llm::{Message, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static STOCK_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{6})(?:[^0-9]|$)").expect("valid stock code pattern"));

/// The closed set of request intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Technical analysis of one stock
    AnalyzeStock,
    /// Review recorded trades
    ReviewHistory,
    /// Sector fund-flow overview
    MarketScan,
    /// Record a buy or sell
    RecordTrade,
    /// Small talk or anything else
    Chat,
}

impl Intent {
    pub const ALL: [Self; 5] = [
        Self::AnalyzeStock,
        Self::ReviewHistory,
        Self::MarketScan,
        Self::RecordTrade,
        Self::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeStock => "analyze_stock",
            Self::ReviewHistory => "review_history",
            Self::MarketScan => "market_scan",
            Self::RecordTrade => "record_trade",
            Self::Chat => "chat",
        }
    }

    /// Whether the intent cannot proceed without a stock code
    pub fn requires_code(&self) -> bool {
        matches!(self, Self::AnalyzeStock | Self::RecordTrade)
    }

    /// Task label asking the user for what is missing
    pub fn clarification_task(&self) -> String {
        format!("{CLARIFY_PREFIX}{}", self.as_str())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_');
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| format!("unknown intent label '{s}'"))
    }
}

/// Prefix of task labels that route straight to the responder
pub const CLARIFY_PREFIX: &str = "clarify:";

/// Intent named by a `clarify:<intent>` task, if it is one
pub fn clarification_intent(task: &str) -> Option<Intent> {
    task.strip_prefix(CLARIFY_PREFIX).and_then(|rest| rest.parse().ok())
}

/// Keywords for intent classification (Chinese)
mod keywords_zh {
    pub const RECORD_TRADE: &[&str] = &["买入", "卖出", "买了", "卖了", "记录交易", "记一笔"];

    pub const REVIEW: &[&str] = &["复盘", "交易记录", "胜率", "盈亏", "回顾", "我的交易"];

    pub const MARKET: &[&str] = &["市场", "热点", "板块", "资金流", "大盘", "行情概览"];

    pub const ANALYZE: &[&str] = &["分析", "怎么样", "走势", "技术面", "能买吗", "看看"];

    pub const CHAT: &[&str] = &["你好", "您好", "谢谢", "早上好", "晚上好", "你是谁"];
}

/// Keywords for intent classification (English)
mod keywords_en {
    pub const RECORD_TRADE: &[&str] = &["bought", "sold", "record trade"];

    pub const REVIEW: &[&str] = &["review", "win rate", "my trades"];

    pub const MARKET: &[&str] = &["market", "sector", "hot spot"];

    pub const ANALYZE: &[&str] = &["analyze", "analyse", "analysis", "outlook"];

    pub const CHAT: &[&str] = &["hello", "hi", "thanks", "thank you"];
}

/// How a routing decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Keyword,
    /// Only a stock code was given
    BareCode,
    Llm,
    Default,
}

impl RouteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::BareCode => "bare_code",
            Self::Llm => "llm",
            Self::Default => "default",
        }
    }
}

/// Result of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub intent: Intent,
    /// Stock code from the message, or carried over from an earlier turn
    pub stock_code: Option<String>,
    /// True when `stock_code` came from an earlier user message
    pub carried_over: bool,
    pub source: RouteSource,
}

impl Routing {
    /// Task label for the state: the intent, or a clarification request
    pub fn task(&self) -> String {
        if self.intent.requires_code() && self.stock_code.is_none() {
            self.intent.clarification_task()
        } else {
            self.intent.as_str().to_string()
        }
    }
}

/// Keyword router over the closed intent set
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify by keyword alone; `None` when no rule matches
    pub fn classify(&self, query: &str) -> Option<Intent> {
        let query = query.to_lowercase();
        let has_code = extract_code(&query).is_some();

        if Self::matches(&query, keywords_zh::RECORD_TRADE, keywords_en::RECORD_TRADE) {
            return Some(Intent::RecordTrade);
        }
        if Self::matches(&query, keywords_zh::REVIEW, keywords_en::REVIEW) {
            return Some(Intent::ReviewHistory);
        }
        // "600519 板块" is about the stock, not the market
        if !has_code && Self::matches(&query, keywords_zh::MARKET, keywords_en::MARKET) {
            return Some(Intent::MarketScan);
        }
        if Self::matches(&query, keywords_zh::ANALYZE, keywords_en::ANALYZE) {
            return Some(Intent::AnalyzeStock);
        }
        if Self::matches(&query, keywords_zh::CHAT, keywords_en::CHAT) {
            return Some(Intent::Chat);
        }
        None
    }

    fn matches(query: &str, zh: &[&str], en: &[&str]) -> bool {
        zh.iter().any(|kw| query.contains(kw)) || en.iter().any(|kw| contains_word(query, kw))
    }

    /// Route `message` given earlier turns
    ///
    /// A message that is nothing but a stock code (or a code with no
    /// recognised keyword) is an analysis request. When an analysis request
    /// names no code, the most recent code from an earlier user message is
    /// carried over.
    pub fn route(&self, message: &str, prior: &[Message]) -> Option<Routing> {
        let code = extract_code(message);
        let (intent, source) = match self.classify(message) {
            Some(intent) => (intent, RouteSource::Keyword),
            None if code.is_some() => (Intent::AnalyzeStock, RouteSource::BareCode),
            None => return None,
        };
        Some(self.resolve(intent, source, code, prior))
    }

    /// Attach a stock code to an intent decided elsewhere (e.g. by the LLM)
    pub fn resolve(
        &self,
        intent: Intent,
        source: RouteSource,
        code: Option<String>,
        prior: &[Message],
    ) -> Routing {
        if code.is_some() || intent != Intent::AnalyzeStock {
            return Routing {
                intent,
                stock_code: code,
                carried_over: false,
                source,
            };
        }

        let carried = last_code_in(prior);
        Routing {
            intent,
            carried_over: carried.is_some(),
            stock_code: carried,
            source,
        }
    }
}

/// First six-digit stock code in `text`
pub fn extract_code(text: &str) -> Option<String> {
    STOCK_CODE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Most recent stock code mentioned by the user in `messages`
pub fn last_code_in(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::User)
        .find_map(|m| extract_code(m.text()))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric()) && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_detection() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("分析一下600519"), Some(Intent::AnalyzeStock));
        assert_eq!(router.classify("000001走势怎么样"), Some(Intent::AnalyzeStock));
        assert_eq!(router.classify("analyze 600519"), Some(Intent::AnalyzeStock));
    }

    #[test]
    fn test_trade_detection_wins_over_analysis() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("买入 600519 100股 价格1700，帮我分析"),
            Some(Intent::RecordTrade)
        );
        assert_eq!(router.classify("复盘一下我的交易"), Some(Intent::ReviewHistory));
    }

    #[test]
    fn test_market_only_without_code() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("今天市场热点是什么"), Some(Intent::MarketScan));
        assert_eq!(router.classify("分析600519所在板块"), Some(Intent::AnalyzeStock));
    }

    #[test]
    fn test_chat_and_unknown() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("你好"), Some(Intent::Chat));
        assert_eq!(router.classify("hi there"), Some(Intent::Chat));
        // "hi" inside another word is not a greeting
        assert_eq!(router.classify("this is odd"), None);
        assert_eq!(router.classify("讲个笑话"), None);
    }

    #[test]
    fn test_code_extraction() {
        assert_eq!(extract_code("分析一下600519"), Some("600519".to_string()));
        assert_eq!(extract_code("600519"), Some("600519".to_string()));
        assert_eq!(extract_code("代码1234567不对"), None);
        assert_eq!(extract_code("12345"), None);
    }

    #[test]
    fn test_bare_code_routes_to_analysis() {
        let routing = IntentRouter::new().route("那000001呢", &[]).unwrap();
        assert_eq!(routing.intent, Intent::AnalyzeStock);
        assert_eq!(routing.stock_code.as_deref(), Some("000001"));
        assert_eq!(routing.source, RouteSource::BareCode);
        assert_eq!(routing.task(), "analyze_stock");
    }

    #[test]
    fn test_code_carried_over_from_prior_turn() {
        let prior = vec![
            Message::user("分析一下600519"),
            Message::assistant("600519 分析如下 000002"),
        ];
        let routing = IntentRouter::new().route("再分析一下走势", &prior).unwrap();
        assert_eq!(routing.stock_code.as_deref(), Some("600519"));
        assert!(routing.carried_over);
    }

    #[test]
    fn test_missing_code_needs_clarification() {
        let routing = IntentRouter::new().route("帮我分析一下", &[]).unwrap();
        assert_eq!(routing.stock_code, None);
        assert_eq!(routing.task(), "clarify:analyze_stock");
        assert_eq!(clarification_intent(&routing.task()), Some(Intent::AnalyzeStock));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("market_scan".parse::<Intent>(), Ok(Intent::MarketScan));
        assert_eq!(" `Chat`\n".parse::<Intent>(), Ok(Intent::Chat));
        assert!("buy".parse::<Intent>().is_err());
        assert_eq!(clarification_intent("chat"), None);
    }
}
