//! Memory entry and stock note types

use crate::{MemoryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a shared memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Investment rules the user holds to
    Principles,
    /// Recurring market behaviour
    Patterns,
    /// Individual worked examples
    Cases,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Principles, Self::Patterns, Self::Cases];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principles => "principles",
            Self::Patterns => "patterns",
            Self::Cases => "cases",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "principles" | "principle" => Ok(Self::Principles),
            "patterns" | "pattern" => Ok(Self::Patterns),
            "cases" | "case" => Ok(Self::Cases),
            other => Err(MemoryError::InvalidCategory(other.to_string())),
        }
    }
}

/// Who produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    LlmAnalysis,
    UserInput,
    System,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlmAnalysis => "llm_analysis",
            Self::UserInput => "user_input",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "llm_analysis" => Ok(Self::LlmAnalysis),
            "user_input" | "user" => Ok(Self::UserInput),
            "system" => Ok(Self::System),
            other => Err(MemoryError::InvalidProvenance(other.to_string())),
        }
    }
}

/// A durable principle, pattern or case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Assigned by the store on first write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub category: Category,
    pub content: String,
    pub source: Provenance,
    /// Stock the entry was derived from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(category: Category, content: impl Into<String>, source: Provenance) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            category,
            content: content.into(),
            source,
            stock_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_stock(mut self, code: impl Into<String>) -> Self {
        self.stock_code = Some(code.into());
        self
    }
}

/// Narrows `MemoryStore::read` results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFilter {
    pub stock_code: Option<String>,
    pub source: Option<Provenance>,
    /// Case-sensitive substring of the content
    pub contains: Option<String>,
    pub limit: Option<usize>,
}

impl MemoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stock(mut self, code: impl Into<String>) -> Self {
        self.stock_code = Some(code.into());
        self
    }

    pub fn source(mut self, source: Provenance) -> Self {
        self.source = Some(source);
        self
    }

    pub fn contains(mut self, needle: impl Into<String>) -> Self {
        self.contains = Some(needle.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        self.stock_code
            .as_ref()
            .is_none_or(|code| entry.stock_code.as_ref() == Some(code))
            && self.source.is_none_or(|source| entry.source == source)
            && self
                .contains
                .as_ref()
                .is_none_or(|needle| entry.content.contains(needle.as_str()))
    }
}

/// Per-stock context note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub stock_code: String,
    /// Free-form tag such as `analysis` or `price_snapshot`
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StockNote {
    pub fn new(stock_code: impl Into<String>, kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            stock_code: stock_code.into(),
            kind: kind.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("patterns".parse::<Category>().unwrap(), Category::Patterns);
        assert_eq!(" Case ".parse::<Category>().unwrap(), Category::Cases);
        assert!(matches!(
            "rumours".parse::<Category>(),
            Err(MemoryError::InvalidCategory(_))
        ));
    }

    #[test]
    fn test_entry_serialization_uses_snake_case() {
        let entry = MemoryEntry::new(Category::Principles, "不追高", Provenance::LlmAnalysis);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "principles");
        assert_eq!(json["source"], "llm_analysis");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_filter_matching() {
        let entry = MemoryEntry::new(Category::Cases, "600519 放量突破", Provenance::System).for_stock("600519");

        assert!(MemoryFilter::new().matches(&entry));
        assert!(MemoryFilter::new().stock("600519").contains("放量").matches(&entry));
        assert!(!MemoryFilter::new().stock("000001").matches(&entry));
        assert!(!MemoryFilter::new().source(Provenance::UserInput).matches(&entry));
    }
}
