//! Memory brief folded into analysis prompts

use crate::{Category, MemoryFilter, MemoryStore, Result};

/// Assemble principles, patterns and (optionally) one stock's history
///
/// Empty sections are left out; an empty store yields an empty string.
pub async fn build_brief(
    store: &dyn MemoryStore,
    stock_code: Option<&str>,
    history_limit: usize,
) -> Result<String> {
    let mut parts = Vec::new();
    let filter = MemoryFilter::new().limit(history_limit);

    let principles = store.read(Category::Principles, &filter).await?;
    if !principles.is_empty() {
        let lines: Vec<_> = principles.iter().map(|e| e.content.as_str()).collect();
        parts.push(format!("## 用户投资原则\n{}", lines.join("\n")));
    }

    let patterns = store.read(Category::Patterns, &filter).await?;
    if !patterns.is_empty() {
        let lines: Vec<_> = patterns.iter().map(|e| e.content.as_str()).collect();
        parts.push(format!("## 历史规律\n{}", lines.join("\n")));
    }

    if let Some(code) = stock_code {
        let history = store.stock_history(code, history_limit).await?;
        if !history.is_empty() {
            let lines: Vec<_> = history.iter().map(|n| n.content.as_str()).collect();
            parts.push(format!("## {code} 分析历史\n{}", lines.join("\n")));
        }
    }

    Ok(parts.join("\n\n"))
}
