//! Prompt templates rendered with MiniJinja
//!
//! - `system`: system prompts per completion purpose
//! - `user`: user message templates

mod system;
mod user;

use minijinja::{Environment, context};

use crate::error::Result;
use crate::router::Intent;

const CLASSIFY_SYSTEM: &str = "classify.system";
const CLASSIFY_USER: &str = "classify.user";
const ANALYSIS_SYSTEM: &str = "analysis.system";
const ANALYSIS_USER: &str = "analysis.user";
const CHAT_SYSTEM: &str = "chat.system";

/// Input for the analysis commentary prompt
#[derive(Debug, Clone, Default)]
pub struct AnalysisPrompt<'a> {
    pub stock_code: &'a str,
    pub name: Option<&'a str>,
    /// Pretty-printed technical summary
    pub technical: String,
    /// Pretty-printed sector flows, empty when unavailable
    pub sectors: String,
    pub brief: String,
}

/// Compiled prompt templates, shared by all runs
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    /// Compile all templates; fails on a syntax error
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(CLASSIFY_SYSTEM, system::CLASSIFY)?;
        env.add_template(CLASSIFY_USER, user::CLASSIFY)?;
        env.add_template(ANALYSIS_SYSTEM, system::ANALYSIS)?;
        env.add_template(ANALYSIS_USER, user::ANALYSIS)?;
        env.add_template(CHAT_SYSTEM, system::CHAT)?;
        Ok(Self { env })
    }

    pub fn classify_system(&self) -> Result<String> {
        let labels: Vec<_> = Intent::ALL.iter().map(Intent::as_str).collect();
        self.render(CLASSIFY_SYSTEM, context! { labels })
    }

    pub fn classify_user(&self, message: &str) -> Result<String> {
        self.render(CLASSIFY_USER, context! { message })
    }

    pub fn analysis_system(&self) -> Result<String> {
        self.render(ANALYSIS_SYSTEM, context! {})
    }

    pub fn analysis_user(&self, prompt: &AnalysisPrompt<'_>) -> Result<String> {
        self.render(
            ANALYSIS_USER,
            context! {
                stock_code => prompt.stock_code,
                name => prompt.name,
                technical => prompt.technical,
                sectors => prompt.sectors,
                brief => prompt.brief,
            },
        )
    }

    pub fn chat_system(&self) -> Result<String> {
        self.render(CHAT_SYSTEM, context! {})
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }
}

impl std::fmt::Debug for Prompts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompts")
            .field("templates", &self.env.templates().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lists_every_label() {
        let prompts = Prompts::new().unwrap();
        let system = prompts.classify_system().unwrap();
        for intent in Intent::ALL {
            assert!(system.contains(intent.as_str()), "missing {intent}");
        }
        assert_eq!(prompts.classify_user("随便聊聊").unwrap(), "用户消息：随便聊聊");
    }

    #[test]
    fn test_analysis_omits_empty_sections() {
        let prompts = Prompts::new().unwrap();
        let full = prompts
            .analysis_user(&AnalysisPrompt {
                stock_code: "600519",
                name: Some("贵州茅台"),
                technical: "{\"trend\": \"bullish\"}".into(),
                sectors: "[]".into(),
                brief: "## 原则\n- 不追高".into(),
            })
            .unwrap();
        assert!(full.contains("600519（贵州茅台）"));
        assert!(full.contains("板块资金流"));
        assert!(full.contains("不追高"));

        let bare = prompts
            .analysis_user(&AnalysisPrompt {
                stock_code: "000001",
                technical: "{}".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(!bare.contains("（"));
        assert!(!bare.contains("板块资金流"));
        assert!(!bare.contains("历史记忆"));
    }

    #[test]
    fn test_system_prompts_render() {
        let prompts = Prompts::new().unwrap();
        assert!(prompts.analysis_system().unwrap().contains("技术分析师"));
        assert!(prompts.chat_system().unwrap().contains("分析一下600519"));
    }
}
