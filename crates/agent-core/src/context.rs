//! Run context shared between workflow stages
//!
//! The `Context` is a write-once mapping from namespaced keys
//! (`<producer>.<name>`, e.g. `data_fetcher.get_kline`) to tagged values.
//! Every write is checked against a `ContextSchema` that maps key prefixes to
//! the value kinds allowed under them. Entries are never removed or replaced,
//! so a full run accumulates context monotonically.

use crate::error::{Error, Result, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Completeness of an analysis finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// All required inputs were available
    Complete,
    /// Computed from partial inputs; `notes` says what is missing
    Incomplete,
}

/// A derived signal written by an analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub status: FindingStatus,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Finding {
    pub fn complete(data: Value) -> Self {
        Self {
            status: FindingStatus::Complete,
            data,
            notes: Vec::new(),
        }
    }

    pub fn incomplete(data: Value, note: impl Into<String>) -> Self {
        Self {
            status: FindingStatus::Incomplete,
            data,
            notes: vec![note.into()],
        }
    }

    /// Attach a note, leaving the status unchanged
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == FindingStatus::Complete
    }
}

/// Tagged value stored under a context key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    /// Short text such as an intent label or an extracted entity
    Text(String),
    /// Raw structured payload (tool output, parsed drafts)
    Payload(Value),
    /// A tool invocation that failed in place of its payload
    ToolFailure(ToolError),
    /// Derived analysis signal
    Finding(Finding),
}

impl ContextValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Payload(_) => ValueKind::Payload,
            Self::ToolFailure(_) => ValueKind::ToolFailure,
            Self::Finding(_) => ValueKind::Finding,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_payload(&self) -> Option<&Value> {
        match self {
            Self::Payload(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tool_failure(&self) -> Option<&ToolError> {
        match self {
            Self::ToolFailure(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_finding(&self) -> Option<&Finding> {
        match self {
            Self::Finding(finding) => Some(finding),
            _ => None,
        }
    }
}

/// Discriminant of `ContextValue`, used by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Payload,
    ToolFailure,
    Finding,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Payload => "payload",
            Self::ToolFailure => "tool_failure",
            Self::Finding => "finding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct SchemaRule {
    prefix: String,
    kinds: Vec<ValueKind>,
}

/// Registry of key prefixes and the value kinds allowed under each
///
/// Lookup uses the longest matching prefix, so `analyzer.commentary` can be
/// narrowed independently of `analyzer.`.
#[derive(Debug, Clone, Default)]
pub struct ContextSchema {
    rules: Vec<SchemaRule>,
    permissive: bool,
}

impl ContextSchema {
    /// A schema with no rules: every key is rejected until rules are added
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema accepting any well-formed key with any value kind
    pub fn permissive() -> Self {
        Self {
            rules: Vec::new(),
            permissive: true,
        }
    }

    /// Allow `kinds` under keys starting with `prefix`
    pub fn allow(mut self, prefix: impl Into<String>, kinds: &[ValueKind]) -> Self {
        self.rules.push(SchemaRule {
            prefix: prefix.into(),
            kinds: kinds.to_vec(),
        });
        self
    }

    fn rule_for(&self, key: &str) -> Option<&SchemaRule> {
        self.rules
            .iter()
            .filter(|rule| key.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
    }

    /// Check a key and value against the registry
    pub fn validate(&self, key: &str, value: &ContextValue) -> Result<()> {
        validate_key(key)?;

        let Some(rule) = self.rule_for(key) else {
            if self.permissive {
                return Ok(());
            }
            return Err(Error::ContextSchema {
                key: key.to_string(),
                expected: "a registered namespace".to_string(),
                found: value.kind().to_string(),
            });
        };

        if rule.kinds.contains(&value.kind()) {
            Ok(())
        } else {
            Err(Error::ContextSchema {
                key: key.to_string(),
                expected: rule
                    .kinds
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" | "),
                found: value.kind().to_string(),
            })
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    let Some((namespace, name)) = key.split_once('.') else {
        return Err(Error::InvalidContextKey(key.to_string()));
    };
    let well_formed = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    };
    if well_formed(namespace) && well_formed(name) {
        Ok(())
    } else {
        Err(Error::InvalidContextKey(key.to_string()))
    }
}

/// Write-once run context
///
/// # Example
///
/// ```
/// use agent_core::{Context, ContextValue};
///
/// let mut ctx = Context::new();
/// ctx.insert("classifier.entity", ContextValue::Text("600519".into())).unwrap();
///
/// assert_eq!(ctx.text("classifier.entity"), Some("600519"));
/// assert!(ctx.insert("classifier.entity", ContextValue::Text("000001".into())).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    entries: BTreeMap<String, ContextValue>,
    schema: Arc<ContextSchema>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an empty context with a permissive schema
    pub fn new() -> Self {
        Self::with_schema(Arc::new(ContextSchema::permissive()))
    }

    /// Create an empty context validated against `schema`
    pub fn with_schema(schema: Arc<ContextSchema>) -> Self {
        Self {
            entries: BTreeMap::new(),
            schema,
        }
    }

    /// Insert a value under a namespaced key
    ///
    /// Fails if the key was already written or the value kind is not allowed
    /// for the key's namespace.
    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) -> Result<()> {
        let key = key.into();
        self.schema.validate(&key, &value)?;
        if self.entries.contains_key(&key) {
            return Err(Error::ContextConflict(key));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_text)
    }

    pub fn payload(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(ContextValue::as_payload)
    }

    pub fn tool_failure(&self, key: &str) -> Option<&ToolError> {
        self.get(key).and_then(ContextValue::as_tool_failure)
    }

    pub fn finding(&self, key: &str) -> Option<&Finding> {
        self.get(key).and_then(ContextValue::as_finding)
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries whose key starts with `prefix`, in key order
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ContextValue)> + 'a {
        self.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    /// All recorded tool failures, in key order
    pub fn tool_failures(&self) -> Vec<&ToolError> {
        self.entries
            .values()
            .filter_map(ContextValue::as_tool_failure)
            .collect()
    }

    /// Get the number of entries in the context
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the context is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
