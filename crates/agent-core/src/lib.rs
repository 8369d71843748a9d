//! Core abstractions for money-agent
//!
//! This crate defines the error taxonomy shared by every stage of a workflow
//! run and the `Context` mapping that stages use to hand data to each other.

pub mod context;
pub mod error;

pub use context::{Context, ContextSchema, ContextValue, Finding, FindingStatus, ValueKind};
pub use error::{Error, Result, ToolError, ToolErrorKind};
