//! Shared utilities for money-agent
//!
//! This crate provides the process-wide configuration object and the tracing
//! setup used by every binary in the workspace.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, LogFormat};
pub use logging::{init_tracing, init_tracing_with};
