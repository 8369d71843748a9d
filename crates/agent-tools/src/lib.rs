//! Tool catalogue for money-agent
//!
//! Tools are the only way workflow stages reach the data store and market
//! data. Each tool declares a JSON input schema; the registry validates
//! parameters against it before the tool ever runs.

pub mod registry;
pub mod schema;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDefinition};
