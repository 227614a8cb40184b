//! Read-only Fastmail access over JMAP, exposed as an MCP server and a CLI.

pub mod config;
pub mod error;
pub mod executor;
pub mod jmap;
pub mod mapper;
pub mod mcp;
pub mod models;
pub mod query;
pub mod resolver;
pub mod service;

pub use error::{Error, Result};
