//! MCP surface: a stdio server exposing query, inspection and reload tools.
pub mod server;
pub mod tools;

pub use server::{McpContext, McpServer};
