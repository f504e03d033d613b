//! # regrag: question answering over regulatory documents
//!
//! Loads a directory of plain-text regulations, extracts their numbered
//! sections, and answers questions by section lookup, lexical ranking or
//! vector retrieval, optionally handing the evidence to a chat model.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration with defaults and validation
//! - **[`corpus`]**: document loading, section extraction, versioned snapshots
//! - **[`query`]**: section/title/free-text classification and document routing
//! - **[`retriever`]**: lexical ranking with disambiguation, vector retrieval
//! - **[`fallback`]**: keyword rule matcher used when nothing else answers
//! - **[`embedder`]**: sentence embeddings via ONNX Runtime, or a hashing stand-in
//! - **[`indexer`]**: chunking and index construction
//! - **[`store`]**: flat vector index and its on-disk format
//! - **[`generation`]**: optional answer generation over an OpenAI-compatible API
//! - **[`orchestrator`]**: per-query flow producing the three-form response
//! - **[`mcp`]**: MCP server (stdio transport via rmcp)
//! - **[`watcher`]**: reload on corpus changes

pub mod config;
pub mod corpus;
pub mod embedder;
pub mod fallback;
pub mod generation;
pub mod indexer;
pub mod mcp;
pub mod orchestrator;
pub mod query;
pub mod retriever;
pub mod store;
pub mod watcher;
