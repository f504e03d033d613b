/// MCP server setup using `rmcp` with stdio transport.
///
/// Provides `McpContext` (shared state) and `McpServer` (startup logic).
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use tracing::info;

use crate::corpus::{Corpus, CorpusLoader};
use crate::mcp::tools::AppTools;
use crate::orchestrator::Orchestrator;

/// Shared application context available to all tool handlers.
#[derive(Clone)]
pub struct McpContext {
    pub corpus: Arc<Corpus>,
    pub loader: CorpusLoader,
    pub orchestrator: Arc<Orchestrator>,
}

/// MCP server wrapping the context and serving via stdio.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve on stdio until the client disconnects.
    pub async fn start(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.ctx.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        router
            .serve((stdin, stdout))
            .await
            .context("MCP server failed on stdio transport")?
            .waiting()
            .await
            .context("MCP server terminated abnormally")?;

        Ok(())
    }
}
