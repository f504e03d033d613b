/// MCP tool handlers.
///
/// 1. query          – answer a question against the current snapshot
/// 2. list_documents – loaded documents with their section counts
/// 3. get_section    – exact text of one section
/// 4. reload_corpus  – rebuild and publish a new snapshot
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::corpus::display_name;
use crate::mcp::server::McpContext;
use crate::orchestrator::QueryRequest;
use crate::query::normalize::section_id_variants;
use crate::retriever::NoMatch;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct QueryParams {
    /// Question about the loaded regulations
    query: String,
    /// Document id to restrict the answer to (from a previous document_options list)
    selected_document: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct SectionParams {
    /// Document id (file name without extension)
    document: String,
    /// Section id such as 3A, 3a or 3A.
    section: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: query ───────────────────────────────────────────────

    #[tool(
        description = "Answer a question from the loaded regulations. Returns exact_match (retrieved text), ai_response, enhanced_response and, when several documents match, document_options to choose from."
    )]
    async fn query(&self, params: Parameters<QueryParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let request = QueryRequest {
            query: p.query,
            selected_document_id: p.selected_document,
        };
        let response = self.ctx.orchestrator.answer(&request).await;

        let value = serde_json::to_value(&response)
            .map_err(|e| McpError::internal_error(format!("serialize failed: {e}"), None))?;
        json_result(value)
    }

    // ── Tool 2: list_documents ──────────────────────────────────────

    #[tool(description = "List the loaded documents with their section counts")]
    async fn list_documents(&self) -> Result<CallToolResult, McpError> {
        let snapshot = self.ctx.corpus.snapshot();

        let documents: Vec<serde_json::Value> = snapshot
            .documents
            .values()
            .map(|doc| {
                serde_json::json!({
                    "id": doc.id,
                    "display_name": display_name(&doc.id),
                    "sections": snapshot.sections.section_ids(&doc.id).len(),
                    "chars": doc.text.chars().count(),
                })
            })
            .collect();

        json_result(serde_json::json!({
            "version": snapshot.version,
            "loaded_at": snapshot.loaded_at.to_rfc3339(),
            "vector_index": snapshot.has_vector_index(),
            "documents": documents,
        }))
    }

    // ── Tool 3: get_section ─────────────────────────────────────────

    #[tool(description = "Return the exact text of one section of a document")]
    async fn get_section(
        &self,
        params: Parameters<SectionParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.document.is_empty() || p.section.is_empty() {
            return error_result("document and section are required");
        }

        let snapshot = self.ctx.corpus.snapshot();
        if snapshot.document(&p.document).is_none() {
            return error_result(&format!("document not found: {}", p.document));
        }

        let found = section_id_variants(&p.section)
            .iter()
            .find_map(|id| snapshot.sections.get(&p.document, id));
        match found {
            Some(text) => json_result(serde_json::json!({
                "document": p.document,
                "section": p.section.trim().trim_end_matches('.').to_uppercase(),
                "text": text,
            })),
            None => error_result(
                &NoMatch::Section {
                    id: p.section.trim().to_string(),
                    document: Some(p.document),
                }
                .to_string(),
            ),
        }
    }

    // ── Tool 4: reload_corpus ───────────────────────────────────────

    #[tool(description = "Reload the document corpus from disk and publish it atomically")]
    async fn reload_corpus(&self) -> Result<CallToolResult, McpError> {
        let (version, report) = self
            .ctx
            .loader
            .reload_into(&self.ctx.corpus)
            .await
            .map_err(|e| McpError::internal_error(format!("reload failed: {e}"), None))?;

        let skipped: Vec<String> = report.skipped.iter().map(ToString::to_string).collect();
        json_result(serde_json::json!({
            "success": true,
            "version": version,
            "documents": report.documents,
            "sections": report.sections,
            "chunks": report.chunks,
            "rules": report.rules,
            "index": format!("{:?}", report.index),
            "skipped": skipped,
        }))
    }
}
