//! MCP server exposing one reviewable import session.

use std::fmt::Display;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool_handler,
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::state::ServerState;

/// MCP server backed by a single import session.
#[derive(Clone)]
pub struct GrcMcpServer {
    /// Session, configuration and store.
    pub(crate) state: ServerState,
    /// Generated router containing all exposed tools.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl GrcMcpServer {
    /// Create a new server with the provided state.
    #[must_use]
    pub fn new(state: ServerState) -> Self {
        Self {
            state,
            tool_router: Self::build_tool_router(),
        }
    }

    pub(crate) fn serialize<T: Serialize>(value: T, context: &str) -> Result<Value, McpError> {
        serde_json::to_value(value).map_err(|error| {
            McpError::internal_error(
                "failed to serialize response",
                Some(json!({ "context": context, "reason": error.to_string() })),
            )
        })
    }

    pub(crate) fn success(summary: impl Into<String>, data: Value) -> CallToolResult {
        CallToolResult {
            content: vec![Content::text(summary.into())],
            structured_content: Some(data),
            is_error: Some(false),
            meta: None,
        }
    }

    /// A request the session rejected: bad index, wrong state, bad input.
    pub(crate) fn rejected(error: impl Display, context: &str) -> McpError {
        McpError::invalid_params(
            error.to_string(),
            Some(json!({ "context": context })),
        )
    }

    /// A failure of the persistence service or fetch chain.
    pub(crate) fn failed(error: impl Display, context: &str) -> McpError {
        McpError::internal_error(
            format!("{context} failed"),
            Some(json!({ "context": context, "reason": error.to_string() })),
        )
    }

    pub(crate) fn parse_id(raw: &str, field: &str) -> Result<Uuid, McpError> {
        raw.trim().parse().map_err(|error: uuid::Error| {
            McpError::invalid_params(
                format!("`{field}` is not a valid UUID"),
                Some(json!({ "field": field, "value": raw, "reason": error.to_string() })),
            )
        })
    }
}

#[tool_handler]
impl ServerHandler for GrcMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Use load_source → list_candidates → update_candidate / set_include / \
                 search_link_targets → link_candidate → dry_run → commit. create_risk and \
                 create_control link the new entity to the first unlinked candidate. reset \
                 discards the session."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }
}
