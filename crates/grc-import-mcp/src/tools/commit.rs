use grc_import_core::SessionError;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

use crate::server::GrcMcpServer;

pub(super) async fn commit(server: &GrcMcpServer) -> Result<CallToolResult, McpError> {
    let cancel = server.state.commit_token().await;
    let mut session = server.state.session.write().await;
    let report = session
        .commit(&*server.state.store, cancel)
        .await
        .map_err(|error| match error {
            SessionError::Commit(_) => GrcMcpServer::failed(error, "commit"),
            other => GrcMcpServer::rejected(other, "commit"),
        })?
        .clone();

    let summary = format!(
        "Committed {} framework(s), {} section(s), {} requirement(s), {} mapping(s); {} failure(s)",
        report.frameworks.len(),
        report.sections,
        report.requirements.len(),
        report.mappings,
        report.failures.len() + report.mapping_failures.len(),
    );
    Ok(GrcMcpServer::success(
        summary,
        json!({
            "state": session.state(),
            "complete": report.is_complete(),
            "report": GrcMcpServer::serialize(&report, "commit report")?,
        }),
    ))
}
