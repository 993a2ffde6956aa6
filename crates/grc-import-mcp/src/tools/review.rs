use std::collections::HashMap;

use grc_import_core::{ImportSession, RequirementCandidate};
use rmcp::{ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::server::GrcMcpServer;

/// A candidate as shown to the reviewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub index: usize,
    pub requirement_code: String,
    pub title: String,
    pub text: String,
    pub include: bool,
    pub framework_code: Option<String>,
    pub linked_risk_id: Option<Uuid>,
    pub linked_control_id: Option<Uuid>,
    /// `None` for excluded candidates, which are not validated.
    pub valid: Option<bool>,
    pub error: Option<String>,
}

fn candidate_views(session: &ImportSession) -> Vec<CandidateView> {
    let results: HashMap<usize, Option<String>> = session
        .preview()
        .requirements
        .into_iter()
        .map(|preview| (preview.index, preview.row.error().map(ToString::to_string)))
        .collect();

    session
        .candidates()
        .iter()
        .enumerate()
        .map(|(index, candidate)| view(index, candidate, results.get(&index)))
        .collect()
}

fn view(
    index: usize,
    candidate: &RequirementCandidate,
    result: Option<&Option<String>>,
) -> CandidateView {
    CandidateView {
        index,
        requirement_code: candidate.requirement_code.clone(),
        title: candidate.title.clone(),
        text: candidate.text.clone(),
        include: candidate.include,
        framework_code: candidate.framework_code.clone(),
        linked_risk_id: candidate.linked_risk_id,
        linked_control_id: candidate.linked_control_id,
        valid: result.map(Option::is_none),
        error: result.cloned().flatten(),
    }
}

pub(super) async fn list_candidates(server: &GrcMcpServer) -> Result<CallToolResult, McpError> {
    let session = server.state.session.read().await;
    let candidates = candidate_views(&session);
    let summary = session.summary();

    Ok(GrcMcpServer::success(
        format!(
            "{} candidates, {} valid, {} invalid ({})",
            candidates.len(),
            summary.req_ok,
            summary.req_err,
            session.state()
        ),
        json!({
            "state": session.state(),
            "title": session.title(),
            "candidates": GrcMcpServer::serialize(&candidates, "candidates")?,
            "summary": summary,
        }),
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCandidateParams {
    /// Position of the candidate.
    pub index: usize,
    #[serde(default)]
    pub requirement_code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Implementation guidance; an empty string clears it.
    #[serde(default)]
    pub guidance: Option<String>,
    /// One of low, medium, high or critical; an empty string clears it.
    #[serde(default)]
    pub priority: Option<String>,
    /// Section code; an empty string clears it.
    #[serde(default)]
    pub section_code: Option<String>,
}

impl UpdateCandidateParams {
    fn is_empty(&self) -> bool {
        self.requirement_code.is_none()
            && self.title.is_none()
            && self.text.is_none()
            && self.guidance.is_none()
            && self.priority.is_none()
            && self.section_code.is_none()
    }

    fn apply(self, candidate: &mut RequirementCandidate) {
        if let Some(code) = self.requirement_code {
            candidate.requirement_code = code;
        }
        if let Some(title) = self.title {
            candidate.title = title;
        }
        if let Some(text) = self.text {
            candidate.text = text;
        }
        if let Some(guidance) = self.guidance {
            candidate.guidance = non_empty(guidance);
        }
        if let Some(priority) = self.priority {
            candidate.priority = non_empty(priority);
        }
        if let Some(section) = self.section_code {
            candidate.section_code = non_empty(section);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

pub(super) async fn update_candidate(
    server: &GrcMcpServer,
    params: Parameters<UpdateCandidateParams>,
) -> Result<CallToolResult, McpError> {
    let params = params.0;
    if params.is_empty() {
        return Err(McpError::invalid_params(
            "no fields to update",
            Some(json!({ "index": params.index })),
        ));
    }

    let index = params.index;
    let mut session = server.state.session.write().await;
    let state = session
        .edit(index, |candidate| params.apply(candidate))
        .map_err(|error| GrcMcpServer::rejected(error, "update_candidate"))?;

    let views = candidate_views(&session);
    let updated = &views[index];
    let summary = match &updated.error {
        Some(error) => format!("Updated candidate {index}: {error}"),
        None => format!("Updated candidate {index}"),
    };
    Ok(GrcMcpServer::success(
        summary,
        json!({
            "state": state,
            "candidate": GrcMcpServer::serialize(updated, "candidate")?,
        }),
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetIncludeParams {
    /// Position of the candidate.
    pub index: usize,
    /// Whether to commit the candidate.
    pub include: bool,
}

pub(super) async fn set_include(
    server: &GrcMcpServer,
    params: Parameters<SetIncludeParams>,
) -> Result<CallToolResult, McpError> {
    let SetIncludeParams { index, include } = params.0;
    let mut session = server.state.session.write().await;
    let state = session
        .set_include(index, include)
        .map_err(|error| GrcMcpServer::rejected(error, "set_include"))?;

    let verb = if include { "Included" } else { "Excluded" };
    Ok(GrcMcpServer::success(
        format!("{verb} candidate {index}; session is {state}"),
        json!({ "state": state, "index": index, "include": include, "summary": session.summary() }),
    ))
}

pub(super) async fn dry_run(server: &GrcMcpServer) -> Result<CallToolResult, McpError> {
    let session = server.state.session.read().await;
    let preview = session.preview();
    let can_commit = session.can_commit();

    let summary = format!(
        "Frameworks: {} ok, {} error. Requirements: {} ok, {} error. {}",
        preview.summary.framework_ok,
        preview.summary.framework_err,
        preview.summary.req_ok,
        preview.summary.req_err,
        if can_commit { "Ready to commit" } else { "Not committable" }
    );
    let mut data = GrcMcpServer::serialize(&preview, "dry_run")?;
    data["canCommit"] = json!(can_commit);
    data["strictness"] = json!(session.strictness());
    Ok(GrcMcpServer::success(summary, data))
}
