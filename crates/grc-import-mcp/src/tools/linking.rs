use grc_import_core::{
    enrich::enrich_targets,
    link::{EntityKind, LinkError, LinkTarget, Linker},
};
use rmcp::{ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::GrcMcpServer;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Risk,
    Control,
}

impl From<LinkKind> for EntityKind {
    fn from(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Risk => Self::Risk,
            LinkKind::Control => Self::Control,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Which entity to search.
    pub kind: LinkKind,
    /// Case-insensitive title fragment; at least two characters.
    pub query: String,
}

pub(super) async fn search_link_targets(
    server: &GrcMcpServer,
    params: Parameters<SearchParams>,
) -> Result<CallToolResult, McpError> {
    let SearchParams { kind, query } = params.0;
    let kind = EntityKind::from(kind);
    let store = &*server.state.store;

    let targets = Linker::new(store, &server.state.config)
        .search(kind, &query)
        .await
        .map_err(|error| GrcMcpServer::failed(error, "search_link_targets"))?;
    let results = enrich_targets(store, targets).await;

    Ok(GrcMcpServer::success(
        format!("Found {} {kind} match(es) for '{query}'", results.len()),
        json!({
            "kind": kind,
            "query": query,
            "results": GrcMcpServer::serialize(&results, "search results")?,
        }),
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkCandidateParams {
    /// Position of the candidate.
    pub index: usize,
    /// Which link to set.
    pub kind: LinkKind,
    /// Id of the risk or control; omit to clear the link.
    #[serde(default)]
    pub target_id: Option<String>,
}

pub(super) async fn link_candidate(
    server: &GrcMcpServer,
    params: Parameters<LinkCandidateParams>,
) -> Result<CallToolResult, McpError> {
    let LinkCandidateParams {
        index,
        kind,
        target_id,
    } = params.0;
    let kind = EntityKind::from(kind);
    let target = target_id
        .as_deref()
        .map(|raw| GrcMcpServer::parse_id(raw, "targetId"))
        .transpose()?;

    let state = server
        .state
        .session
        .write()
        .await
        .link(index, kind, target)
        .map_err(|error| GrcMcpServer::rejected(error, "link_candidate"))?;

    let summary = match target {
        Some(id) => format!("Linked candidate {index} to {kind} {id}"),
        None => format!("Cleared the {kind} link of candidate {index}"),
    };
    Ok(GrcMcpServer::success(
        summary,
        json!({ "state": state, "index": index, "kind": kind, "targetId": target }),
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRiskParams {
    /// Title of the new risk.
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateControlParams {
    /// Code of the new control.
    pub code: String,
    /// Title of the new control.
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub(super) async fn create_risk(
    server: &GrcMcpServer,
    params: Parameters<CreateRiskParams>,
) -> Result<CallToolResult, McpError> {
    let created = Linker::new(&*server.state.store, &server.state.config)
        .create_risk(&params.0.title)
        .await
        .map_err(|error| link_error(error, "create_risk"))?;
    attach(server, EntityKind::Risk, created).await
}

pub(super) async fn create_control(
    server: &GrcMcpServer,
    params: Parameters<CreateControlParams>,
) -> Result<CallToolResult, McpError> {
    let CreateControlParams {
        code,
        title,
        description,
    } = params.0;
    let created = Linker::new(&*server.state.store, &server.state.config)
        .create_control(&code, &title, description.as_deref())
        .await
        .map_err(|error| link_error(error, "create_control"))?;
    attach(server, EntityKind::Control, created).await
}

fn link_error(error: LinkError, context: &str) -> McpError {
    match error {
        LinkError::MissingField(_) => GrcMcpServer::rejected(error, context),
        LinkError::Store(_) => GrcMcpServer::failed(error, context),
    }
}

/// Links a created target to the first unlinked candidate, if the session is
/// under review. The target exists either way.
async fn attach(
    server: &GrcMcpServer,
    kind: EntityKind,
    target: LinkTarget,
) -> Result<CallToolResult, McpError> {
    let attached = server
        .state
        .session
        .write()
        .await
        .attach(kind, target.id)
        .unwrap_or_else(|error| {
            tracing::debug!(%error, "Created {kind} not attached");
            None
        });

    let summary = match attached {
        Some(index) => format!("Created {kind} '{}' and linked candidate {index}", target.title),
        None => format!("Created {kind} '{}'", target.title),
    };
    Ok(GrcMcpServer::success(
        summary,
        json!({
            "kind": kind,
            "target": GrcMcpServer::serialize(&target, "created target")?,
            "attachedTo": attached,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use grc_import_core::{
        FrameworkRow, RequirementCandidate, Table, importer::Loaded, link::EntityKind,
    };
    use rmcp::handler::server::wrapper::Parameters;
    use serde_json::json;
    use uuid::Uuid;

    use super::{
        CreateControlParams, CreateRiskParams, LinkCandidateParams, LinkKind, SearchParams,
        create_control, create_risk, link_candidate, search_link_targets,
    };
    use crate::{server::GrcMcpServer, tools::test_support::server};

    async fn loaded(server: &GrcMcpServer) {
        let mut loaded = Loaded {
            candidates: vec![
                RequirementCandidate::new("A.1", "Policies", "Define policies"),
                RequirementCandidate::new("A.2", "Roles", "Assign roles"),
            ],
            ..Loaded::default()
        };
        loaded.assign_framework(FrameworkRow::new("ISO", "ISO 27001"));
        server.state.session.write().await.load(loaded).unwrap();
    }

    #[tokio::test]
    async fn created_risks_link_to_the_next_unlinked_candidate() {
        let (server, store) = server();
        loaded(&server).await;

        let first = create_risk(
            &server,
            Parameters(CreateRiskParams {
                title: "Policy gaps".to_string(),
            }),
        )
        .await
        .unwrap()
        .structured_content
        .unwrap();
        let second = create_risk(
            &server,
            Parameters(CreateRiskParams {
                title: "Unclear roles".to_string(),
            }),
        )
        .await
        .unwrap()
        .structured_content
        .unwrap();

        assert_eq!(first["attachedTo"], 0);
        assert_eq!(second["attachedTo"], 1);
        assert_eq!(store.rows(Table::Risks).len(), 2);
        let session = server.state.session.read().await;
        assert!(!session.candidates()[1].is_unlinked(EntityKind::Risk));
    }

    #[tokio::test]
    async fn controls_are_created_without_a_session() {
        let (server, store) = server();

        let data = create_control(
            &server,
            Parameters(CreateControlParams {
                code: "CTL-1".to_string(),
                title: "Access review".to_string(),
                description: None,
            }),
        )
        .await
        .unwrap()
        .structured_content
        .unwrap();

        assert!(data["attachedTo"].is_null());
        assert_eq!(data["target"]["code"], "CTL-1");
        assert_eq!(store.rows(Table::Controls).len(), 1);
    }

    #[tokio::test]
    async fn blank_titles_are_rejected() {
        let (server, _) = server();

        let result = create_risk(
            &server,
            Parameters(CreateRiskParams {
                title: "  ".to_string(),
            }),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn search_reports_unknown_owners() {
        let (server, store) = server();
        let id = Uuid::new_v4();
        let row = json!({ "id": id, "title": "Vendor lock-in" });
        store.seed(Table::Risks, row.as_object().unwrap().clone());

        let data = search_link_targets(
            &server,
            Parameters(SearchParams {
                kind: LinkKind::Risk,
                query: "vendor".to_string(),
            }),
        )
        .await
        .unwrap()
        .structured_content
        .unwrap();

        assert_eq!(data["results"][0]["id"], id.to_string());
        assert_eq!(data["results"][0]["owner"], "Unknown");
    }

    #[tokio::test]
    async fn links_can_be_set_and_cleared() {
        let (server, _) = server();
        loaded(&server).await;
        let target = Uuid::new_v4();

        link_candidate(
            &server,
            Parameters(LinkCandidateParams {
                index: 1,
                kind: LinkKind::Control,
                target_id: Some(target.to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            server.state.session.read().await.candidates()[1].linked_control_id,
            Some(target)
        );

        link_candidate(
            &server,
            Parameters(LinkCandidateParams {
                index: 1,
                kind: LinkKind::Control,
                target_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(server.state.session.read().await.candidates()[1].linked_control_id, None);
    }

    #[tokio::test]
    async fn malformed_target_ids_are_rejected() {
        let (server, _) = server();
        loaded(&server).await;

        let error = link_candidate(
            &server,
            Parameters(LinkCandidateParams {
                index: 0,
                kind: LinkKind::Risk,
                target_id: Some("not-a-uuid".to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert!(error.message.contains("targetId"));
    }
}
