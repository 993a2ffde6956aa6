use std::path::PathBuf;

use grc_import_core::{
    DryRunSummary, FileKind, FrameworkRow, ImportSession, Loaded, RichSource, SessionState,
    Strictness,
    importer::{BULK_KINDS, read_bulk, read_rich},
};
use rmcp::{ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::GrcMcpServer;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// A file on the server's filesystem.
    File,
    /// A web page.
    Url,
    /// Pasted text or HTML.
    Paste,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadSourceParams {
    /// How to read `input`.
    pub mode: SourceMode,
    /// File path, URL or pasted content.
    pub input: String,
    /// Code of the framework owning rows that name none.
    #[serde(default)]
    pub framework_code: Option<String>,
    /// Name of that framework; required with `frameworkCode`.
    #[serde(default)]
    pub framework_name: Option<String>,
    /// Id of an existing framework owning rows that name none.
    #[serde(default)]
    pub framework_id: Option<String>,
    /// "all-or-nothing" or "best-effort"; defaults per import flow.
    #[serde(default)]
    pub strictness: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSourceResponse {
    /// Session state after validation.
    pub state: SessionState,
    /// Strictness the session commits with.
    pub strictness: Strictness,
    /// Best-effort title of the source.
    pub title: Option<String>,
    /// Frameworks staged.
    pub frameworks: usize,
    /// Candidates read.
    pub candidates: usize,
    /// Validation counts.
    pub summary: DryRunSummary,
}

pub(super) async fn load_source(
    server: &GrcMcpServer,
    params: Parameters<LoadSourceParams>,
) -> Result<CallToolResult, McpError> {
    let params = params.0;
    let config = &server.state.config;

    if server.state.session.read().await.state() != SessionState::Idle {
        return Err(McpError::invalid_params(
            "a source is already loaded; call reset first",
            Some(json!({ "state": server.state.session.read().await.state() })),
        ));
    }

    let explicit = params
        .strictness
        .as_deref()
        .map(str::parse::<Strictness>)
        .transpose()
        .map_err(|error| GrcMcpServer::rejected(error, "strictness"))?;

    let (mut loaded, default_strictness) = match params.mode {
        SourceMode::File if is_bulk(&params.input) => (
            read_bulk(&PathBuf::from(&params.input))
                .map_err(|error| GrcMcpServer::rejected(error, "load_source"))?,
            config.bulk_strictness(),
        ),
        mode => {
            let source = match mode {
                SourceMode::File => RichSource::File(PathBuf::from(&params.input)),
                SourceMode::Url => RichSource::Url(params.input.clone()),
                SourceMode::Paste => RichSource::Paste(params.input.clone()),
            };
            let loaded = read_rich(&source, config).await.map_err(|error| {
                if matches!(mode, SourceMode::Url) {
                    GrcMcpServer::failed(error, "load_source")
                } else {
                    GrcMcpServer::rejected(error, "load_source")
                }
            })?;
            (loaded, config.rich_strictness())
        }
    };
    assign_framework(&mut loaded, &params)?;

    let strictness = explicit.unwrap_or(default_strictness);
    let mut session = ImportSession::new(strictness);
    let state = session
        .load(loaded)
        .map_err(|error| GrcMcpServer::rejected(error, "load_source"))?;

    let response = LoadSourceResponse {
        state,
        strictness,
        title: session.title().map(ToString::to_string),
        frameworks: session.frameworks().len(),
        candidates: session.candidates().len(),
        summary: session.summary(),
    };
    {
        let mut current = server.state.session.write().await;
        if current.state() != SessionState::Idle {
            return Err(GrcMcpServer::rejected(
                "a source was loaded concurrently; call reset first",
                "load_source",
            ));
        }
        *current = session;
    }

    let summary = format!(
        "Loaded {} candidates ({} valid, {} invalid); session is {}",
        response.candidates, response.summary.req_ok, response.summary.req_err, response.state
    );
    Ok(GrcMcpServer::success(
        summary,
        GrcMcpServer::serialize(response, "load_source response")?,
    ))
}

fn is_bulk(path: &str) -> bool {
    FileKind::resolve(path, None).is_ok_and(|kind| BULK_KINDS.contains(&kind))
}

fn assign_framework(loaded: &mut Loaded, params: &LoadSourceParams) -> Result<(), McpError> {
    if let Some(raw) = &params.framework_id {
        loaded.assign_framework_id(GrcMcpServer::parse_id(raw, "frameworkId")?);
        return Ok(());
    }
    match (&params.framework_code, &params.framework_name) {
        (Some(code), Some(name)) => {
            loaded.assign_framework(FrameworkRow::new(code.as_str(), name.as_str()));
            Ok(())
        }
        (Some(_), None) => Err(McpError::invalid_params(
            "`frameworkName` is required with `frameworkCode`",
            Some(json!({ "field": "frameworkName" })),
        )),
        _ => Ok(()),
    }
}

pub(super) async fn reset(server: &GrcMcpServer) -> Result<CallToolResult, McpError> {
    server.state.cancel_commit().await;
    server.state.session.write().await.reset();
    Ok(GrcMcpServer::success(
        "Session reset",
        json!({ "state": SessionState::Idle }),
    ))
}
