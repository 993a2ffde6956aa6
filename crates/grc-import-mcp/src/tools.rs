mod commit;
mod linking;
mod review;
mod source;

use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult, tool,
    tool_router,
};

use crate::server::GrcMcpServer;

#[tool_router]
impl GrcMcpServer {
    #[tool(
        description = "Read a file, web page or pasted text into the idle session and validate \
                       it. CSV and JSON files are taken row by row; workbooks, Word documents, \
                       pages and text are segmented into candidates",
        annotations(
            title = "Load Source",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn load_source(
        &self,
        params: Parameters<source::LoadSourceParams>,
    ) -> Result<CallToolResult, McpError> {
        source::load_source(self, params).await
    }

    #[tool(
        description = "Cancel any running commit, discard the session and return to idle",
        annotations(
            title = "Reset Session",
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn reset(&self) -> Result<CallToolResult, McpError> {
        source::reset(self).await
    }

    #[tool(
        description = "List the session's candidates with their validation result and links",
        annotations(
            title = "List Candidates",
            read_only_hint = true,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn list_candidates(&self) -> Result<CallToolResult, McpError> {
        review::list_candidates(self).await
    }

    #[tool(
        description = "Edit fields of one candidate by index and revalidate",
        annotations(
            title = "Update Candidate",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn update_candidate(
        &self,
        params: Parameters<review::UpdateCandidateParams>,
    ) -> Result<CallToolResult, McpError> {
        review::update_candidate(self, params).await
    }

    #[tool(
        description = "Include or exclude one candidate from the commit",
        annotations(
            title = "Set Include",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn set_include(
        &self,
        params: Parameters<review::SetIncludeParams>,
    ) -> Result<CallToolResult, McpError> {
        review::set_include(self, params).await
    }

    #[tool(
        description = "Validate the session without writing: per-row results and ok/error counts",
        annotations(
            title = "Dry Run",
            read_only_hint = true,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn dry_run(&self) -> Result<CallToolResult, McpError> {
        review::dry_run(self).await
    }

    #[tool(
        description = "Search risks or controls by title, with business unit and owner names",
        annotations(
            title = "Search Link Targets",
            read_only_hint = true,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn search_link_targets(
        &self,
        params: Parameters<linking::SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        linking::search_link_targets(self, params).await
    }

    #[tool(
        description = "Link a candidate to a risk or control by id; omit targetId to clear",
        annotations(
            title = "Link Candidate",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn link_candidate(
        &self,
        params: Parameters<linking::LinkCandidateParams>,
    ) -> Result<CallToolResult, McpError> {
        linking::link_candidate(self, params).await
    }

    #[tool(
        description = "Create a risk with placeholder category, level and status and link it \
                       to the first included candidate without a risk",
        annotations(
            title = "Create Risk",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn create_risk(
        &self,
        params: Parameters<linking::CreateRiskParams>,
    ) -> Result<CallToolResult, McpError> {
        linking::create_risk(self, params).await
    }

    #[tool(
        description = "Create a control in the default control set and link it to the first \
                       included candidate without a control",
        annotations(
            title = "Create Control",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn create_control(
        &self,
        params: Parameters<linking::CreateControlParams>,
    ) -> Result<CallToolResult, McpError> {
        linking::create_control(self, params).await
    }

    #[tool(
        description = "Write the valid, included rows: frameworks, then requirements keyed on \
                       (framework, code), then risk and control mappings",
        annotations(
            title = "Commit",
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn commit(&self) -> Result<CallToolResult, McpError> {
        commit::commit(self).await
    }
}

impl GrcMcpServer {
    pub(crate) fn build_tool_router() -> rmcp::handler::server::router::tool::ToolRouter<Self> {
        Self::tool_router()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use grc_import_core::{Config, MemoryStore};

    use crate::{server::GrcMcpServer, state::ServerState};

    pub fn server() -> (GrcMcpServer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = ServerState::new(Config::default(), store.clone());
        (GrcMcpServer::new(state), store)
    }

    pub const LAW: &str = "MADDE 1 – Amaç\nBu Kanunun amacı kişisel verilerin korunmasıdır.\n\
                           MADDE 2 – Kapsam\nBu Kanun tüm veri sorumlularını kapsar.";
}
