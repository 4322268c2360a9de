//! TollgateMcpServer: rmcp ServerHandler backed by the ToolRegistry.
//!
//! `StreamableHttpService` calls its factory closure once per MCP session;
//! every clone shares the same `Arc<ToolRegistry>`.

use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData as McpError;

use crate::error::TollgateError;
use crate::registry::{ToolRegistry, SERVER_NAME};

#[derive(Clone)]
pub struct TollgateMcpServer {
    registry: Arc<ToolRegistry>,
}

impl TollgateMcpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

/// Map a registry error onto the JSON-RPC error the client sees.
///
/// Resolution and binding errors carry their message so callers can fix the
/// request; execution failures are logged and reported generically.
fn to_mcp_error(tool: &str, err: TollgateError) -> McpError {
    match err {
        TollgateError::UnknownTool(_) | TollgateError::InvalidArguments(..) => {
            tracing::warn!(tool, error = %err, "tool call rejected");
            McpError::invalid_params(err.to_string(), None)
        }
        other => {
            tracing::error!(tool, error = %other, "tool execution failed");
            McpError::internal_error(format!("tool '{}' failed", tool), None)
        }
    }
}

impl ServerHandler for TollgateMcpServer {
    /// Handshake identity: the crate name and version, with only the tools capability advertised.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tollgate test server: echo, get_current_time, add_numbers, get_server_info."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        self.registry
            .call_tool(&name, request.arguments)
            .map_err(|e| to_mcp_error(&name, e))
    }
}
