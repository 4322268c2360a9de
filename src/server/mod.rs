//! MCP side of Tollgate: the rmcp handler and the dispatcher wrapping it.

pub mod endpoint;
pub mod handler;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::registry::ToolRegistry;
use endpoint::McpEndpoint;
use handler::TollgateMcpServer;

/// Validate `config` and build the standard pipeline around the built-in tools.
///
/// `cancel` is handed to the MCP session manager; cancelling it (directly or
/// through `LifespanEvent::Shutdown`) closes every open session.
pub fn build_pipeline(config: &ServerConfig, cancel: CancellationToken) -> crate::Result<Pipeline> {
    config.validate()?;
    let server = TollgateMcpServer::new(ToolRegistry::builtin());
    let endpoint = McpEndpoint::new(server, config.endpoint_path.clone(), cancel);
    Pipeline::standard(config, endpoint)
}
