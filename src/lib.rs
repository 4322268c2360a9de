//! Tollgate: a minimal MCP tool server behind a bearer-token gate.
//!
//! Requests pass an ordered pipeline (auth gate, then host rewrite) before
//! reaching rmcp's Streamable HTTP service, which serves four built-in tools.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod server;

pub use config::{AuthConfig, ConfigOverrides, ServerConfig};
pub use error::{Result, TollgateError};
pub use pipeline::auth::{AuthFailure, AuthGate};
pub use pipeline::host_rewrite::{rewrite_host_headers, HostRewrite};
pub use pipeline::{
    Dispatcher, LifespanEvent, Next, Outcome, Pipeline, PipelineBuilder, Scope, Stage,
};
pub use registry::{ServerInfoPayload, ToolRegistry};
pub use server::build_pipeline;
pub use server::endpoint::McpEndpoint;
pub use server::handler::TollgateMcpServer;
