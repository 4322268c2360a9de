//! McpEndpoint: the pipeline's dispatcher.
//!
//! Forwards HTTP scopes addressed to the MCP path into rmcp's
//! `StreamableHttpService` (same wiring as a plain `serve` router) and answers
//! every other path with a JSON 404. Lifespan events are acknowledged;
//! `Shutdown` cancels the service token so open MCP sessions close.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::pipeline::{
    internal_error, json_error, Dispatcher, LifespanEvent, Outcome, Scope, NOT_FOUND_BODY,
};
use crate::server::handler::TollgateMcpServer;

pub struct McpEndpoint {
    service: StreamableHttpService<TollgateMcpServer, LocalSessionManager>,
    endpoint_path: String,
    tool_names: Vec<String>,
    cancel: CancellationToken,
}

impl McpEndpoint {
    pub fn new(
        server: TollgateMcpServer,
        endpoint_path: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        let tool_names = server.registry().tool_names();
        let session_manager = Arc::new(LocalSessionManager::default());
        let http_config = StreamableHttpServerConfig {
            cancellation_token: cancel.clone(),
            ..Default::default()
        };
        let service =
            StreamableHttpService::new(move || Ok(server.clone()), session_manager, http_config);

        Self {
            service,
            endpoint_path: endpoint_path.into(),
            tool_names,
            cancel,
        }
    }

    async fn serve_http(&self, request: Request<Body>) -> Response<Body> {
        if request.uri().path() != self.endpoint_path {
            return json_error(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        }

        match self.service.clone().oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(e) => {
                tracing::error!(error = %e, "MCP service failed");
                internal_error()
            }
        }
    }

    fn on_lifespan(&self, event: LifespanEvent) {
        match event {
            LifespanEvent::Startup => {
                tracing::info!(
                    path = %self.endpoint_path,
                    tools = ?self.tool_names,
                    "MCP endpoint ready"
                );
            }
            LifespanEvent::Shutdown => {
                tracing::info!("closing MCP sessions");
                self.cancel.cancel();
            }
        }
    }
}

impl Dispatcher for McpEndpoint {
    fn call(&self, scope: Scope) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            match scope {
                Scope::Http(request) => Outcome::Http(self.serve_http(request).await),
                Scope::Lifespan(event) => {
                    self.on_lifespan(event);
                    Outcome::Lifespan(event)
                }
            }
        })
    }
}
