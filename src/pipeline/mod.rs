//! Request pipeline: ordered stages in front of a dispatcher.
//!
//! A `Pipeline` is an explicit, ordered list of `Stage`s wrapped around a
//! single `Dispatcher`. Each stage receives the current `Scope` and a `Next`
//! handle; it either forwards (possibly after mutating the request) or
//! short-circuits with its own `Outcome`. Index 0 is the outermost stage.
//!
//! The standard composition is `[AuthGate, HostRewrite] -> dispatcher`: the
//! token is checked against the headers exactly as the client sent them, and
//! only authenticated requests get their `host` header normalized.
//!
//! `Pipeline::handle_http` is the outermost fault barrier. Panics inside the
//! chain and stages that answer an HTTP scope with the wrong outcome kind are
//! turned into a JSON 500 instead of tearing down the connection task.

pub mod auth;
pub mod host_rewrite;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, StatusCode};
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::config::ServerConfig;
use auth::AuthGate;
use host_rewrite::HostRewrite;

/// Body of every 401 the auth gate produces.
pub const UNAUTHORIZED_BODY: &str = r#"{"error": "Unauthorized"}"#;

/// Body of the 500 produced at the fault barrier.
pub const INTERNAL_ERROR_BODY: &str = r#"{"error": "Internal Server Error"}"#;

/// Body of the 404 for paths other than the MCP endpoint.
pub const NOT_FOUND_BODY: &str = r#"{"error": "Not Found"}"#;

/// Process lifecycle notifications that travel the pipeline without a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifespanEvent {
    /// Emitted once before the listener accepts connections.
    Startup,
    /// Emitted once after the listener has drained.
    Shutdown,
}

/// What flows inward through the pipeline.
pub enum Scope {
    Http(Request<Body>),
    Lifespan(LifespanEvent),
}

/// What flows back out.
pub enum Outcome {
    Http(Response<Body>),
    /// Acknowledgement of a lifespan event.
    Lifespan(LifespanEvent),
}

/// One unit of the request pipeline.
pub trait Stage: Send + Sync {
    /// Stable identifier, used in logs and to report composition order.
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, scope: Scope, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// The innermost handler the stages protect.
pub trait Dispatcher: Send + Sync {
    fn call(&self, scope: Scope) -> BoxFuture<'_, Outcome>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    dispatcher: &'a dyn Dispatcher,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain: the next stage if any, else the dispatcher.
    pub fn run(self, scope: Scope) -> BoxFuture<'a, Outcome> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                scope,
                Next {
                    stages: rest,
                    dispatcher: self.dispatcher,
                },
            ),
            None => self.dispatcher.call(scope),
        }
    }
}

struct PipelineInner {
    stages: Vec<Arc<dyn Stage>>,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Composed handler exposed to the listener. Cloning is an `Arc` copy.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

/// Collects stages in order, outermost first.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already added.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build<D: Dispatcher + 'static>(self, dispatcher: D) -> Pipeline {
        Pipeline {
            inner: Arc::new(PipelineInner {
                stages: self.stages,
                dispatcher: Arc::new(dispatcher),
            }),
        }
    }
}

impl Pipeline {
    /// Build the standard `[AuthGate, HostRewrite] -> dispatcher` chain.
    ///
    /// With `auth.enabled = false` the gate is left out entirely and a warning
    /// is logged; the host rewrite is always present.
    pub fn standard<D: Dispatcher + 'static>(
        config: &ServerConfig,
        dispatcher: D,
    ) -> crate::Result<Self> {
        let mut builder = PipelineBuilder::new();

        if config.auth.enabled {
            builder = builder.stage(AuthGate::new(config.auth.token.clone()));
        } else {
            tracing::warn!(
                "bearer-token authentication is DISABLED; every request reaches the tool endpoint"
            );
        }

        builder = builder.stage(HostRewrite::new(&config.canonical_host())?);

        let pipeline = builder.build(dispatcher);
        tracing::debug!(stages = ?pipeline.stage_names(), "pipeline composed");
        Ok(pipeline)
    }

    /// Stage names in execution order, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages.iter().map(|s| s.name()).collect()
    }

    fn next(&self) -> Next<'_> {
        Next {
            stages: &self.inner.stages,
            dispatcher: self.inner.dispatcher.as_ref(),
        }
    }

    /// Run an HTTP request through the chain. Always yields exactly one response.
    pub async fn handle_http(&self, request: Request<Body>) -> Response<Body> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let result = AssertUnwindSafe(self.next().run(Scope::Http(request)))
            .catch_unwind()
            .await;

        match result {
            Ok(Outcome::Http(response)) => response,
            Ok(Outcome::Lifespan(event)) => {
                tracing::error!(
                    %method,
                    %path,
                    ?event,
                    "pipeline answered an HTTP request with a lifespan outcome"
                );
                internal_error()
            }
            Err(_) => {
                tracing::error!(%method, %path, "panic while handling request");
                internal_error()
            }
        }
    }

    /// Push a lifespan event through the chain.
    pub async fn lifespan(&self, event: LifespanEvent) {
        match self.next().run(Scope::Lifespan(event)).await {
            Outcome::Lifespan(ack) if ack == event => {
                tracing::debug!(?event, "lifespan event acknowledged");
            }
            Outcome::Lifespan(ack) => {
                tracing::warn!(?event, ?ack, "lifespan event acknowledged as a different event");
            }
            Outcome::Http(response) => {
                tracing::warn!(
                    ?event,
                    status = %response.status(),
                    "lifespan event answered with an HTTP response"
                );
            }
        }
    }

    /// Axum router sending every request, whatever its path, through the pipeline.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request<Body>| {
            let pipeline = self.clone();
            async move { pipeline.handle_http(request).await }
        })
    }
}

/// JSON error response with an exact `content-length`.
pub(crate) fn json_error(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    response
}

pub(crate) fn unauthorized() -> Response<Body> {
    json_error(StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY)
}

pub(crate) fn internal_error() -> Response<Body> {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
}
