//! Host header rewrite.
//!
//! Tool runtimes reached through a container network alias (for example
//! `host.docker.internal`) may reject requests whose `Host` does not match
//! what they expect. This stage replaces every `host` header value with the
//! canonical one before the request moves inward.

use axum::http::{header, HeaderMap, HeaderValue};
use futures::future::BoxFuture;

use super::{Next, Outcome, Scope, Stage};
use crate::error::TollgateError;

pub struct HostRewrite {
    host: HeaderValue,
}

impl HostRewrite {
    /// Build the stage for a canonical host such as `localhost:8888`.
    pub fn new(canonical_host: &str) -> crate::Result<Self> {
        let host = HeaderValue::from_str(canonical_host).map_err(|_| {
            TollgateError::InvalidConfig(format!(
                "canonical_host '{}' is not a valid header value",
                canonical_host
            ))
        })?;
        Ok(Self { host })
    }

    pub fn canonical_host(&self) -> &HeaderValue {
        &self.host
    }
}

/// Copy `headers`, swapping every `host` value for `canonical`.
///
/// All other entries are copied unchanged and keep their relative order.
pub fn rewrite_host_headers(headers: &HeaderMap, canonical: &HeaderValue) -> HeaderMap {
    let mut rewritten = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if *name == header::HOST {
            rewritten.append(header::HOST, canonical.clone());
        } else {
            rewritten.append(name.clone(), value.clone());
        }
    }
    rewritten
}

impl Stage for HostRewrite {
    fn name(&self) -> &'static str {
        "host_rewrite"
    }

    fn handle<'a>(&'a self, scope: Scope, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let mut request = match scope {
                Scope::Http(request) => request,
                lifespan @ Scope::Lifespan(_) => return next.run(lifespan).await,
            };

            let canonical = self.canonical_host();
            if let Some(original) = request.headers().get(header::HOST) {
                if original != canonical {
                    tracing::debug!(original = ?original, canonical = ?canonical, "rewriting host header");
                }
            }

            let rewritten = rewrite_host_headers(request.headers(), canonical);
            *request.headers_mut() = rewritten;
            next.run(Scope::Http(request)).await
        })
    }
}
