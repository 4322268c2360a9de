//! Bearer-token gate.
//!
//! Compares the token in `Authorization: Bearer <token>` against the single
//! configured secret. Every failure produces the same 401 body; the reason is
//! only visible in the logs.

use axum::http::{header, HeaderMap};
use futures::future::BoxFuture;
use subtle::ConstantTimeEq;

use super::{unauthorized, Next, Outcome, Scope, Stage};

const BEARER_PREFIX: &[u8] = b"Bearer ";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `authorization` header, or it does not start with `Bearer `.
    MissingOrMalformed,
    /// Well-formed header carrying the wrong token.
    InvalidToken,
}

impl AuthFailure {
    fn reason(self) -> &'static str {
        match self {
            AuthFailure::MissingOrMalformed => "missing or malformed Bearer token",
            AuthFailure::InvalidToken => "invalid token",
        }
    }
}

/// Outermost stage of the standard pipeline.
pub struct AuthGate {
    token: String,
}

impl AuthGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Check request headers against the configured secret.
    ///
    /// With repeated `authorization` headers the last one counts. The token is
    /// compared as raw bytes in constant time, so non-UTF-8 values simply fail.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthFailure> {
        let value = headers
            .get_all(header::AUTHORIZATION)
            .iter()
            .last()
            .ok_or(AuthFailure::MissingOrMalformed)?;

        let presented = value
            .as_bytes()
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthFailure::MissingOrMalformed)?;

        if bool::from(presented.ct_eq(self.token.as_bytes())) {
            Ok(())
        } else {
            Err(AuthFailure::InvalidToken)
        }
    }
}

impl Stage for AuthGate {
    fn name(&self) -> &'static str {
        "auth_gate"
    }

    fn handle<'a>(&'a self, scope: Scope, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let request = match scope {
                Scope::Http(request) => request,
                lifespan @ Scope::Lifespan(_) => return next.run(lifespan).await,
            };

            let method = request.method().clone();
            let path = request.uri().path().to_string();

            match self.check(request.headers()) {
                Ok(()) => {
                    tracing::info!(%method, %path, "auth successful");
                    next.run(Scope::Http(request)).await
                }
                Err(failure) => {
                    tracing::warn!(%method, %path, reason = failure.reason(), "auth failed");
                    Outcome::Http(unauthorized())
                }
            }
        })
    }
}
