//! Caller identity middleware.
//! Carries the identity established by the external auth layer into handlers.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::http::request::X_AUTH_USER;

/// Context attached to every request.
///
/// `user_id` is `None` when the auth layer supplied no usable identity; the gateway
/// rejects such calls as unauthenticated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Option<String>,
}

impl CallerContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let user_id = headers
            .get(X_AUTH_USER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self { user_id }
    }
}

pub async fn caller_identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    let ctx = CallerContext::from_headers(req.headers());
    if ctx.user_id.is_none() {
        tracing::debug!(path = %req.uri().path(), "Request carries no caller identity");
    }
    req.extensions_mut().insert(ctx);
    next.run(req).await
}
