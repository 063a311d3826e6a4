//! `x-api-key` / `x-admin-key` auth, a `tower::Layer` checking a single
//! static pair of configured keys (no JWT, no provider lookup).

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::{Layer, Service};

use crate::infrastructure::config::model::AuthConfig;

/// Inserted into request extensions by [`ApiKeyMiddleware`]; handlers for
/// destructive/config endpoints read this to enforce the admin gate.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity {
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct ApiKeyLayer {
    config: Arc<AuthConfig>,
}

impl ApiKeyLayer {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for ApiKeyLayer {
    type Service = ApiKeyMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyMiddleware<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for ApiKeyMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.api_key_required() {
                req.extensions_mut().insert(CallerIdentity { is_admin: true });
                return inner.call(req).await;
            }

            let provided = req.headers().get("x-api-key").and_then(|v| v.to_str().ok());
            match provided {
                Some(key) if key == config.api_key => {
                    let is_admin = !config.admin_key_required()
                        || req
                            .headers()
                            .get("x-admin-key")
                            .and_then(|v| v.to_str().ok())
                            .is_some_and(|k| k == config.admin_key);
                    req.extensions_mut().insert(CallerIdentity { is_admin });
                    inner.call(req).await
                }
                _ => Ok(unauthorized()),
            }
        })
    }
}

fn unauthorized() -> Response {
    super::error::error_response(StatusCode::UNAUTHORIZED, "missing or invalid x-api-key")
}

/// Returns 403 when the caller isn't admin-scoped; called from handlers
/// that mutate config/settings.
pub fn require_admin(identity: Option<&CallerIdentity>) -> Result<(), Response> {
    if identity.is_some_and(|i| i.is_admin) {
        Ok(())
    } else {
        Err(super::error::error_response(StatusCode::FORBIDDEN, "admin key required"))
    }
}
