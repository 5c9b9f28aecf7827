/// Security headers middleware
///
/// Adds OWASP-recommended response headers to every response.
///
/// # Headers Applied
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy: default-src 'none'; frame-ancestors 'none'`
/// - `Cache-Control: no-store` (responses may carry session tokens)
/// - `Strict-Transport-Security` (production only)
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use taskpilot_api::middleware::security::SecurityHeadersLayer;
///
/// let app: Router = Router::new()
///     .layer(SecurityHeadersLayer::new(true)); // true = production mode
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const STATIC_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'",
    ),
    ("cache-control", "no-store"),
];

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Security headers middleware layer
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    /// Whether to send HSTS (HTTPS deployments only)
    enable_hsts: bool,
}

impl SecurityHeadersLayer {
    /// Creates a new security headers layer
    pub fn new(enable_hsts: bool) -> Self {
        Self { enable_hsts }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            enable_hsts: self.enable_hsts,
        }
    }
}

/// Security headers middleware service
#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    enable_hsts: bool,
}

impl<S> Service<Request> for SecurityHeadersMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let future = self.inner.call(request);
        let enable_hsts = self.enable_hsts;

        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();

            for (name, value) in STATIC_HEADERS {
                // Handlers may set their own Cache-Control or CSP
                headers
                    .entry(HeaderName::from_static(name))
                    .or_insert(HeaderValue::from_static(value));
            }

            if enable_hsts {
                headers.insert(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static(HSTS),
                );
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn call(production: bool) -> Response {
        Router::new()
            .route("/test", get(|| async { (StatusCode::OK, "test") }))
            .layer(SecurityHeadersLayer::new(production))
            .oneshot(axum::http::Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let response = call(false).await;
        let headers = response.headers();

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Referrer-Policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
        assert!(headers.get("Content-Security-Policy").is_some());
        assert!(headers.get("Strict-Transport-Security").is_none());
    }

    #[tokio::test]
    async fn test_hsts_enabled_in_production() {
        let response = call(true).await;
        assert_eq!(
            response.headers().get("Strict-Transport-Security").unwrap(),
            HSTS
        );
    }
}
