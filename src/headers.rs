//! Response security headers and CORS.

use crate::config::HeadersConfig;
use axum::http::{header, HeaderValue, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Layer adding security headers to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeadersLayer {
    config: HeadersConfig,
}

impl SecurityHeadersLayer {
    /// Create a layer from headers configuration.
    #[must_use]
    pub fn new(config: HeadersConfig) -> Self {
        Self { config }
    }
}

impl Default for SecurityHeadersLayer {
    fn default() -> Self {
        Self::new(HeadersConfig::default())
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeaders<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeaders {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service wrapper applying [`apply_security_headers`] to responses.
#[derive(Debug, Clone)]
pub struct SecurityHeaders<S> {
    inner: S,
    config: HeadersConfig,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SecurityHeaders<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let future = self.inner.call(request);

        Box::pin(async move {
            let mut response = future.await?;
            apply_security_headers(&config, response.headers_mut());
            Ok(response)
        })
    }
}

/// Apply the configured security headers to a header map.
pub fn apply_security_headers(config: &HeadersConfig, headers: &mut http::HeaderMap) {
    if config.hsts_enabled {
        let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age);
        if let Ok(value) = HeaderValue::from_str(&hsts) {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, value);
        }
    }

    if config.nosniff {
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
    }

    if !config.frame_options.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&config.frame_options) {
            headers.insert(header::X_FRAME_OPTIONS, value);
        }
    }
}

/// Build a CORS layer from the configured origin allow-list.
///
/// An empty list is treated as "no browser clients configured" and allows
/// any origin for non-credentialed requests; a populated list restricts to
/// exactly those origins.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers_applied() {
        let mut headers = http::HeaderMap::new();
        apply_security_headers(&HeadersConfig::default(), &mut headers);

        assert_eq!(
            headers
                .get(header::STRICT_TRANSPORT_SECURITY)
                .unwrap()
                .to_str()
                .unwrap(),
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(
            headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    }

    #[test]
    fn test_disabled_headers_omitted() {
        let config = HeadersConfig {
            hsts_enabled: false,
            nosniff: false,
            frame_options: String::new(),
            ..HeadersConfig::default()
        };

        let mut headers = http::HeaderMap::new();
        apply_security_headers(&config, &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_frame_options_value() {
        let config = HeadersConfig {
            frame_options: "SAMEORIGIN".to_string(),
            ..HeadersConfig::default()
        };

        let mut headers = http::HeaderMap::new();
        apply_security_headers(&config, &mut headers);
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
    }
}
