//! Request-level authenticate/authorize decisions.
//!
//! A [`RouteGuard`] is a declarative descriptor of the checks a route opts
//! into; stage ordering is data ([`RouteGuard::stages`]), not call-site
//! composition. Evaluation is a linear state machine — rate limit, API key,
//! token, role — and the first failing stage short-circuits into an HTTP
//! error response with no retry between stages.

use crate::config::SecurityConfig;
use crate::crypto::FieldCipher;
use crate::detect::AttackDetector;
use crate::error::{Result, SecurityError};
use crate::password::PasswordVault;
use crate::rate_limit::{RateLimitProfile, RateLimiter};
use crate::sanitize::Sanitizer;
use crate::secrets::SecretStore;
use crate::token::{Principal, Role, TokenKind, TokenService};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Header carrying the API key on key-gated routes.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Declarative guard configuration for one route.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    /// Rate-limit profile to count this route against.
    pub rate_limit_profile: Option<RateLimitProfile>,
    /// Require an allow-listed `X-Api-Key` header.
    pub api_key_required: bool,
    /// Require a verified bearer token.
    pub auth_required: bool,
    /// Roles permitted on this route; empty means any authenticated role.
    pub roles: Vec<Role>,
}

impl RouteGuard {
    /// A guard that checks nothing.
    #[must_use]
    pub fn public() -> Self {
        Self::default()
    }

    /// Require authentication.
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            auth_required: true,
            ..Self::default()
        }
    }

    /// Restrict to the given roles (implies authentication).
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.auth_required = true;
        self.roles = roles;
        self
    }

    /// Count requests against a rate-limit profile.
    #[must_use]
    pub fn with_rate_limit(mut self, profile: RateLimitProfile) -> Self {
        self.rate_limit_profile = Some(profile);
        self
    }

    /// Require an allow-listed API key.
    #[must_use]
    pub fn with_api_key(mut self) -> Self {
        self.api_key_required = true;
        self
    }

    /// The ordered list of stages this guard evaluates.
    #[must_use]
    pub fn stages(&self) -> Vec<GuardStage> {
        let mut stages = Vec::new();
        if let Some(profile) = self.rate_limit_profile {
            stages.push(GuardStage::RateLimit(profile));
        }
        if self.api_key_required {
            stages.push(GuardStage::ApiKey);
        }
        if self.auth_required {
            stages.push(GuardStage::Authenticate);
            stages.push(GuardStage::Authorize);
        }
        stages
    }
}

/// One stage of guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    /// Count the request against a profile.
    RateLimit(RateLimitProfile),
    /// Check the API key allow-list.
    ApiKey,
    /// Verify the bearer token and attach a principal.
    Authenticate,
    /// Check the principal's role against the allowed set.
    Authorize,
}

/// Request inputs a guard evaluates against.
#[derive(Debug, Clone, Default)]
pub struct RequestContext<'a> {
    /// Client network identity used as the rate-limit key.
    pub client_key: &'a str,
    /// Raw `Authorization` header value, if present.
    pub authorization: Option<&'a str>,
    /// Raw `X-Api-Key` header value, if present.
    pub api_key: Option<&'a str>,
}

/// Process-wide security state composed once at startup.
#[derive(Clone)]
pub struct SecurityState {
    inner: Arc<SecurityStateInner>,
}

struct SecurityStateInner {
    secrets: SecretStore,
    limiter: RateLimiter,
    detector: AttackDetector,
    sanitizer: Sanitizer,
    passwords: PasswordVault,
    api_key_digests: Vec<[u8; 32]>,
}

impl SecurityState {
    /// Build the security state from configuration.
    ///
    /// # Errors
    /// Returns [`SecurityError::Config`] when secret material is missing
    /// under a fail-fast policy or malformed.
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let secrets = SecretStore::from_config(&config.secrets)?;
        let api_key_digests = config.api_keys.iter().map(|k| digest(k)).collect();

        Ok(Self {
            inner: Arc::new(SecurityStateInner {
                secrets,
                limiter: RateLimiter::new(config.rate_limit.clone()),
                detector: AttackDetector::new(config.content.clone()),
                sanitizer: Sanitizer::new(config.content.max_depth),
                passwords: PasswordVault::new(),
                api_key_digests,
            }),
        })
    }

    /// Token service backed by the process secrets.
    #[must_use]
    pub fn tokens(&self) -> TokenService<'_> {
        TokenService::new(&self.inner.secrets)
    }

    /// Field cipher keyed by the process encryption key.
    #[must_use]
    pub fn cipher(&self) -> FieldCipher {
        FieldCipher::new(self.inner.secrets.encryption_key())
    }

    /// Password vault.
    #[must_use]
    pub fn passwords(&self) -> &PasswordVault {
        &self.inner.passwords
    }

    /// Rate limiter; login handlers call
    /// [`RateLimiter::record_success`] here after a successful credential
    /// check so the auth profile counts only failed attempts.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Attack detector for request bodies.
    #[must_use]
    pub fn detector(&self) -> &AttackDetector {
        &self.inner.detector
    }

    /// Sanitizer for request bodies.
    #[must_use]
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.inner.sanitizer
    }

    /// Verify a bearer header and produce the request principal.
    ///
    /// # Errors
    /// [`SecurityError::MissingToken`] when the header is absent or not a
    /// bearer credential; token verification errors otherwise.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal> {
        let token = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SecurityError::MissingToken)?;

        self.tokens().verify(token, TokenKind::Access)
    }

    /// Check a principal's role against the allowed set.
    ///
    /// # Errors
    /// [`SecurityError::NotAuthenticated`] without a principal;
    /// [`SecurityError::InsufficientPermissions`] when `required` is
    /// non-empty and the role is not in it.
    pub fn authorize(principal: Option<&Principal>, required: &[Role]) -> Result<()> {
        let principal = principal.ok_or(SecurityError::NotAuthenticated)?;
        if !required.is_empty() && !required.contains(&principal.role) {
            return Err(SecurityError::InsufficientPermissions);
        }
        Ok(())
    }

    /// Check an API key against the configured allow-list.
    ///
    /// Keys are compared as SHA-256 digests.
    ///
    /// # Errors
    /// [`SecurityError::MissingApiKey`] when absent,
    /// [`SecurityError::InvalidApiKey`] when not allow-listed.
    pub fn validate_api_key(&self, api_key: Option<&str>) -> Result<()> {
        let key = api_key.ok_or(SecurityError::MissingApiKey)?;
        let presented = digest(key);
        if self.inner.api_key_digests.iter().any(|d| d == &presented) {
            Ok(())
        } else {
            Err(SecurityError::InvalidApiKey)
        }
    }

    /// Evaluate a route guard stage by stage.
    ///
    /// Returns the verified principal when the guard authenticates.
    ///
    /// # Errors
    /// The first failing stage's error; evaluation stops there.
    pub async fn evaluate(
        &self,
        guard: &RouteGuard,
        request: &RequestContext<'_>,
    ) -> Result<Option<Principal>> {
        let mut principal = None;

        for stage in guard.stages() {
            match stage {
                GuardStage::RateLimit(profile) => {
                    self.inner.limiter.check(profile, request.client_key).await?;
                }
                GuardStage::ApiKey => {
                    self.validate_api_key(request.api_key)?;
                }
                GuardStage::Authenticate => {
                    principal = Some(self.authenticate(request.authorization)?);
                }
                GuardStage::Authorize => {
                    Self::authorize(principal.as_ref(), &guard.roles)?;
                }
            }
        }

        Ok(principal)
    }
}

impl std::fmt::Debug for SecurityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityState")
            .field("api_keys", &self.inner.api_key_digests.len())
            .finish()
    }
}

fn digest(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// A [`SecurityState`] paired with one route's guard, for axum middleware.
#[derive(Debug, Clone)]
pub struct GuardedRoute {
    /// Shared security state.
    pub security: SecurityState,
    /// This route's guard descriptor.
    pub guard: Arc<RouteGuard>,
}

impl GuardedRoute {
    /// Pair a security state with a route guard.
    #[must_use]
    pub fn new(security: SecurityState, guard: RouteGuard) -> Self {
        Self {
            security,
            guard: Arc::new(guard),
        }
    }
}

/// axum middleware enforcing a [`RouteGuard`].
///
/// Attach with `axum::middleware::from_fn_with_state(guarded_route, enforce)`.
/// On success the [`Principal`] (if any) is inserted into request
/// extensions; on failure the request short-circuits into the
/// `{error, code}` JSON response.
pub async fn enforce(
    State(route): State<GuardedRoute>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_key = client_key_of(&request);
    let authorization = header_str(&request, header::AUTHORIZATION.as_str());
    let api_key = header_str(&request, API_KEY_HEADER);

    let context = RequestContext {
        client_key: &client_key,
        authorization: authorization.as_deref(),
        api_key: api_key.as_deref(),
    };

    match route.security.evaluate(&route.guard, &context).await {
        Ok(principal) => {
            if let Some(principal) = principal {
                tracing::debug!(user_id = %principal.user_id, role = %principal.role, "request authenticated");
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(
                path = %request.uri().path(),
                method = %request.method(),
                client = %client_key,
                code = err.error_code(),
                "request rejected"
            );
            error_response(&err)
        }
    }
}

/// Build the JSON error response for a security failure.
#[must_use]
pub fn error_response(err: &SecurityError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_body())).into_response()
}

/// Client network identity for rate-limit keying: `X-Forwarded-For` first
/// hop, then `X-Real-Ip`, then a shared bucket.
fn client_key_of(request: &Request) -> String {
    if let Some(xff) = header_str(request, "x-forwarded-for") {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(request, "x-real-ip") {
        return real_ip.trim().to_string();
    }
    "unknown".to_string()
}

fn header_str(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Extension trait for reading the request principal.
pub trait PrincipalExt {
    /// Get the verified principal if one was attached.
    fn principal(&self) -> Option<&Principal>;
}

impl PrincipalExt for Request {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Principal>()
    }
}
