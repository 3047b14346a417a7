/*!
 * # Authentication and Authorization
 *
 * Bearer tokens are HS256 JWTs carrying the caller's id, display name and a single
 * storefront role. Routes are gated per role:
 *
 * - `admin`: catalog management, stock writes, sales and history review
 * - `vendedor`: point-of-sale recording and stock lookup
 * - `cliente`: public catalog only
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Storefront roles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Cliente,
    Vendedor,
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub name: String, // Display name, recorded as actor in the audit trail
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Name written to stock history; falls back to the user id
    pub fn actor_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.user_id
        } else {
            &self.name
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
        }
    }
}

/// Issues and validates bearer tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.config.jwt_issuer)
            .field("audience", &self.config.jwt_audience)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs an access token for the given identity.
    ///
    /// Login and password checks live with the external identity provider; this is what it
    /// (and the test harness) calls once a user is known.
    pub fn issue_token(&self, user_id: &str, name: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            }
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth | AuthError::InvalidToken | AuthError::TokenExpired => {
                ServiceError::Unauthorized(err.to_string())
            }
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) | AuthError::ServiceUnavailable => {
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Role middleware: the authenticated user must hold one of `allowed`
pub async fn role_middleware(
    State(allowed): State<Arc<[Role]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_any_role(&allowed) {
        debug!(user_id = %user.user_id, role = %user.role, "Role not allowed for route");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or(AuthError::ServiceUnavailable)?;

    let user = extract_auth_from_headers(request.headers(), &auth_service)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    auth_service.validate_token(token).map(AuthUser::from)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[Role]) -> Self {
        let allowed: Arc<[Role]> = Arc::from(roles);
        self.layer(axum::middleware::from_fn_with_state(allowed, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{body::Body, http::StatusCode, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "unit-test-signing-key-0f3b9c7e2d4a6b8c1e5f7a9d3b2c4e6f8a1b3d5c7e9f".into(),
            jwt_audience: "storefront-clients".into(),
            jwt_issuer: "storefront-api".into(),
            access_token_expiration: Duration::from_secs(600),
        })
    }

    #[test]
    fn issued_token_round_trips_identity() {
        let auth = service();
        let token = auth.issue_token("u-17", "Lucia", Role::Vendedor).unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "u-17");
        assert_eq!(claims.name, "Lucia");
        assert_eq!(claims.role, Role::Vendedor);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let auth = service();
        let mut other_cfg = auth.config.clone();
        other_cfg.jwt_issuer = "someone-else".into();
        let token = AuthService::new(other_cfg)
            .issue_token("u-1", "Eve", Role::Admin)
            .unwrap();
        assert_matches!(auth.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = service();
        let past = Utc::now() - ChronoDuration::hours(2);
        let claims = Claims {
            sub: "u-2".into(),
            name: "Old".into(),
            role: Role::Admin,
            jti: Uuid::new_v4().to_string(),
            iat: past.timestamp(),
            exp: (past + ChronoDuration::minutes(5)).timestamp(),
            iss: "storefront-api".into(),
            aud: "storefront-clients".into(),
        };
        let token = auth.encode_claims(&claims).unwrap();
        assert_matches!(auth.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn actor_name_falls_back_to_user_id() {
        let user = AuthUser {
            user_id: "u-3".into(),
            name: "  ".into(),
            role: Role::Admin,
            token_id: "t".into(),
        };
        assert_eq!(user.actor_name(), "u-3");
    }

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.role.to_string()
    }

    fn gated_app(auth: Arc<AuthService>) -> Router {
        Router::new()
            .route("/admin", get(whoami))
            .with_roles(&[Role::Admin])
            .layer(Extension(auth))
    }

    async fn call(app: Router, token: Option<String>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/admin");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn role_gate_distinguishes_401_and_403() {
        let auth = Arc::new(service());

        assert_eq!(
            call(gated_app(auth.clone()), None).await,
            StatusCode::UNAUTHORIZED
        );

        let cliente = auth.issue_token("c-1", "Ana", Role::Cliente).unwrap();
        assert_eq!(
            call(gated_app(auth.clone()), Some(cliente)).await,
            StatusCode::FORBIDDEN
        );

        let admin = auth.issue_token("a-1", "Root", Role::Admin).unwrap();
        assert_eq!(call(gated_app(auth.clone()), Some(admin)).await, StatusCode::OK);

        assert_eq!(
            call(gated_app(auth), Some("not-a-jwt".into())).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
