//! Bearer-token authorization for the retraction path.
//!
//! Tokens are HS256 JWTs signed with the shared secret from config, carrying
//! the caller's role and its permission strings. Only bulk unpost is gated;
//! every other operation is deliberately open, and this module must not grow
//! gates for them.
//!
//! The two failure classes stay distinct end to end: a missing or bad token
//! is `Unauthenticated` (401), a good token without the permission is
//! `Forbidden` (403).

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Permission required to bulk-unpost tasks.
pub const PERM_TASKS_UNPOST: &str = "tasks.unpost";

/// Clock-skew tolerance applied to `exp`.
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Caller's user ID.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
    pub role: Role,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role.permissions.iter().any(|p| p == permission)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    TokenExpired,
    #[error("auth secret is not configured")]
    NotConfigured,
    #[error("{0}")]
    MissingPermission(String),
}

impl From<AuthError> for WorkflowError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(perm) => WorkflowError::Forbidden(perm),
            other => WorkflowError::Unauthenticated(other.to_string()),
        }
    }
}

fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

fn verify(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = LEEWAY_SECS;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            AuthError::InvalidToken("invalid signature".to_string())
        }
        jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::InvalidToken(format!("missing required claim: {claim}"))
        }
        _ => AuthError::InvalidToken(e.to_string()),
    })?;
    Ok(data.claims)
}

/// Authenticate the bearer token and require `permission` on its role.
///
/// `secret` being `None` means the deployment never configured one; gated
/// operations are then refused outright rather than silently allowed.
pub fn authorize(
    header: Option<&str>,
    secret: Option<&str>,
    permission: &str,
) -> Result<Claims, WorkflowError> {
    let result: Result<Claims, AuthError> = (|| {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(header)?;
        let secret = secret.ok_or(AuthError::NotConfigured)?;
        let claims = verify(token, secret)?;
        if !claims.has_permission(permission) {
            return Err(AuthError::MissingPermission(permission.to_string()));
        }
        Ok(claims)
    })();
    result.map_err(WorkflowError::from)
}
