//! Auth gate: HS256 token minting/verification and the request identity
//! extractor.
//!
//! Tokens are standard JWTs signed with a shared secret and a 1-day default
//! expiry. Requests may carry the token in an `Authorization: Bearer` header
//! or a `token` cookie; a verified identity is re-checked against the user
//! directory so deleted users are rejected even with a valid token.

use crate::config::AuthConfig;
use crate::db::{now_ms, Database};
use crate::error::{ApiError, ApiResult};
use crate::http::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried in a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies tokens with the configured shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
    ttl_hours: i64,
}

impl TokenSigner {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            ttl_hours: config.token_ttl_hours,
        }
    }

    fn mac(&self) -> ApiResult<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ApiError::internal(format!("bad signing key: {}", e)))
    }

    /// Mint a token for the given identity.
    pub fn sign(&self, user_id: &str, email: Option<&str>, is_admin: bool) -> ApiResult<String> {
        let now = now_ms() / 1000;
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.map(|e| e.to_string()),
            is_admin,
            iat: now,
            exp: now + self.ttl_hours * 3600,
        };

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).map_err(|e| ApiError::internal(e))?,
        );
        let signing_input = format!("{}.{}", header, payload);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let failed = || ApiError::unauthorized("Not authorized. Token failed.");

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(failed());
        };

        let signing_input = format!("{}.{}", header, payload);
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| failed())?;

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| failed())?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| failed())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| failed())?;

        if claims.exp <= now_ms() / 1000 {
            return Err(ApiError::unauthorized("Not authorized. Token has expired."));
        }

        Ok(claims)
    }
}

/// The verified identity attached to a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    /// Reject non-admin callers on admin-only routes.
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

/// Pull the bearer token from the Authorization header, falling back to the
/// `token` cookie.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    let cookies = parts.headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "token").then(|| value.to_string())
    })
}

/// Resolve a verified token against the user directory.
pub fn authenticate(db: &Database, signer: &TokenSigner, token: &str) -> ApiResult<AuthUser> {
    let claims = signer.verify(token)?;

    let user = db
        .get_user(&claims.user_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::unauthorized("Not authorized. User not found."))?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let token = extract_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authorized. No token provided."))?;
        authenticate(&state.db, &state.signer, &token)
    }
}
