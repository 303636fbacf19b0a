//! Bearer token authentication.
//!
//! A token is `<user id>.<hex HMAC-SHA256 of the user id>`, keyed with the
//! configured secret. Handlers that need a caller take an [`AuthUser`]
//! argument; the extractor rejects the request before the handler runs.

use anyhow::Result;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;
use crate::handler::AppState;
use crate::model::UserId;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = "x-auth-token";

#[derive(Clone)]
pub struct TokenAuthority {
    mac: HmacSha256,
}

impl TokenAuthority {
    pub fn new(secret: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid auth secret: {}", e))?;
        Ok(TokenAuthority { mac })
    }

    pub fn issue(&self, user: &UserId) -> String {
        let mut mac = self.mac.clone();
        mac.update(user.as_str().as_bytes());
        format!("{}.{}", user, hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, token: &str) -> Option<UserId> {
        let (user, signature) = token.trim().rsplit_once('.')?;
        let user = UserId::new(user)?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(user.as_str().as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(user)
    }
}

fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());

    bearer.or_else(|| {
        headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or(ApiError::Unauthorized("No token, authorization denied"))?;

        match state.auth.verify(token) {
            Some(user) => {
                tracing::debug!(user = %user, "authenticated request");
                Ok(AuthUser(user))
            }
            None => Err(ApiError::Unauthorized("Token is not valid")),
        }
    }
}
