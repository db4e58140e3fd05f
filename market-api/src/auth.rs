//! Credential validation
//!
//! Only validation lives here; tokens are issued elsewhere.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use market_core::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};

/// Resolves a presented credential to the caller's subject id
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, credential: &str) -> MarketResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

/// HS256 bearer tokens signed with a shared secret
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl CredentialValidator for JwtValidator {
    fn validate(&self, credential: &str) -> MarketResult<String> {
        let data = decode::<Claims>(credential, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => MarketError::invalid_input("token expired"),
            _ => MarketError::invalid_input(format!("invalid token: {}", e)),
        })?;

        if data.claims.sub.is_empty() {
            return Err(MarketError::invalid_input("token has no subject"));
        }
        Ok(data.claims.sub)
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish_non_exhaustive()
    }
}

/// The token of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}
