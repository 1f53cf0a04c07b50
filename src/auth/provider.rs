// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider token verification.
//!
//! Turns a bearer token into a raw [`Principal`]. Enrichment happens later.
//!
//! ## Modes
//!
//! - **Production** (at least one provider configured): the token's `iss`
//!   selects the provider, whose JWKS verifies signature, expiry, issuer and
//!   (optionally) audience.
//! - **Development** (no providers): structure and expiry only, no signature
//!   check. Never run this in production.

use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::claims::Principal;
use super::error::AuthError;
use super::jwks::JwksManager;
use crate::config::ProviderConfig;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Provider name attached to development-mode principals without `iss`.
pub const DEVELOPMENT_PROVIDER: &str = "development";

/// Just enough of the payload to route a token to its provider.
#[derive(Debug, Deserialize)]
struct IssuerOnly {
    #[serde(default)]
    iss: Option<String>,
}

/// One configured OIDC-style identity provider.
#[derive(Clone)]
pub struct IdentityProvider {
    /// Short name (`google`, `entra`, ...), recorded on logins and grants
    pub name: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim, if enforced
    pub audience: Option<String>,
    pub jwks: JwksManager,
}

impl IdentityProvider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            jwks: JwksManager::new(config.jwks_url.clone()),
        }
    }

    /// Verify a token issued by this provider.
    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        let (decoding_key, algorithm) = match &header.kid {
            Some(kid) => self.jwks.get_decoding_key(kid).await?,
            None => self.jwks.get_any_decoding_key().await?,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<Map<String, Value>>(token, &decoding_key, &validation)?;
        Ok(Principal::from_token_claims(Some(&self.name), &token_data.claims))
    }
}

/// Authentication configuration shared through `AppState`.
#[derive(Clone, Default)]
pub struct AuthConfig {
    providers: Vec<IdentityProvider>,
}

impl AuthConfig {
    /// Development mode: no providers, unsigned tokens accepted.
    pub fn development() -> Self {
        Self::default()
    }

    pub fn from_providers(configs: &[ProviderConfig]) -> Self {
        Self {
            providers: configs.iter().map(IdentityProvider::from_config).collect(),
        }
    }

    pub fn with_provider(mut self, provider: IdentityProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_development(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> &[IdentityProvider] {
        &self.providers
    }

    /// Verify a bearer token and return the raw principal.
    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        if self.is_development() {
            return verify_development(token);
        }

        // Unverified peek at `iss`; the chosen provider re-validates it.
        let peek = jsonwebtoken::dangerous::insecure_decode::<IssuerOnly>(token)
            .map_err(|_| AuthError::MalformedToken)?;
        let issuer = peek.claims.iss.ok_or(AuthError::UnknownIssuer)?;

        let provider = self
            .providers
            .iter()
            .find(|p| p.issuer == issuer)
            .ok_or(AuthError::UnknownIssuer)?;

        provider.verify(token).await
    }
}

/// Development token verification (no signature check).
fn verify_development(token: &str) -> Result<Principal, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if exp < now - CLOCK_SKEW_LEEWAY as i64 {
            return Err(AuthError::TokenExpired);
        }
    }

    let provider = claims
        .get("iss")
        .and_then(Value::as_str)
        .unwrap_or(DEVELOPMENT_PROVIDER)
        .to_string();
    Ok(Principal::from_token_claims(Some(&provider), &claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_keys::{epoch_offset, sign, test_jwks, unsigned};
    use serde_json::json;

    const ISSUER: &str = "https://login.example.com";

    async fn production_config(audience: Option<&str>) -> AuthConfig {
        let provider = IdentityProvider::from_config(&ProviderConfig {
            name: "example".to_string(),
            issuer: ISSUER.to_string(),
            jwks_url: "https://127.0.0.1:1/jwks.json".to_string(),
            audience: audience.map(str::to_string),
        });
        provider.jwks.cache_keys(test_jwks()).await;
        AuthConfig::development().with_provider(provider)
    }

    #[tokio::test]
    async fn development_mode_accepts_unsigned_tokens() {
        let token = unsigned(&json!({
            "sub": "user_123",
            "email": "a@x.com",
            "exp": epoch_offset(3600)
        }));

        let principal = AuthConfig::development().verify(&token).await.unwrap();
        assert_eq!(principal.provider(), Some(DEVELOPMENT_PROVIDER));
        assert_eq!(principal.first("email"), Some("a@x.com"));
    }

    #[tokio::test]
    async fn development_mode_rejects_expired_tokens() {
        let token = unsigned(&json!({ "sub": "user_123", "exp": epoch_offset(-3600) }));
        let result = AuthConfig::development().verify(&token).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let result = AuthConfig::development().verify("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn production_mode_verifies_signed_tokens() {
        let config = production_config(Some("upkeep")).await;
        assert!(!config.is_development());

        let token = sign(&json!({
            "iss": ISSUER,
            "aud": "upkeep",
            "sub": "abc",
            "roles": ["canLogin"],
            "exp": epoch_offset(600)
        }));

        let principal = config.verify(&token).await.unwrap();
        assert_eq!(principal.provider(), Some("example"));
        assert_eq!(principal.first("sub"), Some("abc"));
        assert_eq!(principal.first("roles"), Some("canLogin"));
    }

    #[tokio::test]
    async fn production_mode_rejects_unsigned_tokens() {
        let config = production_config(None).await;
        let token = unsigned(&json!({ "iss": ISSUER, "sub": "abc", "exp": epoch_offset(600) }));

        assert!(config.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn production_mode_rejects_unknown_issuer() {
        let config = production_config(None).await;
        let token = sign(&json!({
            "iss": "https://evil.example.com",
            "sub": "abc",
            "exp": epoch_offset(600)
        }));

        let result = config.verify(&token).await;
        assert!(matches!(result, Err(AuthError::UnknownIssuer)));
    }

    #[tokio::test]
    async fn production_mode_checks_audience_and_expiry() {
        let config = production_config(Some("upkeep")).await;

        let wrong_audience = sign(&json!({
            "iss": ISSUER,
            "aud": "someone-else",
            "sub": "abc",
            "exp": epoch_offset(600)
        }));
        assert!(matches!(
            config.verify(&wrong_audience).await,
            Err(AuthError::InvalidAudience)
        ));

        let expired = sign(&json!({
            "iss": ISSUER,
            "aud": "upkeep",
            "sub": "abc",
            "exp": epoch_offset(-3600)
        }));
        assert!(matches!(config.verify(&expired).await, Err(AuthError::TokenExpired)));
    }
}
