//! Authentication middleware for JWT token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::{AuthSettings, non_empty},
    error::ApiError,
    state::AppState,
};

/// Role that unlocks administrative routes
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// Verifies bearer tokens issued by the identity provider
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier from settings.
    ///
    /// Returns `None` when no key is configured. An RS256 public key wins over
    /// an HS256 secret when both are set.
    pub fn from_settings(settings: &AuthSettings) -> Result<Option<Self>, String> {
        if let Some(public_key) = non_empty(&settings.jwt_public_key) {
            // If the public key looks like a file path, read from file
            let pem = if public_key.starts_with("-----BEGIN") {
                public_key.to_string()
            } else {
                std::fs::read_to_string(public_key)
                    .map_err(|e| format!("Failed to read public key file: {}", e))?
                    .trim()
                    .to_string()
            };
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| format!("Failed to create decoding key: {}", e))?;
            return Ok(Some(Self::new(key, Algorithm::RS256)));
        }

        if let Some(secret) = non_empty(&settings.jwt_secret) {
            let key = DecodingKey::from_secret(secret.as_bytes());
            return Ok(Some(Self::new(key, Algorithm::HS256)));
        }

        Ok(None)
    }

    fn new(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        Self { key, validation }
    }

    /// Validate a token and extract the principal
    pub fn verify(&self, token: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(AuthUser {
            id: data.claims.sub,
            roles: data.claims.roles,
        })
    }
}

/// Authentication middleware.
///
/// In email-trust mode (no verifier configured) requests pass through
/// untouched. Otherwise a valid bearer token is required and the principal
/// is placed in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(verifier) = state.jwt.as_deref() else {
        return Ok(next.run(req).await);
    };

    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;

    let user = verifier.verify(bearer.token()).map_err(|e| {
        warn!(error = %e, "Failed to validate token");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    fn hs256(secret: &str) -> JwtVerifier {
        JwtVerifier::from_settings(&AuthSettings {
            jwt_public_key: None,
            jwt_secret: Some(secret.to_string()),
        })
        .unwrap()
        .unwrap()
    }

    fn token(secret: &str, sub: Uuid, roles: &[&str], exp: u64) -> String {
        let claims = Claims {
            sub,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iat: 0,
            exp,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn no_keys_means_no_verifier() {
        assert!(
            JwtVerifier::from_settings(&AuthSettings::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn valid_token_yields_principal() {
        let sub = Uuid::new_v4();
        let user = hs256("secret")
            .verify(&token("secret", sub, &["admin"], far_future()))
            .unwrap();
        assert_eq!(user.id, sub);
        assert!(user.is_admin());
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let verifier = hs256("secret");
        let sub = Uuid::new_v4();
        assert!(
            verifier
                .verify(&token("other", sub, &[], far_future()))
                .is_err()
        );
        assert!(verifier.verify(&token("secret", sub, &[], 1)).is_err());
    }

    #[test]
    fn unreadable_public_key_is_a_startup_error() {
        let result = JwtVerifier::from_settings(&AuthSettings {
            jwt_public_key: Some("/nonexistent/key.pem".to_string()),
            jwt_secret: None,
        });
        assert!(result.is_err());
    }
}
