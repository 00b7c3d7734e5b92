use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;

const DEFAULT_EXP_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    secret: Arc<Vec<u8>>,
    exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;

        let exp_hours = match std::env::var("JWT_EXP_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be an integer"))?,
            Err(_) => DEFAULT_EXP_HOURS,
        };

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn new(secret: Vec<u8>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret),
            exp_hours,
        }
    }

    pub fn encode(&self, account_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id,
            exp: (now + Duration::hours(self.exp_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Bare authenticated identity: the token was valid, nothing more. Handlers
/// that need roles or permissions extract an `authz::Principal` instead.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        Ok(AuthUser {
            account_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let config = JwtConfig::new(b"test-secret".to_vec(), 1);
        let account_id = Uuid::new_v4();

        let token = config.encode(account_id).unwrap();
        let claims = config.decode(&token).unwrap();

        assert_eq!(claims.sub, account_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = JwtConfig::new(b"secret-a".to_vec(), 1);
        let verifier = JwtConfig::new(b"secret-b".to_vec(), 1);

        let token = signer.encode(Uuid::new_v4()).unwrap();
        assert!(verifier.decode(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let config = JwtConfig::new(b"test-secret".to_vec(), 1);
        assert!(config.decode("not-a-jwt").is_err());
    }
}
