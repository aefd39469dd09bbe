use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Session token payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,  // user ID
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret, ttl_minutes, ..
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    /// Signs a token for `user_id` as of `issued_at`; expiry is
    /// `issued_at + ttl`.
    pub fn issue(&self, user_id: Uuid, issued_at: OffsetDateTime) -> anyhow::Result<String> {
        let exp = issued_at + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: issued_at.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Deterministic, side-effect-free verification.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::SignatureInvalid
                }
                _ => TokenError::Malformed,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, ttl_minutes: i64) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", 5);
        let user_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let token = keys.issue(user_id, now).expect("sign token");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iat, now.unix_timestamp() as usize);
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", 1);
        let issued_at = OffsetDateTime::now_utc() - TimeDuration::minutes(3);
        let token = keys.issue(Uuid::new_v4(), issued_at).expect("sign token");
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn verify_accepts_token_within_ttl() {
        let keys = make_keys("dev-secret", 10);
        let issued_at = OffsetDateTime::now_utc() - TimeDuration::minutes(3);
        let token = keys.issue(Uuid::new_v4(), issued_at).expect("sign token");
        assert!(keys.verify(&token).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let good = make_keys("one-secret", 5);
        let bad = make_keys("other-secret", 5);
        let token = good
            .issue(Uuid::new_v4(), OffsetDateTime::now_utc())
            .expect("sign token");
        assert_eq!(bad.verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret", 5);
        assert_eq!(keys.verify("not-a-token"), Err(TokenError::Malformed));
    }
}
