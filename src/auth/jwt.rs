use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::JwtConfig;
use crate::state::AppState;

/// Claims carried by every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64, // user ID
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: i64) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let token = keys.sign(7).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(keys.verify("not.a.jwt").is_err());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_secret() {
        let keys = make_keys();
        let mut foreign = make_keys();
        foreign.encoding = EncodingKey::from_secret(b"other-secret");
        let token = foreign.sign(1).expect("sign");
        assert!(keys.verify(&token).is_err());
    }
}
