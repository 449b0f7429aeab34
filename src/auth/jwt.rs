use std::str::FromStr;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, warn};

use crate::{
    config::JwtConfig,
    error::{AppError, AppResult},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Signing and verification material, built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        let algorithm = Algorithm::from_str(&cfg.algorithm)
            .map_err(|e| anyhow::anyhow!("unknown signing algorithm {}: {}", cfg.algorithm, e))?;
        anyhow::ensure!(
            matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            "signing algorithm {} needs a key pair; only HS256, HS384 and HS512 are supported",
            cfg.algorithm
        );
        anyhow::ensure!(!cfg.secret.is_empty(), "signing secret must not be empty");
        let ttl = cfg
            .ttl_minutes
            .checked_mul(60)
            .map(Duration::seconds)
            .filter(|ttl| ttl.is_positive() && OffsetDateTime::now_utc().checked_add(*ttl).is_some())
            .ok_or_else(|| {
                anyhow::anyhow!("token lifetime of {} minutes is out of range", cfg.ttl_minutes)
            })?;

        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: i32) -> AppResult<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    /// Issues a token as if the clock read `now`.
    pub fn issue_at(&self, user_id: i32, now: OffsetDateTime) -> AppResult<String> {
        let exp = now.checked_add(self.ttl).ok_or_else(|| {
            error!(%now, "token expiry out of range");
            AppError::Internal(anyhow::anyhow!("token expiry out of range"))
        })?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            AppError::Internal(e.into())
        })?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    /// Returns the subject of a well-signed, unexpired token.
    pub fn verify(&self, token: &str) -> AppResult<i32> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "token rejected");
            AppError::InvalidCredential
        })?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}
