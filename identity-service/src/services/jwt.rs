use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

/// The two token kinds. Each signs with its own secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Token payload. Only `sub` and `exp` are required on decode; `jti` keeps
/// tokens minted in the same second distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (stringified user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Malformed token or invalid signature")]
    Invalid,
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Out-of-range minute counts saturate; issuance then reports the overflow.
fn lifetime_minutes(minutes: i64) -> Duration {
    Duration::try_minutes(minutes).unwrap_or(Duration::MAX)
}

#[derive(Clone)]
struct SigningKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl SigningKeys {
    fn from_secret(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Issues and verifies HMAC-signed access and refresh tokens.
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    access: SigningKeys,
    refresh: SigningKeys,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!(algorithm = ?config.algorithm, "JWT service initialized");

        Self {
            algorithm: config.algorithm,
            access: SigningKeys::from_secret(
                config.access_secret.expose_secret(),
                lifetime_minutes(config.access_token_expiry_minutes),
            ),
            refresh: SigningKeys::from_secret(
                config.refresh_secret.expose_secret(),
                lifetime_minutes(config.refresh_token_expiry_minutes),
            ),
        }
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Sign a token of `kind` for `user_id`, expiring one lifetime after `now`.
    pub fn issue(
        &self,
        user_id: i64,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        self.issue_with_lifetime(user_id, kind, now, self.keys(kind).lifetime)
    }

    /// Sign a token with an explicit lifetime instead of the configured one.
    pub fn issue_with_lifetime(
        &self,
        user_id: i64,
        kind: TokenKind,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<String, anyhow::Error> {
        let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
            anyhow::anyhow!("{} token expiry is out of range", kind.as_str())
        })?;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        };

        encode(
            &Header::new(self.algorithm),
            &claims,
            &self.keys(kind).encoding_key,
        )
        .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", kind.as_str(), e))
    }

    /// Mint an access and a refresh token for the same subject.
    pub fn issue_pair(&self, user_id: i64, now: DateTime<Utc>) -> Result<TokenPair, anyhow::Error> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenKind::Access, now)?,
            refresh_token: self.issue(user_id, TokenKind::Refresh, now)?,
        })
    }

    /// Verify `token` as `kind` against the current time.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<VerifiedToken, TokenError> {
        self.decode_at(token, kind, Utc::now())
    }

    /// Verify `token` as `kind`; expired iff `now` is past `exp`.
    pub fn decode_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.keys(kind).decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(kind = kind.as_str(), error = %e, "Token rejected");
                TokenError::Invalid
            })?
            .claims;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        let user_id = claims.sub.parse::<i64>().map_err(|_| TokenError::Invalid)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Invalid)?;

        Ok(VerifiedToken {
            user_id,
            expires_at,
        })
    }

    /// Access token lifetime in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access.lifetime.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig::new("access-secret", "refresh-secret"))
    }

    #[test]
    fn access_token_round_trips_subject_and_expiry() {
        let jwt = service();
        let now = Utc::now();

        let token = jwt.issue(42, TokenKind::Access, now).unwrap();
        let verified = jwt.decode(&token, TokenKind::Access).unwrap();

        assert_eq!(verified.user_id, 42);
        let expected = now + Duration::minutes(30);
        assert!((verified.expires_at - expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn refresh_token_lives_seven_days() {
        let jwt = service();
        let now = Utc::now();

        let token = jwt.issue(42, TokenKind::Refresh, now).unwrap();
        let verified = jwt.decode_at(&token, TokenKind::Refresh, now).unwrap();

        let expected = now + Duration::days(7);
        assert!((verified.expires_at - expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn out_of_range_expiry_is_an_error_not_a_panic() {
        let mut config = JwtConfig::new("access-secret", "refresh-secret");
        config.refresh_token_expiry_minutes = i64::MAX;
        let jwt = JwtService::new(&config);

        assert!(jwt.issue(42, TokenKind::Refresh, Utc::now()).is_err());
        assert!(jwt.issue_pair(42, Utc::now()).is_err());
        assert!(jwt.issue(42, TokenKind::Access, Utc::now()).is_ok());
    }

    #[test]
    fn kinds_do_not_cross_verify() {
        let jwt = service();
        let pair = jwt.issue_pair(1, Utc::now()).unwrap();

        assert_eq!(
            jwt.decode(&pair.access_token, TokenKind::Refresh),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            jwt.decode(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_only_after_exp_passes() {
        let jwt = service();
        let issued = Utc::now() - Duration::hours(2);
        let token = jwt.issue(5, TokenKind::Access, issued).unwrap();

        let exp = issued + Duration::minutes(30);
        assert!(jwt.decode_at(&token, TokenKind::Access, exp).is_ok());
        assert_eq!(
            jwt.decode_at(&token, TokenKind::Access, exp + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
        assert_eq!(jwt.decode(&token, TokenKind::Access), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = service().issue(5, TokenKind::Access, Utc::now()).unwrap();
        let other = JwtService::new(&JwtConfig::new("another-access", "another-refresh"));

        assert_eq!(
            other.decode(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let jwt = service();
        let token = jwt.issue(5, TokenKind::Access, Utc::now()).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = jwt.issue(6, TokenKind::Access, Utc::now()).unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;

        assert_eq!(
            jwt.decode(&parts.join("."), TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn wrong_algorithm_is_invalid() {
        let mut config = JwtConfig::new("access-secret", "refresh-secret");
        config.algorithm = Algorithm::HS512;
        let token = JwtService::new(&config)
            .issue(5, TokenKind::Access, Utc::now())
            .unwrap();

        assert_eq!(
            service().decode(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(
            service().decode("not.a.jwt", TokenKind::Access),
            Err(TokenError::Invalid)
        );
        assert_eq!(service().decode("", TokenKind::Access), Err(TokenError::Invalid));
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            jti: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(
            service().decode(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn pairs_minted_in_the_same_second_differ() {
        let jwt = service();
        let now = Utc::now();

        let first = jwt.issue_pair(9, now).unwrap();
        let second = jwt.issue_pair(9, now).unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
    }
}
