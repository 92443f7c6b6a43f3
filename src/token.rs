//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Default token lifetime, in seconds.
pub const DEFAULT_TTL: u64 = 60 * 15; // 15 minutes.

/// Pieces of information asserted on a token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Claims {
    /// Identifies the expiration time on or after which the token must
    /// not be accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the token was issued.
    pub iat: u64,
    /// Identifies the organization that issued the token.
    pub iss: String,
    /// User ID.
    pub sub: String,
}

impl Claims {
    /// Numeric identity carried by the `sub` claim.
    pub fn subject(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| TokenError::BadSignature)
    }
}

/// Reason a token was refused or could not be produced.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature or structure is invalid")]
    BadSignature,
    #[error("token is expired")]
    Expired,
    #[error("token misses `{0}` claim")]
    MissingClaim(&'static str),
    #[error("token subject no longer exists")]
    UnknownSubject,
    #[error("token signing failed: {0}")]
    Generation(String),
}

/// Sign and check tokens with a process-wide HMAC-SHA-512 key.
///
/// Configuration is fixed at construction and never mutated afterwards.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, ttl: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            issuer: issuer.into(),
            ttl,
        }
    }

    /// Sign a new token bound to `user_id`.
    pub fn create(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| TokenError::Generation(err.to_string()))?
            .as_secs();

        let header = Header::new(Algorithm::HS512);
        let claims = Claims {
            exp: now + self.ttl,
            iat: now,
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
        };

        encode(&header, &claims, &self.encoding_key)
            .map_err(|err| TokenError::Generation(err.to_string()))
    }

    /// Decode a token, checking signature, claim presence and expiry.
    ///
    /// Whether the subject still exists is for the caller to confirm; a
    /// decoded token only proves the claims were signed by us.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Issued tokens carry no audience.
        validation.validate_aud = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::MissingRequiredClaim(claim) if claim.as_str() == "sub" => {
                    TokenError::MissingClaim("sub")
                },
                ErrorKind::MissingRequiredClaim(_) => TokenError::MissingClaim("exp"),
                _ => TokenError::BadSignature,
            })
    }
}
