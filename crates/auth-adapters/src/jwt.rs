//! # JWT token service
//!
//! HS256 bearer tokens carrying the username and an expiry. Tokens are opaque
//! to everything outside this module.

use chrono::{Duration, Utc};
use domains::{AuthenticatedUser, TokenError, TokenService};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::AuthError;

pub const DEFAULT_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    exp: i64,
}

pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl JwtTokenService {
    pub fn new(secret: &[u8], validity: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        if validity <= Duration::zero() {
            return Err(AuthError::InvalidValidity(validity.num_seconds()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            validity,
        })
    }

    /// 24 hour tokens.
    pub fn with_default_validity(secret: &[u8]) -> Result<Self, AuthError> {
        Self::new(secret, Duration::hours(DEFAULT_VALIDITY_HOURS))
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, username: &str) -> Result<String, TokenError> {
        let claims = Claims {
            username: username.to_string(),
            exp: (Utc::now() + self.validity).timestamp(),
        };
        self.sign(&claims)
    }

    fn verify(&self, token: &str) -> Result<AuthenticatedUser, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        if data.claims.username.is_empty() {
            return Err(TokenError::Invalid("token has no username".into()));
        }
        Ok(AuthenticatedUser(data.claims.username))
    }
}
