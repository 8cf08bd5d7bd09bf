//! # Token Codec
//!
//! Stateless minting and verification of the two bearer-token kinds. Both
//! kinds share one HS256 scheme but are separated twice over: each kind is
//! signed with its own secret, and the kind is carried as an explicit claim
//! so a verifier can never be talked into accepting the wrong kind even
//! when the secrets are identical.

use chrono::{DateTime, Utc};
use cuid2::CuidConstructor;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default access-token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECONDS: u64 = 15 * 60;

/// Default refresh-token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// The two token kinds issued by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived bearer credential used for per-request authorization.
    Access,
    /// Long-lived credential exchanged for new access tokens; persisted and
    /// revocable server-side.
    Refresh,
}

impl TokenKind {
    /// The claim value carried inside tokens of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Typed failures from token verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed or has an invalid signature")]
    Malformed,

    #[error("Token is of the wrong kind")]
    WrongKind,

    #[error("Signing secret is not configured")]
    MissingSecret,
}

/// Claim set carried by every Gatehouse token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// User email
    pub email: String,

    /// Admin flag
    pub is_admin: bool,

    /// Token kind ("access" or "refresh")
    pub kind: String,

    /// Unique token ID, the join key for revocation
    pub jti: String,

    /// Token issuer
    pub iss: String,

    /// Token audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: u64,

    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// Expiry as a UTC timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> { DateTime::<Utc>::from_timestamp(self.exp as i64, 0) }
}

/// The identity a token is minted for.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id:  Uuid,
    pub email:    String,
    pub is_admin: bool,
}

/// Codec configuration: secrets, lifetimes, and the issuer/audience pair.
#[derive(Debug, Clone)]
pub struct TokenCodecConfig {
    /// Secret for access tokens.
    pub access_secret: SecretString,
    /// Secret for refresh tokens. Falls back to the access secret when
    /// unset; the explicit kind claim keeps the kinds apart either way.
    pub refresh_secret: Option<SecretString>,
    pub issuer:   String,
    pub audience: String,
    pub access_ttl_seconds:  u64,
    pub refresh_ttl_seconds: u64,
}

impl TokenCodecConfig {
    /// Configuration with default lifetimes and issuer/audience constants.
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: Option<SecretString>) -> Self {
        Self {
            access_secret,
            refresh_secret,
            issuer: "gatehouse-core".to_string(),
            audience: "gatehouse-clients".to_string(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }
}

/// Stateless signer/verifier for both token kinds.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    config: TokenCodecConfig,
}

impl TokenCodec {
    #[must_use]
    pub fn new(config: TokenCodecConfig) -> Self {
        Self {
            config,
        }
    }

    /// Lifetime of tokens of the given kind, in seconds.
    #[must_use]
    pub fn ttl_seconds(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.config.access_ttl_seconds,
            TokenKind::Refresh => self.config.refresh_ttl_seconds,
        }
    }

    /// Mints a signed token of the given kind.
    ///
    /// # Errors
    ///
    /// Fails only when the signing secret for the kind is missing/empty.
    pub fn mint(&self, kind: TokenKind, identity: &TokenIdentity) -> Result<String, TokenError> {
        let now = Utc::now().timestamp() as u64;
        self.mint_with_timestamps(kind, identity, now, now + self.ttl_seconds(kind))
    }

    fn mint_with_timestamps(
        &self,
        kind: TokenKind,
        identity: &TokenIdentity,
        iat: u64,
        exp: u64,
    ) -> Result<String, TokenError> {
        let secret = self.secret_for(kind)?;

        let claims = Claims {
            sub:      identity.user_id.to_string(),
            email:    identity.email.clone(),
            is_admin: identity.is_admin,
            kind:     kind.as_str().to_string(),
            jti:      CuidConstructor::new().with_length(32).create_id(),
            iss:      self.config.issuer.clone(),
            aud:      self.config.audience.clone(),
            iat,
            exp,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|_| TokenError::Malformed)
    }

    /// Verifies a token of the given kind and returns its claims.
    ///
    /// Signature, expiry (zero leeway), issuer, and audience are checked
    /// first; a structurally valid token of the other kind is then rejected
    /// with [`TokenError::WrongKind`].
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let secret = self.secret_for(kind)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let decoded = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if decoded.claims.kind != kind.as_str() {
            return Err(TokenError::WrongKind);
        }

        Ok(decoded.claims)
    }

    fn secret_for(&self, kind: TokenKind) -> Result<&str, TokenError> {
        let secret = match kind {
            TokenKind::Access => self.config.access_secret.expose_secret(),
            TokenKind::Refresh => {
                self.config
                    .refresh_secret
                    .as_ref()
                    .unwrap_or(&self.config.access_secret)
                    .expose_secret()
            },
        };

        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(secret)
    }
}

/// Best-effort claim extraction without signature or expiry checking.
///
/// Used only for expiry introspection and logging — never for
/// authorization decisions.
#[must_use]
pub fn decode_unsafe(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(b""), &validation)
        .ok()
        .map(|data| data.claims)
}
