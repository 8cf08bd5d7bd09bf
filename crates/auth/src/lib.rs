//! # Gatehouse Credential Primitives
//!
//! Pure, store-free building blocks of the authentication core:
//! - JWT minting and verification for the two token kinds
//! - Argon2id password hashing and strength validation
//! - Device fingerprinting and token fingerprints
//! - Signing-secret strength policy

pub mod device;
pub mod password;
pub mod secret_policy;
pub mod token;

pub use device::{device_fingerprint, fingerprint_token, ClientContext};
pub use password::{
    hash_password,
    validate_password_strength,
    verify_password,
    PasswordError,
    PasswordValidationError,
};
pub use secret_policy::{validate_signing_secret, SecretPolicyViolation};
pub use token::{decode_unsafe, Claims, TokenCodec, TokenCodecConfig, TokenError, TokenIdentity, TokenKind};
pub use secrecy;
