//! Signing-secret strength policy.
//!
//! Applied to every configured signing secret at startup. Production
//! deployments refuse to boot on a violation; development logs warnings.

use thiserror::Error;

/// Minimum secret length in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Minimum Shannon entropy in bits per character.
const MIN_ENTROPY: f64 = 3.5;

/// Guessable values that must never be used as (or inside) a secret.
const WEAK_SECRET_VALUES: &[&str] = &[
    "admin123", "password", "secret", "123456", "qwerty", "letmein", "welcome", "changeme", "default", "test",
    "demo", "temp", "temp123", "admin", "root", "user", "guest", "public", "private", "internal",
];

/// A single policy violation for a named secret.
#[derive(Debug, Error, PartialEq)]
pub enum SecretPolicyViolation {
    #[error("{name} must be at least {MIN_SECRET_LEN} characters long (current: {length})")]
    TooShort {
        name:   String,
        length: usize,
    },

    #[error("{name} matches the weak/guessable value {value:?}")]
    WeakValue {
        name:  String,
        value: String,
    },

    #[error("{name} has low entropy ({entropy:.2} bits/char, minimum {MIN_ENTROPY})")]
    LowEntropy {
        name:    String,
        entropy: f64,
    },

    #[error("{name} is dominated by repeated characters")]
    RepeatedCharacters {
        name: String,
    },
}

/// Validates one signing secret against the full policy.
///
/// All violations are collected so operators can fix everything in one
/// pass instead of discovering them one restart at a time.
pub fn validate_signing_secret(name: &str, secret: &str) -> Result<(), Vec<SecretPolicyViolation>> {
    let mut violations = Vec::new();

    if secret.len() < MIN_SECRET_LEN {
        violations.push(SecretPolicyViolation::TooShort {
            name:   name.to_string(),
            length: secret.len(),
        });
    }

    if let Some(weak) = WEAK_SECRET_VALUES.iter().find(|w| secret.eq_ignore_ascii_case(w)) {
        violations.push(SecretPolicyViolation::WeakValue {
            name:  name.to_string(),
            value: (*weak).to_string(),
        });
    }

    let entropy = shannon_entropy(secret);
    if !secret.is_empty() && entropy < MIN_ENTROPY {
        violations.push(SecretPolicyViolation::LowEntropy {
            name: name.to_string(),
            entropy,
        });
    }

    if has_dominant_character(secret) {
        violations.push(SecretPolicyViolation::RepeatedCharacters {
            name: name.to_string(),
        });
    }

    if violations.is_empty() {
        Ok(())
    }
    else {
        Err(violations)
    }
}

/// Shannon entropy of a string in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut counts = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
    }

    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// True when one character makes up more than half of the secret.
fn has_dominant_character(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    let mut counts = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
    }

    let max = counts.values().copied().max().unwrap_or(0);
    max * 2 > s.chars().count()
}
