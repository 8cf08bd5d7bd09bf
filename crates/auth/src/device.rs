//! Device fingerprinting and token fingerprints.
//!
//! A device fingerprint groups a user's requests from one client context so
//! that a login or refresh from the same device overwrites its session
//! record instead of piling up new ones. It is derived from the network
//! origin and the client signature string, so clients behind a shared
//! proxy can collide: good enough for session correlation, not for device
//! attestation.

use blake3::Hasher;

/// Length of a device fingerprint in hex characters (64 bits).
const DEVICE_ID_LEN: usize = 16;

/// Request metadata the external HTTP layer supplies for fingerprinting
/// and audit trails.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Network origin (typically the client IP, proxy-resolved).
    pub origin: Option<String>,
    /// Client signature string (typically the user agent).
    pub client_signature: Option<String>,
}

impl ClientContext {
    #[must_use]
    pub fn new(origin: impl Into<String>, client_signature: impl Into<String>) -> Self {
        Self {
            origin:           Some(origin.into()),
            client_signature: Some(client_signature.into()),
        }
    }

    /// The device fingerprint for this context.
    #[must_use]
    pub fn device_id(&self) -> String {
        device_fingerprint(
            self.origin.as_deref().unwrap_or("unknown"),
            self.client_signature.as_deref().unwrap_or("unknown"),
        )
    }
}

/// Derives a stable device fingerprint from origin + client signature.
#[must_use]
pub fn device_fingerprint(origin: &str, client_signature: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(origin.as_bytes());
    hasher.update(b"|");
    hasher.update(client_signature.as_bytes());

    let hex = hasher.finalize().to_hex();
    hex[.. DEVICE_ID_LEN].to_string()
}

/// One-way fingerprint of a bearer token for storage and lookup.
///
/// Raw tokens are never persisted; every table and the blacklist key on
/// this digest instead.
#[must_use]
pub fn fingerprint_token(token: &str) -> String { blake3::hash(token.as_bytes()).to_hex().to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = device_fingerprint("203.0.113.7", "Mozilla/5.0");
        let b = device_fingerprint("203.0.113.7", "Mozilla/5.0");

        assert_eq!(a, b);
        assert_eq!(a.len(), DEVICE_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_varies_by_input() {
        let base = device_fingerprint("203.0.113.7", "Mozilla/5.0");

        assert_ne!(base, device_fingerprint("203.0.113.8", "Mozilla/5.0"));
        assert_ne!(base, device_fingerprint("203.0.113.7", "curl/8.0"));
    }

    #[test]
    fn test_separator_prevents_ambiguity() {
        // "ab" + "c" must not collide with "a" + "bc".
        assert_ne!(device_fingerprint("ab", "c"), device_fingerprint("a", "bc"));
    }

    #[test]
    fn test_missing_context_falls_back() {
        let ctx = ClientContext::default();
        assert_eq!(ctx.device_id(), device_fingerprint("unknown", "unknown"));
    }

    #[test]
    fn test_token_fingerprint_shape() {
        let fp = fingerprint_token("some.bearer.token");

        assert_eq!(fp.len(), 64);
        assert_ne!(fp, fingerprint_token("some.bearer.tokeN"));
    }
}
