//! PKCE (Proof Key for Code Exchange) for OAuth 2.0
//!
//! Implements RFC 7636 with the `S256` method only. All randomness comes from
//! the operating system RNG; if it is unavailable generation fails with
//! [`PkceError::CryptoUnavailable`] instead of degrading to a weaker source.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of random bytes behind a code verifier (43 encoded characters)
pub const CODE_VERIFIER_BYTES: usize = 32;

/// Number of random bytes behind a state token (256 bits)
pub const STATE_BYTES: usize = 32;

/// The only challenge method this client sends
pub const CHALLENGE_METHOD: &str = "S256";

/// Errors raised while producing PKCE material
#[derive(Debug, Error)]
pub enum PkceError {
    /// The OS random source could not be read
    #[error("secure random source unavailable: {0}")]
    CryptoUnavailable(String),
}

fn random_token(len: usize) -> Result<String, PkceError> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| PkceError::CryptoUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate an anti-forgery state token
///
/// 32 bytes from the OS RNG, base64url without padding. Successive calls share
/// no counter or seed.
///
/// # Errors
/// Returns [`PkceError::CryptoUnavailable`] if the OS RNG fails.
pub fn generate_state() -> Result<String, PkceError> {
    random_token(STATE_BYTES)
}

/// Generate a cryptographically secure code verifier
///
/// 32 random bytes, base64url-encoded without padding (43 characters, inside
/// RFC 7636's 43-128 range).
///
/// # Errors
/// Returns [`PkceError::CryptoUnavailable`] if the OS RNG fails.
pub fn generate_code_verifier() -> Result<String, PkceError> {
    random_token(CODE_VERIFIER_BYTES)
}

/// Derive the `S256` code challenge for a verifier
///
/// `BASE64URL(SHA256(ASCII(code_verifier)))`, deterministic for a given input.
#[must_use]
pub fn derive_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Server-side `S256` check: does `verifier` hash to `challenge`?
///
/// The client never needs this for its own flow; it exists so that tests and
/// local tooling can play the authorization server's part.
#[must_use]
pub fn verify_code_challenge(verifier: &str, challenge: &str) -> bool {
    constant_time_eq(derive_code_challenge(verifier).as_bytes(), challenge.as_bytes())
}

/// Compare the state returned on callback against the persisted one
///
/// Constant-time over the length of the inputs.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    constant_time_eq(expected.as_bytes(), actual.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// PKCE material for one authorization attempt
///
/// `code_verifier` and `state` are persisted until the callback arrives;
/// `code_challenge` travels in the authorization URL.
#[derive(Clone)]
pub struct PkceChallenge {
    /// Secret kept until token exchange
    pub code_verifier: String,

    /// SHA-256 of `code_verifier`, base64url
    pub code_challenge: String,

    /// CSRF token echoed back on the callback
    pub state: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier, its challenge and a state token
    ///
    /// # Examples
    /// ```
    /// use shopdesk_common::auth::pkce::{verify_code_challenge, PkceChallenge};
    ///
    /// let pkce = PkceChallenge::generate().expect("OS RNG available");
    /// assert_eq!(pkce.code_verifier.len(), 43);
    /// assert!(verify_code_challenge(&pkce.code_verifier, &pkce.code_challenge));
    /// ```
    ///
    /// # Errors
    /// Returns [`PkceError::CryptoUnavailable`] if the OS RNG fails.
    pub fn generate() -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = derive_code_challenge(&code_verifier);
        let state = generate_state()?;

        Ok(Self { code_verifier, code_challenge, state })
    }

    /// Get the challenge method (always "S256")
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("state", &"<redacted>")
            .finish()
    }
}
