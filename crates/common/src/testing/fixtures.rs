//! Access token fixtures
//!
//! Builds unsigned `header.payload.signature` tokens whose payload the
//! claims decoder understands. The signature segment is a placeholder; this
//! client never verifies it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Lifetime of fixture tokens unless overridden
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Fluent builder for access tokens
///
/// # Examples
///
/// ```
/// use shopdesk_common::auth::derive_user_profile;
/// use shopdesk_common::testing::TokenFixture;
///
/// let token = TokenFixture::new("u-1").username("maria").roles(&["ADMIN"]).build();
/// let profile = derive_user_profile(&token).unwrap();
/// assert!(profile.is_admin());
/// ```
#[derive(Debug, Clone)]
pub struct TokenFixture {
    claims: Map<String, Value>,
}

impl TokenFixture {
    /// Token for subject `sub`, issued now, expiring in an hour
    pub fn new(sub: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(sub));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + DEFAULT_LIFETIME_SECS));
        Self { claims }
    }

    #[must_use]
    pub fn username(self, username: &str) -> Self {
        self.claim("preferred_username", username)
    }

    #[must_use]
    pub fn email(self, email: &str) -> Self {
        self.claim("email", email)
    }

    #[must_use]
    pub fn name(self, name: &str) -> Self {
        self.claim("name", name)
    }

    #[must_use]
    pub fn roles(self, roles: &[&str]) -> Self {
        self.claim("roles", json!(roles))
    }

    #[must_use]
    pub fn scope(self, scope: &str) -> Self {
        self.claim("scope", scope)
    }

    /// Set `exp` to an absolute Unix timestamp
    #[must_use]
    pub fn expires_at(self, exp: i64) -> Self {
        self.claim("exp", exp)
    }

    /// Expired a minute ago
    #[must_use]
    pub fn expired(self) -> Self {
        self.expires_at(Utc::now().timestamp() - 60)
    }

    #[must_use]
    pub fn without_exp(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    #[must_use]
    pub fn without_sub(mut self) -> Self {
        self.claims.remove("sub");
        self
    }

    /// Set an arbitrary claim
    #[must_use]
    pub fn claim(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(key.to_string(), value.into());
        self
    }

    /// Encode as a compact JWT
    #[must_use]
    pub fn build(&self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(Value::Object(self.claims.clone()).to_string());
        format!("{header}.{payload}.fixture-signature")
    }
}

/// A valid user token for `sub`
#[must_use]
pub fn valid_token(sub: &str) -> String {
    TokenFixture::new(sub).build()
}

/// An expired user token for `sub`
#[must_use]
pub fn expired_token(sub: &str) -> String {
    TokenFixture::new(sub).expired().build()
}
